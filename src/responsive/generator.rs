//! Responsive set generation for one media item.
//!
//! ```text
//! original bytes ──decode──► SourceImage
//!                              │
//!       widths (options or calculator) × formats
//!                              │
//!                  render_variants (rayon)
//!                              │
//!              put each variant on the media's disk
//!                              │
//!          replace manifest ──► save record (single write)
//! ```
//!
//! A run is all-or-nothing for the manifest: if any variant fails to encode
//! or store, the error is returned and the record keeps its previous
//! manifest. Variant files written before the failure stay on the disk and
//! are overwritten by the next successful run, since paths depend only on
//! (stem, width, format).

use super::manifest::{GenerateOutcome, ResponsiveOptions, ResponsiveVariant};
use super::width::{BreakpointWidthCalculator, WidthCalculator};
use crate::error::MediaError;
use crate::format::ImageFormat;
use crate::imaging::{ImageBackend, Quality, plan_variants, render_variants};
use crate::media::MediaItem;
use crate::records::RecordStore;
use crate::storage::Disks;
use std::sync::Arc;

/// Values used when a run's [`ResponsiveOptions`] leaves a field unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsiveDefaults {
    pub quality: Quality,
    pub formats: Vec<ImageFormat>,
}

impl Default for ResponsiveDefaults {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            formats: vec![ImageFormat::Webp, ImageFormat::Jpeg],
        }
    }
}

pub struct ResponsiveImageGenerator {
    backend: Arc<dyn ImageBackend>,
    disks: Disks,
    records: Arc<dyn RecordStore>,
    calculator: Box<dyn WidthCalculator>,
    defaults: ResponsiveDefaults,
    app_key: String,
}

impl ResponsiveImageGenerator {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        disks: Disks,
        records: Arc<dyn RecordStore>,
        app_key: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            disks,
            records,
            calculator: Box::new(BreakpointWidthCalculator::default()),
            defaults: ResponsiveDefaults::default(),
            app_key: app_key.into(),
        }
    }

    pub fn with_calculator(mut self, calculator: Box<dyn WidthCalculator>) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_defaults(mut self, defaults: ResponsiveDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &ResponsiveDefaults {
        &self.defaults
    }

    /// Render the full variant set and replace the media's manifest.
    ///
    /// Non-image media and a missing original are reported as skipped
    /// outcomes, not errors.
    pub fn generate(
        &self,
        media: &mut MediaItem,
        options: &ResponsiveOptions,
    ) -> Result<GenerateOutcome, MediaError> {
        if !media.is_image() {
            tracing::debug!(media_id = %media.id, mime = %media.mime_type, "Not an image, skipping responsive generation");
            return Ok(GenerateOutcome::SkippedNotImage);
        }

        let disk = self.disks.get(&media.disk)?;
        let original_path = media.original_path(&self.app_key);
        if !disk.exists(&original_path)? {
            tracing::warn!(media_id = %media.id, disk = %media.disk, path = %original_path, "Original missing, skipping responsive generation");
            return Ok(GenerateOutcome::SkippedSourceMissing);
        }

        let bytes = disk.get(&original_path)?;
        let source = self.backend.decode(&bytes)?;
        let (width, height) = source.dimensions();

        let quality = options.quality.unwrap_or(self.defaults.quality);
        let formats = effective_formats(options.formats.as_deref().unwrap_or(&self.defaults.formats));
        let widths = match &options.widths {
            Some(explicit) => normalize_widths(explicit),
            None => self.calculator.calculate_widths(bytes.len() as u64, width, height),
        };

        let plans = plan_variants((width, height), &widths, &formats, quality);
        tracing::debug!(
            media_id = %media.id,
            widths = ?widths,
            formats = ?formats,
            variants = plans.len(),
            "Rendering responsive variants"
        );

        let encoded = render_variants(self.backend.as_ref(), &source, &plans)?;

        let mut variants = Vec::with_capacity(encoded.len());
        for image in encoded {
            let path = media.responsive_path(&self.app_key, image.width, image.format);
            disk.put(&path, &image.bytes)?;
            variants.push(ResponsiveVariant {
                width: image.width,
                height: image.height,
                format: image.format,
                url: disk.url(&path),
                path,
                size_bytes: image.bytes.len() as u64,
            });
        }

        media.set_responsive_variants(&variants);
        self.records.save(media)?;

        tracing::info!(
            media_id = %media.id,
            variants = variants.len(),
            "Generated responsive images"
        );
        Ok(GenerateOutcome::Generated(variants))
    }

    /// Delete the media's `responsive/` directory and drop its manifest.
    pub fn clear(&self, media: &mut MediaItem) -> Result<(), MediaError> {
        let disk = self.disks.get(&media.disk)?;
        disk.delete_directory(&media.responsive_dir(&self.app_key))?;

        if media.forget_responsive_variants() {
            self.records.save(media)?;
            tracing::info!(media_id = %media.id, "Cleared responsive images");
        }
        Ok(())
    }
}

/// Dedupe requested formats, mapping ones with no responsive encoder to JPEG.
fn effective_formats(requested: &[ImageFormat]) -> Vec<ImageFormat> {
    let mut formats = Vec::with_capacity(requested.len());
    for &format in requested {
        let format = if format.is_responsive_target() {
            format
        } else {
            tracing::warn!(%format, "Not a responsive format, using jpg");
            ImageFormat::Jpeg
        };
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}

/// Explicit widths as a width set: positive, descending, unique.
fn normalize_widths(widths: &[u32]) -> Vec<u32> {
    let mut widths: Vec<u32> = widths.iter().copied().filter(|&w| w > 0).collect();
    widths.sort_unstable_by(|a, b| b.cmp(a));
    widths.dedup();
    widths
}

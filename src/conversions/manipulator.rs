//! Runs named conversions against a media item's original.

use super::paths::ConversionPathResolver;
use super::registry::{Conversion, ConversionOutput};
use crate::error::MediaError;
use crate::format::ImageFormat;
use crate::imaging::{EncodedImage, ImageBackend, Quality, SourceImage};
use crate::media::MediaItem;
use crate::storage::{Disks, Storage};
use std::sync::Arc;

/// What a `manipulate` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManipulateOutcome {
    SkippedNotImage,
    Performed {
        /// (conversion, path) pairs written.
        written: Vec<(String, String)>,
        /// Conversions whose output already existed.
        skipped: Vec<String>,
    },
}

pub struct ImageManipulator {
    resolver: Arc<ConversionPathResolver>,
    backend: Arc<dyn ImageBackend>,
    disks: Disks,
    app_key: String,
}

impl ImageManipulator {
    pub fn new(
        resolver: Arc<ConversionPathResolver>,
        backend: Arc<dyn ImageBackend>,
        disks: Disks,
        app_key: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            backend,
            disks,
            app_key: app_key.into(),
        }
    }

    /// Apply each named conversion and store its output under
    /// `conversions/{name}/` with the extension of the format it produced.
    ///
    /// Every name is looked up before any work starts, so an unknown name
    /// fails the call without writing anything. With `only_if_missing`, an
    /// existing output is left alone; when the output format is declared or
    /// already known to the resolver this check happens before decoding.
    pub fn manipulate(
        &self,
        media: &MediaItem,
        conversions: &[String],
        only_if_missing: bool,
    ) -> Result<ManipulateOutcome, MediaError> {
        if !media.is_image() {
            return Ok(ManipulateOutcome::SkippedNotImage);
        }

        let registry = self.resolver.registry();
        let resolved: Vec<(&str, &Conversion)> = conversions
            .iter()
            .map(|name| Ok((name.as_str(), registry.get(name)?)))
            .collect::<Result<_, MediaError>>()?;

        let disk = self.disks.get(&media.disk)?;
        let mut source: Option<SourceImage> = None;
        let mut written = Vec::new();
        let mut skipped = Vec::new();

        for (name, conversion) in resolved {
            if only_if_missing
                && let Some(format) = conversion
                    .output_format()
                    .or_else(|| self.resolver.detect_format(media, name))
                && disk.exists(&media.conversion_path(&self.app_key, name, format.extension()))?
            {
                tracing::debug!(media_id = %media.id, conversion = name, "Conversion exists, skipping");
                skipped.push(name.to_string());
                continue;
            }

            let decoded = match &mut source {
                Some(decoded) => decoded,
                slot => slot.insert(self.load_source(media, disk.as_ref())?),
            };

            let encoded = self.run(media, decoded, conversion)?;
            let path = media.conversion_path(&self.app_key, name, encoded.format.extension());
            self.resolver.remember(media.id, name, encoded.format);

            if only_if_missing && disk.exists(&path)? {
                tracing::debug!(media_id = %media.id, conversion = name, %path, "Conversion exists, skipping");
                skipped.push(name.to_string());
                continue;
            }

            disk.put(&path, &encoded.bytes)?;
            tracing::info!(media_id = %media.id, conversion = name, %path, size = encoded.len(), "Stored conversion");
            written.push((name.to_string(), path));
        }

        Ok(ManipulateOutcome::Performed { written, skipped })
    }

    fn load_source(&self, media: &MediaItem, disk: &dyn Storage) -> Result<SourceImage, MediaError> {
        let bytes = disk.get(&media.original_path(&self.app_key))?;
        Ok(self.backend.decode(&bytes)?)
    }

    fn run(
        &self,
        media: &MediaItem,
        source: &SourceImage,
        conversion: &Conversion,
    ) -> Result<EncodedImage, MediaError> {
        match conversion.apply(source.pixels.clone())? {
            ConversionOutput::Encoded(encoded) => Ok(encoded),
            ConversionOutput::Decoded(pixels) => {
                let native = source
                    .format
                    .or_else(|| media.source_format())
                    .unwrap_or(ImageFormat::Jpeg);
                Ok(self.backend.encode(&pixels, native, Quality::default())?)
            }
        }
    }
}

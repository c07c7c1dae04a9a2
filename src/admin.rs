//! Batch administration over the record store.
//!
//! Each batch enumerates image media through a [`MediaFilter`] and applies
//! one operation per item. A failing item is recorded in the report and the
//! batch moves on.

use crate::error::MediaError;
use crate::format::ImageFormat;
use crate::media::MediaId;
use crate::records::MediaFilter;
use crate::responsive::{GenerateOutcome, ResponsiveOptions, WidthCalculatorKind};
use crate::service::{Dispatched, MediaService};

/// Which media a batch touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSelection {
    pub collection: Option<String>,
    pub media: Option<MediaId>,
}

impl BatchSelection {
    fn filter(&self) -> MediaFilter {
        let mut filter = MediaFilter::images();
        if let Some(collection) = &self.collection {
            filter = filter.in_collection(collection.clone());
        }
        if let Some(id) = self.media {
            filter = filter.with_ids(vec![id]);
        }
        filter
    }
}

/// Per-item results of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: Vec<MediaId>,
    pub queued: Vec<MediaId>,
    /// Items the pipeline skipped (source missing).
    pub skipped: Vec<MediaId>,
    pub failed: Vec<(MediaId, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed.len() + self.queued.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn record_failure(&mut self, id: MediaId, error: &MediaError) {
        tracing::error!(media_id = %id, error = %error, "Batch item failed");
        self.failed.push((id, error.to_string()));
    }
}

/// Generate responsive sets for the selection.
///
/// Without `force`, media that already have a manifest are left out.
/// `queued` overrides `responsive_images.queue`.
pub fn batch_generate(
    service: &MediaService,
    selection: &BatchSelection,
    options: &ResponsiveOptions,
    force: bool,
    queued: Option<bool>,
) -> Result<BatchReport, MediaError> {
    let mut filter = selection.filter();
    if !force {
        filter = filter.with_manifest(false);
    }
    let items = service.records().query(&filter)?;
    tracing::info!(items = items.len(), force, "Generating responsive images");

    let mut report = BatchReport::default();
    for media in items {
        match service.generate_responsive(media.id, options.clone(), queued) {
            Ok(Dispatched::Queued) => report.queued.push(media.id),
            Ok(Dispatched::Completed(GenerateOutcome::Generated(_))) => report.processed.push(media.id),
            Ok(Dispatched::Completed(_)) => report.skipped.push(media.id),
            Err(e) => report.record_failure(media.id, &e),
        }
    }
    Ok(report)
}

/// Clear responsive sets for the selection. Only media with a manifest are touched.
pub fn batch_clear(service: &MediaService, selection: &BatchSelection) -> Result<BatchReport, MediaError> {
    let items = service
        .records()
        .query(&selection.filter().with_manifest(true))?;
    tracing::info!(items = items.len(), "Clearing responsive images");

    let mut report = BatchReport::default();
    for media in items {
        match service.clear_responsive(media.id) {
            Ok(()) => report.processed.push(media.id),
            Err(e) => report.record_failure(media.id, &e),
        }
    }
    Ok(report)
}

/// Coverage of responsive sets plus the effective configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub total_images: usize,
    pub with_responsive: usize,
    pub enabled: bool,
    pub auto_generate: bool,
    pub queue: bool,
    pub quality: u32,
    pub formats: Vec<ImageFormat>,
    pub breakpoints: Vec<u32>,
    pub width_calculator: WidthCalculatorKind,
}

impl StatsReport {
    pub fn without_responsive(&self) -> usize {
        self.total_images.saturating_sub(self.with_responsive)
    }

    /// Percentage with a manifest, rounded to two decimals. `None` without images.
    pub fn coverage(&self) -> Option<f64> {
        if self.total_images == 0 {
            return None;
        }
        let percent = self.with_responsive as f64 / self.total_images as f64 * 100.0;
        Some((percent * 100.0).round() / 100.0)
    }
}

pub fn stats(service: &MediaService) -> Result<StatsReport, MediaError> {
    let records = service.records();
    let total_images = records.query(&MediaFilter::images())?.len();
    let with_responsive = records
        .query(&MediaFilter::images().with_manifest(true))?
        .len();
    let config = service.responsive_config();

    Ok(StatsReport {
        total_images,
        with_responsive,
        enabled: config.enabled,
        auto_generate: config.auto_generate,
        queue: config.queue,
        quality: config.quality,
        formats: config.formats.clone(),
        breakpoints: config.breakpoints.clone(),
        width_calculator: config.width_calculator,
    })
}

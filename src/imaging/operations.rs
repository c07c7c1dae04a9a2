//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take the requested widths and formats, compute parameters, and call
//! the backend.

use super::backend::{BackendError, EncodedImage, ImageBackend, SourceImage};
use super::calculations::scale_down_to_width;
use super::params::{Quality, ResizeParams};
use crate::format::ImageFormat;
use rayon::prelude::*;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Build the (width × format) cross product for a source of `original` size.
///
/// Widths wider than the original are dropped. The result is ordered by the
/// widths as given, then by the formats as given, so a manifest built from
/// it keeps a stable order.
pub fn plan_variants(
    original: (u32, u32),
    widths: &[u32],
    formats: &[ImageFormat],
    quality: Quality,
) -> Vec<ResizeParams> {
    widths
        .iter()
        .copied()
        .filter(|&w| w > 0 && w <= original.0)
        .flat_map(|target| {
            let (width, height) = scale_down_to_width(original, target);
            formats.iter().map(move |&format| ResizeParams {
                width,
                height,
                format,
                quality,
            })
        })
        .collect()
}

/// Render every planned variant in parallel.
///
/// Output order matches `plans`. The first failure wins and the rest of the
/// results are discarded.
pub fn render_variants(
    backend: &dyn ImageBackend,
    source: &SourceImage,
    plans: &[ResizeParams],
) -> Result<Vec<EncodedImage>> {
    plans
        .par_iter()
        .map(|params| backend.resize(source, params))
        .collect()
}

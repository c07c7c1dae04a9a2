//! Target width selection.
//!
//! A calculator turns (file size, width, height) into a *width set*: strictly
//! descending, duplicate-free, led by the original width, and never wider
//! than the original. The pure [`WidthCalculator::calculate_widths`] does no
//! I/O; [`WidthCalculator::calculate_widths_from_file`] reads the numbers from
//! a local file and delegates.
//!
//! | Strategy | Type |
//! |---|---|
//! | Configured breakpoints | [`BreakpointWidthCalculator`] |
//! | Predicted file-size steps | [`FileSizeOptimizedWidthCalculator`] |
//! | Min/max clamp around either | [`BoundedWidthCalculator`] |

use crate::imaging::BackendError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default breakpoint widths.
pub const DEFAULT_BREAKPOINTS: [u32; 5] = [320, 640, 1024, 1366, 1920];

/// Each step predicts a file this fraction of the previous one.
const SIZE_STEP: f64 = 0.7;
/// Stop once the predicted file drops below 10 KiB.
const MIN_PREDICTED_SIZE: u64 = 10 * 1024;
/// Stop once the candidate width drops below this.
const MIN_CANDIDATE_WIDTH: u32 = 20;

pub trait WidthCalculator: Send + Sync {
    fn calculate_widths(&self, file_size: u64, width: u32, height: u32) -> Vec<u32>;

    fn calculate_widths_from_file(&self, path: &Path) -> Result<Vec<u32>, BackendError> {
        let (width, height) =
            image::image_dimensions(path).map_err(|e| BackendError::Decode(e.to_string()))?;
        let file_size = std::fs::metadata(path)?.len();
        Ok(self.calculate_widths(file_size, width, height))
    }
}

/// Which strategy configuration selects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidthCalculatorKind {
    #[default]
    Breakpoint,
    FileSizeOptimized,
}

impl std::fmt::Display for WidthCalculatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WidthCalculatorKind::Breakpoint => "breakpoint",
            WidthCalculatorKind::FileSizeOptimized => "file_size_optimized",
        })
    }
}

/// Sort descending and drop duplicates.
fn into_width_set(mut widths: Vec<u32>) -> Vec<u32> {
    widths.sort_unstable_by(|a, b| b.cmp(a));
    widths.dedup();
    widths
}

/// Keeps every breakpoint that fits inside the original, plus the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointWidthCalculator {
    breakpoints: Vec<u32>,
}

impl BreakpointWidthCalculator {
    pub fn new(breakpoints: impl Into<Vec<u32>>) -> Self {
        Self {
            breakpoints: breakpoints.into(),
        }
    }

    pub fn breakpoints(&self) -> &[u32] {
        &self.breakpoints
    }
}

impl Default for BreakpointWidthCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_BREAKPOINTS)
    }
}

impl WidthCalculator for BreakpointWidthCalculator {
    fn calculate_widths(&self, _file_size: u64, width: u32, _height: u32) -> Vec<u32> {
        if width == 0 {
            return Vec::new();
        }
        let mut widths: Vec<u32> = self
            .breakpoints
            .iter()
            .copied()
            .filter(|&bp| bp > 0 && bp <= width)
            .collect();
        widths.push(width);
        into_width_set(widths)
    }
}

/// Shrinks the predicted file size by 30% per step at a constant price per
/// pixel and derives the width that would produce it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSizeOptimizedWidthCalculator;

impl WidthCalculator for FileSizeOptimizedWidthCalculator {
    fn calculate_widths(&self, file_size: u64, width: u32, height: u32) -> Vec<u32> {
        if width == 0 {
            return Vec::new();
        }
        let mut widths = vec![width];
        if height == 0 || file_size == 0 {
            return widths;
        }

        let ratio = height as f64 / width as f64;
        let pixel_price = file_size as f64 / (width as f64 * height as f64);
        let mut predicted = file_size as f64;

        loop {
            predicted *= SIZE_STEP;
            let candidate = ((predicted / pixel_price) / ratio).sqrt().floor() as u32;
            if candidate < MIN_CANDIDATE_WIDTH || (predicted as u64) < MIN_PREDICTED_SIZE {
                break;
            }
            widths.push(candidate);
        }

        into_width_set(widths)
    }
}

/// Clamps another calculator's output into `[min_width, max_width]`.
///
/// Widths above `max_width` collapse onto `max_width`; widths below
/// `min_width` are dropped, except the original width, which is kept so a
/// small image still gets one variant.
pub struct BoundedWidthCalculator {
    inner: Box<dyn WidthCalculator>,
    min_width: Option<u32>,
    max_width: Option<u32>,
}

impl BoundedWidthCalculator {
    pub fn new(inner: Box<dyn WidthCalculator>, min_width: Option<u32>, max_width: Option<u32>) -> Self {
        Self {
            inner,
            min_width,
            max_width,
        }
    }
}

impl WidthCalculator for BoundedWidthCalculator {
    fn calculate_widths(&self, file_size: u64, width: u32, height: u32) -> Vec<u32> {
        let widths = self
            .inner
            .calculate_widths(file_size, width, height)
            .into_iter()
            .map(|w| self.max_width.map_or(w, |max| w.min(max)))
            .filter(|&w| w == width || self.min_width.is_none_or(|min| w >= min))
            .collect();
        into_width_set(widths)
    }
}

/// Build the configured strategy, wrapped in bounds when any are set.
pub fn build_calculator(
    kind: WidthCalculatorKind,
    breakpoints: &[u32],
    min_width: Option<u32>,
    max_width: Option<u32>,
) -> Box<dyn WidthCalculator> {
    let base: Box<dyn WidthCalculator> = match kind {
        WidthCalculatorKind::Breakpoint => Box::new(BreakpointWidthCalculator::new(breakpoints)),
        WidthCalculatorKind::FileSizeOptimized => Box::new(FileSizeOptimizedWidthCalculator),
    };
    if min_width.is_none() && max_width.is_none() {
        base
    } else {
        Box::new(BoundedWidthCalculator::new(base, min_width, max_width))
    }
}

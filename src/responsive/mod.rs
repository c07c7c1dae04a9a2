//! Responsive image sets.
//!
//! A responsive set is every (width × format) rendering of one original,
//! recorded as a manifest on the media item. Widths come from a
//! [`WidthCalculator`] unless the caller passes them explicitly.

mod generator;
mod manifest;
pub mod width;

pub use generator::{ResponsiveDefaults, ResponsiveImageGenerator};
pub use manifest::{GenerateOutcome, ResponsiveOptions, ResponsiveVariant};
pub use width::{
    BoundedWidthCalculator, BreakpointWidthCalculator, DEFAULT_BREAKPOINTS,
    FileSizeOptimizedWidthCalculator, WidthCalculator, WidthCalculatorKind, build_calculator,
};

//! Named image conversions.
//!
//! - **Registry**: name → callback, built once at startup
//! - **Presets**: callbacks generated from `[conversions.*]` config tables
//! - **Paths**: best-effort output path inference for URLs
//! - **Manipulator**: runs conversions and stores their output

mod manipulator;
mod paths;
mod presets;
mod registry;

pub use manipulator::{ImageManipulator, ManipulateOutcome};
pub use paths::ConversionPathResolver;
pub use presets::{ConversionPreset, register_presets};
pub use registry::{Conversion, ConversionFn, ConversionOutput, ConversionRegistry};

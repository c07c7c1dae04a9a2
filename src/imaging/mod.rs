//! Image processing: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Decode** | `image::load_from_memory` |
//! | **Scale** | `resize_exact` + Lanczos3 |
//! | **Encode** | jpeg / png / webp / avif / gif / bmp / tiff encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedImage, ImageBackend, SourceImage};
pub use calculations::{fit_within, scale_down_to_width};
pub use operations::{plan_variants, render_variants};
pub use params::{Quality, ResizeParams};
pub use rust_backend::{RustBackend, encode_image};

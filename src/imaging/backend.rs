//! Image codec trait and shared types.
//!
//! The [`ImageBackend`] trait is the seam between the pipeline and the codec
//! library. It covers the four operations the pipeline needs: identify,
//! decode, scale+encode, and plain encode. Everything works on in-memory
//! bytes because originals and variants live in object storage, not on a
//! local path.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::{Quality, ResizeParams};
use crate::format::ImageFormat;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Encoding to {format} failed: {reason}")]
    Encode { format: ImageFormat, reason: String },
    #[error("No encoder available for {0}")]
    UnsupportedFormat(ImageFormat),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A decoded original, with the format its bytes were stored in (if known).
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub pixels: DynamicImage,
    pub format: Option<ImageFormat>,
}

impl SourceImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

/// Encoded bytes plus what they contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Trait for image codec backends.
///
/// `Send + Sync` so one backend can be shared by the rayon workers that
/// render variants in parallel.
pub trait ImageBackend: Send + Sync {
    /// Read dimensions without a full decode where the codec allows it.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode an original into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<SourceImage, BackendError>;

    /// Scale to the exact dimensions in `params`, then encode.
    fn resize(&self, image: &SourceImage, params: &ResizeParams) -> Result<EncodedImage, BackendError>;

    /// Encode pixels as-is.
    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<EncodedImage, BackendError>;
}

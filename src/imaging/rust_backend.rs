//! Pure Rust codec backend built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::with_guessed_format` + `into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → WebP | `WebPEncoder::new_lossless` (the pure-Rust encoder has no lossy mode) |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6) |
//! | Encode → PNG | `PngEncoder` (quality ignored) |
//! | Encode → GIF, BMP, TIFF | `DynamicImage::write_to` |

use super::backend::{BackendError, Dimensions, EncodedImage, ImageBackend, SourceImage};
use super::params::{Quality, ResizeParams};
use crate::format::ImageFormat;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode pixels in `format` at `quality`.
///
/// Exposed so registered conversions can produce an already-encoded result
/// without going through a backend handle.
pub fn encode_image(
    img: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
) -> Result<EncodedImage, BackendError> {
    let mut buffer = Vec::new();
    let q = quality.value() as u8;

    let result = match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let encoder = JpegEncoder::new_with_quality(&mut buffer, q);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        ImageFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut buffer);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)
        }
        ImageFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(&mut buffer, AVIF_SPEED, q);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)
        }
        ImageFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buffer)),
        ImageFormat::Gif | ImageFormat::Bmp | ImageFormat::Tiff => {
            let codec = format
                .to_codec()
                .ok_or(BackendError::UnsupportedFormat(format))?;
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut Cursor::new(&mut buffer), codec)
        }
        ImageFormat::Heic | ImageFormat::Heif => {
            return Err(BackendError::UnsupportedFormat(format));
        }
    };

    result.map_err(|e| BackendError::Encode {
        format,
        reason: e.to_string(),
    })?;

    Ok(EncodedImage {
        bytes: buffer,
        format,
        width: img.width(),
        height: img.height(),
    })
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, bytes: &[u8]) -> Result<SourceImage, BackendError> {
        let format = image::guess_format(bytes)
            .ok()
            .and_then(ImageFormat::from_codec);
        let pixels = image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(SourceImage { pixels, format })
    }

    fn resize(&self, image: &SourceImage, params: &ResizeParams) -> Result<EncodedImage, BackendError> {
        let resized = if image.dimensions() == (params.width, params.height) {
            image.pixels.clone()
        } else {
            image
                .pixels
                .resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        encode_image(&resized, params.format, params.quality)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<EncodedImage, BackendError> {
        encode_image(image, format, quality)
    }
}

//! Conversions declared in configuration.
//!
//! ```toml
//! [conversions.thumb]
//! width = 300
//! height = 300
//! format = "webp"
//!
//! [conversions.preview]
//! width = 1200
//! ```
//!
//! A preset fits the image inside its box without upscaling. With a
//! `format` it encodes; without one it returns pixels so the original's
//! format is kept.

use super::registry::{Conversion, ConversionOutput, ConversionRegistry};
use crate::format::ImageFormat;
use crate::imaging::{Quality, encode_image, fit_within};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionPreset {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<ImageFormat>,
    pub quality: Option<Quality>,
}

impl ConversionPreset {
    pub fn into_conversion(self) -> Conversion {
        let output_format = self.format;
        Conversion::new(
            move |image| {
                let (width, height) = fit_within((image.width(), image.height()), self.width, self.height);
                let resized = if (width, height) == (image.width(), image.height()) {
                    image
                } else {
                    image.resize_exact(width, height, FilterType::Lanczos3)
                };
                match self.format {
                    Some(format) => Ok(ConversionOutput::Encoded(encode_image(
                        &resized,
                        format,
                        self.quality.unwrap_or_default(),
                    )?)),
                    None => Ok(ConversionOutput::Decoded(resized)),
                }
            },
            output_format,
        )
    }
}

/// Register every preset under its table name.
pub fn register_presets(registry: &mut ConversionRegistry, presets: &BTreeMap<String, ConversionPreset>) {
    for (name, preset) in presets {
        registry.insert(name.clone(), preset.clone().into_conversion());
        tracing::debug!(conversion = %name, ?preset, "Registered conversion preset");
    }
}

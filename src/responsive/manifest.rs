//! Manifest entries and per-run generation options.

use crate::format::ImageFormat;
use crate::imaging::Quality;
use serde::{Deserialize, Serialize};

/// One rendered (width, format) variant as recorded on the media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsiveVariant {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    /// Storage-relative path on the media's disk.
    pub path: String,
    pub url: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
}

/// Overrides for a single generation run. Unset fields fall back to the
/// generator's configured defaults; `widths` falls back to the width
/// calculator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponsiveOptions {
    pub quality: Option<Quality>,
    pub formats: Option<Vec<ImageFormat>>,
    pub widths: Option<Vec<u32>>,
}

impl ResponsiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = Some(Quality::new(quality));
        self
    }

    pub fn with_formats(mut self, formats: impl Into<Vec<ImageFormat>>) -> Self {
        self.formats = Some(formats.into());
        self
    }

    pub fn with_widths(mut self, widths: impl Into<Vec<u32>>) -> Self {
        self.widths = Some(widths.into());
        self
    }
}

/// What a `generate` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// The manifest was replaced with these variants.
    Generated(Vec<ResponsiveVariant>),
    /// The media is not an image; nothing was touched.
    SkippedNotImage,
    /// The original is not on its disk; nothing was touched.
    SkippedSourceMissing,
}

impl GenerateOutcome {
    pub fn variants(&self) -> &[ResponsiveVariant] {
        match self {
            GenerateOutcome::Generated(variants) => variants,
            _ => &[],
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, GenerateOutcome::Generated(_))
    }
}

//! Named conversion callbacks.
//!
//! The registry is built once at startup and shared behind an `Arc`. A
//! conversion may declare the format it produces so paths can be computed
//! without running it.

use crate::error::MediaError;
use crate::format::ImageFormat;
use crate::imaging::{BackendError, EncodedImage};
use image::DynamicImage;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// What a conversion callback hands back.
#[derive(Debug, Clone)]
pub enum ConversionOutput {
    /// Already encoded; the bytes are written as-is in their own format.
    Encoded(EncodedImage),
    /// Still pixels; encoded in the original's format.
    Decoded(DynamicImage),
}

pub type ConversionFn =
    Arc<dyn Fn(DynamicImage) -> Result<ConversionOutput, BackendError> + Send + Sync>;

#[derive(Clone)]
pub struct Conversion {
    callback: ConversionFn,
    output_format: Option<ImageFormat>,
}

impl Conversion {
    pub fn new<F>(callback: F, output_format: Option<ImageFormat>) -> Self
    where
        F: Fn(DynamicImage) -> Result<ConversionOutput, BackendError> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            output_format,
        }
    }

    /// Format declared at registration, if any.
    pub fn output_format(&self) -> Option<ImageFormat> {
        self.output_format
    }

    pub fn apply(&self, image: DynamicImage) -> Result<ConversionOutput, BackendError> {
        (self.callback)(image)
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversion")
            .field("output_format", &self.output_format)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversionRegistry {
    conversions: BTreeMap<String, Conversion>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, callback: F, output_format: Option<ImageFormat>)
    where
        F: Fn(DynamicImage) -> Result<ConversionOutput, BackendError> + Send + Sync + 'static,
    {
        self.insert(name, Conversion::new(callback, output_format));
    }

    pub fn insert(&mut self, name: impl Into<String>, conversion: Conversion) {
        let name = name.into();
        if self.conversions.insert(name.clone(), conversion).is_some() {
            tracing::debug!(conversion = %name, "Replaced conversion");
        }
    }

    pub fn get(&self, name: &str) -> Result<&Conversion, MediaError> {
        self.conversions
            .get(name)
            .ok_or_else(|| MediaError::ConversionNotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.conversions.contains_key(name)
    }

    pub fn all(&self) -> &BTreeMap<String, Conversion> {
        &self.conversions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conversions.keys().map(String::as_str)
    }
}

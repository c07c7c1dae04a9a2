//! The media record.
//!
//! A [`MediaItem`] is the metadata for one uploaded file: identity, where the
//! original lives (disk + file name), and an open-ended property bag. The
//! responsive manifest is stored in that bag under
//! [`RESPONSIVE_IMAGES_KEY`]; absence of the key means "not generated".
//!
//! ## Storage layout
//!
//! ```text
//! {id}-{salt}/                        # MediaItem::directory
//! ├── photo.jpg                       # original
//! ├── responsive/
//! │   ├── photo_1920w.webp
//! │   └── photo_1920w.jpg
//! └── conversions/
//!     └── thumb/
//!         └── photo.webp
//! ```
//!
//! The salt is the first 32 hex characters of `sha256(id ‖ app_key)`, so
//! directory names cannot be guessed from the id alone. Everything that
//! builds a path asks the record for its directory instead of rebuilding it.

use crate::format::{self, ImageFormat};
use crate::responsive::ResponsiveVariant;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Property-bag key holding the responsive manifest.
pub const RESPONSIVE_IMAGES_KEY: &str = "responsive_images";

/// Opaque media identity, assigned by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    /// Display name, defaults to the file stem.
    pub name: String,
    pub file_name: String,
    pub mime_type: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    pub disk: String,
    #[serde(default)]
    pub custom_properties: Map<String, Value>,
}

impl MediaItem {
    /// Top-level MIME type (`"image"` for `image/png`).
    pub fn media_type(&self) -> &str {
        self.mime_type
            .split_once('/')
            .map_or(self.mime_type.as_str(), |(kind, _)| kind)
    }

    pub fn is_of_type(&self, kind: &str) -> bool {
        self.media_type() == kind
    }

    pub fn is_image(&self) -> bool {
        self.is_of_type("image")
    }

    pub fn extension(&self) -> Option<&str> {
        format::file_extension(&self.file_name)
    }

    /// Format of the original, from its MIME type, then its extension.
    pub fn source_format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime_type(&self.mime_type)
            .or_else(|| self.extension().and_then(ImageFormat::from_extension))
    }

    /// Salted per-media directory name.
    pub fn directory(&self, app_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.0.to_string().as_bytes());
        hasher.update(app_key.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("{}-{}", self.id, &digest[..32])
    }

    pub fn original_path(&self, app_key: &str) -> String {
        format!("{}/{}", self.directory(app_key), self.file_name)
    }

    pub fn responsive_dir(&self, app_key: &str) -> String {
        format!("{}/responsive", self.directory(app_key))
    }

    /// Path of a responsive variant. Built from the file stem at the time of
    /// the call; existing manifest entries keep the path they were written with.
    pub fn responsive_path(&self, app_key: &str, width: u32, format: ImageFormat) -> String {
        format!(
            "{}/{}_{}w.{}",
            self.responsive_dir(app_key),
            format::file_stem(&self.file_name),
            width,
            format.extension()
        )
    }

    pub fn conversion_dir(&self, app_key: &str, conversion: &str) -> String {
        format!("{}/conversions/{}", self.directory(app_key), conversion)
    }

    /// Path of a named conversion written with `extension`.
    pub fn conversion_path(&self, app_key: &str, conversion: &str, extension: &str) -> String {
        format!(
            "{}/{}",
            self.conversion_dir(app_key, conversion),
            format::replace_extension(&self.file_name, extension)
        )
    }

    // ---- property bag -------------------------------------------------------

    pub fn has_custom_property(&self, key: &str) -> bool {
        self.custom_properties.contains_key(key)
    }

    pub fn custom_property(&self, key: &str) -> Option<&Value> {
        self.custom_properties.get(key)
    }

    pub fn set_custom_property(&mut self, key: impl Into<String>, value: Value) {
        self.custom_properties.insert(key.into(), value);
    }

    pub fn forget_custom_property(&mut self, key: &str) -> Option<Value> {
        self.custom_properties.remove(key)
    }

    // ---- responsive manifest ------------------------------------------------

    pub fn has_responsive_images(&self) -> bool {
        self.has_custom_property(RESPONSIVE_IMAGES_KEY)
    }

    /// The stored manifest. A malformed manifest reads as empty.
    pub fn responsive_variants(&self) -> Vec<ResponsiveVariant> {
        let Some(value) = self.custom_property(RESPONSIVE_IMAGES_KEY) else {
            return Vec::new();
        };
        match serde_json::from_value(value.clone()) {
            Ok(variants) => variants,
            Err(e) => {
                tracing::warn!(media_id = %self.id, error = %e, "Ignoring malformed responsive manifest");
                Vec::new()
            }
        }
    }

    /// Replace the whole manifest.
    pub fn set_responsive_variants(&mut self, variants: &[ResponsiveVariant]) {
        let value = serde_json::to_value(variants).unwrap_or_else(|_| Value::Array(Vec::new()));
        self.set_custom_property(RESPONSIVE_IMAGES_KEY, value);
    }

    pub fn forget_responsive_variants(&mut self) -> bool {
        self.forget_custom_property(RESPONSIVE_IMAGES_KEY).is_some()
    }

    pub fn variants_by_format(&self, format: ImageFormat) -> Vec<ResponsiveVariant> {
        self.responsive_variants()
            .into_iter()
            .filter(|v| v.format == format)
            .collect()
    }

    /// Smallest variant of `format` at least `target_width` wide.
    pub fn responsive_for_width(&self, target_width: u32, format: ImageFormat) -> Option<ResponsiveVariant> {
        self.variants_by_format(format)
            .into_iter()
            .filter(|v| v.width >= target_width)
            .min_by_key(|v| v.width)
    }

    /// Formats present in the manifest, best delivery format first.
    pub fn available_formats(&self) -> Vec<ImageFormat> {
        let mut formats: Vec<_> = self.responsive_variants().iter().map(|v| v.format).collect();
        formats.sort_by_key(|f| (f.delivery_priority(), *f));
        formats.dedup();
        formats
    }

    /// Largest width/height recorded in the manifest.
    pub fn manifest_dimensions(&self) -> Option<(u32, u32)> {
        if !self.is_image() {
            return None;
        }
        self.responsive_variants()
            .into_iter()
            .max_by_key(|v| v.width)
            .map(|v| (v.width, v.height))
    }

    /// Human-readable size (`"1.5 MB"`).
    pub fn friendly_size(&self) -> String {
        friendly_size(self.size_bytes)
    }
}

/// Binary-unit size with at most two decimals.
pub fn friendly_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 KB".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size > 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.2}", size);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Replace characters that break storage paths or URLs with `-`.
pub fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| match c {
            '#' | '/' | '\\' | ' ' => '-',
            other => other,
        })
        .collect()
}

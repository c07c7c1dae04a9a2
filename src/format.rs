//! The closed set of image formats the library knows how to name.
//!
//! A format has one canonical file extension (the one written to storage),
//! a canonical MIME type, and any number of accepted aliases. Parsing is
//! case-insensitive and accepts the aliases (`jpeg`, `tif`); printing always
//! produces the canonical token.
//!
//! Besides the plain mappings this module carries the two name-based
//! heuristics used by conversion path inference: sniffing a format token out
//! of a conversion name, and the probe order used when looking for an
//! already-written conversion on disk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An image format token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Webp,
    Avif,
    Png,
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    Gif,
    Bmp,
    #[serde(alias = "tif")]
    Tiff,
    Heic,
    Heif,
}

/// Order in which extensions are probed on storage when nothing else is known.
pub const PROBE_ORDER: [ImageFormat; 9] = [
    ImageFormat::Webp,
    ImageFormat::Avif,
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::Heic,
    ImageFormat::Heif,
];

/// Name tokens checked against a lowercased conversion name, first match wins.
const NAME_TOKENS: &[(&str, ImageFormat)] = &[
    ("webp", ImageFormat::Webp),
    ("avif", ImageFormat::Avif),
    ("png", ImageFormat::Png),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
    ("tif", ImageFormat::Tiff),
    ("heic", ImageFormat::Heic),
    ("heif", ImageFormat::Heif),
];

impl ImageFormat {
    /// Canonical extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Heic => "heic",
            ImageFormat::Heif => "heif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Webp => "image/webp",
            ImageFormat::Avif => "image/avif",
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Heic => "image/heic",
            ImageFormat::Heif => "image/heif",
        }
    }

    /// Look up a format by file extension (case-insensitive, aliases accepted).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "webp" => Some(ImageFormat::Webp),
            "avif" => Some(ImageFormat::Avif),
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" | "jpe" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "heic" => Some(ImageFormat::Heic),
            "heif" => Some(ImageFormat::Heif),
            _ => None,
        }
    }

    /// Look up a format by MIME type, including the common non-standard aliases.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/webp" => Some(ImageFormat::Webp),
            "image/avif" => Some(ImageFormat::Avif),
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            "image/gif" => Some(ImageFormat::Gif),
            "image/bmp" | "image/x-ms-bmp" | "image/x-windows-bmp" => Some(ImageFormat::Bmp),
            "image/tiff" | "image/tif" => Some(ImageFormat::Tiff),
            "image/heic" => Some(ImageFormat::Heic),
            "image/heif" => Some(ImageFormat::Heif),
            _ => None,
        }
    }

    /// Sniff a format token out of a conversion name (`"thumb-webp"` → WebP).
    pub fn detect_in_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        NAME_TOKENS
            .iter()
            .find(|(token, _)| lowered.contains(token))
            .map(|(_, format)| *format)
    }

    /// Formats a responsive variant may be produced in.
    pub fn is_responsive_target(self) -> bool {
        matches!(
            self,
            ImageFormat::Webp | ImageFormat::Avif | ImageFormat::Png | ImageFormat::Jpeg
        )
    }

    /// Rank used when ordering `<source>` elements: modern formats first.
    pub fn delivery_priority(self) -> u8 {
        match self {
            ImageFormat::Avif => 0,
            ImageFormat::Webp => 1,
            ImageFormat::Jpeg => 2,
            ImageFormat::Png => 3,
            ImageFormat::Gif => 4,
            ImageFormat::Bmp => 5,
            ImageFormat::Tiff => 6,
            ImageFormat::Heic => 7,
            ImageFormat::Heif => 8,
        }
    }

    /// The `image` crate's codec handle, when one is compiled in.
    pub fn to_codec(self) -> Option<image::ImageFormat> {
        match self {
            ImageFormat::Webp => Some(image::ImageFormat::WebP),
            ImageFormat::Avif => Some(image::ImageFormat::Avif),
            ImageFormat::Png => Some(image::ImageFormat::Png),
            ImageFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageFormat::Gif => Some(image::ImageFormat::Gif),
            ImageFormat::Bmp => Some(image::ImageFormat::Bmp),
            ImageFormat::Tiff => Some(image::ImageFormat::Tiff),
            ImageFormat::Heic | ImageFormat::Heif => None,
        }
    }

    pub fn from_codec(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            image::ImageFormat::Avif => Some(ImageFormat::Avif),
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
            image::ImageFormat::Tiff => Some(ImageFormat::Tiff),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Error returned when a format token is not in the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for ImageFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFormat::from_extension(s).ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

/// Replace (or add) the extension of a bare file name.
///
/// `"photo.final.jpeg"` with `webp` → `"photo.final.webp"`.
pub fn replace_extension(file_name: &str, extension: &str) -> String {
    format!("{}.{}", file_stem(file_name), extension)
}

/// File name without its last extension. Dot-files keep their name.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(pos) => &file_name[..pos],
    }
}

/// Last extension of a file name, without the dot.
pub fn file_extension(file_name: &str) -> Option<&str> {
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(pos) => Some(&file_name[pos + 1..]),
    }
}

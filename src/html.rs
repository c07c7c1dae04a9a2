//! `srcset` and `<picture>` markup from a responsive manifest.
//!
//! Sources are emitted best delivery format first (avif, webp, jpg, png).
//! The last available format becomes the `<img>` fallback, so a manifest
//! with formats `[webp, jpg]` renders:
//!
//! ```html
//! <picture>
//!   <source type="image/webp" srcset="… 1920w, … 1024w" sizes="100vw">
//!   <img src="…_1920w.jpg" srcset="… 1920w, … 1024w" sizes="100vw" alt="…" width="1920" height="1080" loading="lazy">
//! </picture>
//! ```

use crate::format::ImageFormat;
use crate::media::MediaItem;
use crate::responsive::ResponsiveVariant;
use maud::{Markup, html};

/// Default `sizes` attribute.
pub const DEFAULT_SIZES: &str = "100vw";

/// `url {width}w` pairs for one format, widest first.
pub fn srcset(variants: &[ResponsiveVariant], format: ImageFormat) -> String {
    let mut matching: Vec<_> = variants.iter().filter(|v| v.format == format).collect();
    matching.sort_by(|a, b| b.width.cmp(&a.width));
    matching
        .iter()
        .map(|v| format!("{} {}w", v.url, v.width))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A `<picture>` for `media`. Without a manifest this is a plain `<img>`
/// pointing at the original.
pub fn picture(media: &MediaItem, original_url: &str, alt: &str, sizes: &str) -> Markup {
    let variants = media.responsive_variants();
    let formats = media.available_formats();
    let Some((&fallback, modern)) = formats.split_last() else {
        return html! {
            img src=(original_url) alt=(alt) loading="lazy";
        };
    };

    let fallback_src = variants
        .iter()
        .filter(|v| v.format == fallback)
        .max_by_key(|v| v.width)
        .map(|v| v.url.as_str())
        .unwrap_or(original_url);
    let (width, height) = media.manifest_dimensions().unzip();

    html! {
        picture {
            @for format in modern {
                source type=(format.mime_type()) srcset=(srcset(&variants, *format)) sizes=(sizes);
            }
            img src=(fallback_src)
                srcset=(srcset(&variants, fallback))
                sizes=(sizes)
                alt=(alt)
                width=[width]
                height=[height]
                loading="lazy";
        }
    }
}

//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every media item leads with its id and display name; storage paths and
//! variant details follow as indented context lines:
//!
//! ```text
//! 007 sunset (image/jpeg, 2.4 MB)
//!     Source: public:7-3f9a…/sunset.jpg
//!     1920w webp: 7-3f9a…/responsive/sunset_1920w.webp (181.2 KB)
//!     1920w jpg: 7-3f9a…/responsive/sunset_1920w.jpg (402 KB)
//! ```
//!
//! Batch commands end with a one-line summary:
//!
//! ```text
//! Generated 3, queued 0, skipped 1, failed 1
//!     Failed: 012 - Disk `s3` is not configured
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::admin::{BatchReport, StatsReport};
use crate::conversions::ManipulateOutcome;
use crate::media::{MediaId, MediaItem, friendly_size};
use crate::responsive::GenerateOutcome;
use crate::service::Dispatched;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a media id as 3-digit zero-padded.
fn format_id(id: MediaId) -> String {
    format!("{:0>3}", id.0)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Header line for a media item.
///
/// ```text
/// 007 sunset (image/jpeg, 2.4 MB)
/// ```
fn media_header(media: &MediaItem) -> String {
    format!(
        "{} {} ({}, {})",
        format_id(media.id),
        media.name,
        media.mime_type,
        media.friendly_size()
    )
}

// ============================================================================
// Single media
// ============================================================================

/// A media item with its original path and manifest.
pub fn format_media(media: &MediaItem, original_path: &str) -> Vec<String> {
    let mut lines = vec![media_header(media)];
    lines.push(format!("{}Source: {}:{}", indent(1), media.disk, original_path));
    for variant in media.responsive_variants() {
        lines.push(format!(
            "{}{}w {}: {} ({})",
            indent(1),
            variant.width,
            variant.format,
            variant.path,
            friendly_size(variant.size_bytes)
        ));
    }
    lines
}

pub fn print_media(media: &MediaItem, original_path: &str) {
    for line in format_media(media, original_path) {
        println!("{}", line);
    }
}

/// Result of a single generate call.
pub fn format_generate(id: MediaId, result: &Dispatched<GenerateOutcome>) -> Vec<String> {
    let outcome = match result {
        Dispatched::Queued => return vec![format!("{} queued", format_id(id))],
        Dispatched::Completed(outcome) => outcome,
    };
    match outcome {
        GenerateOutcome::Generated(variants) => {
            let mut lines = vec![format!("{} generated {} variants", format_id(id), variants.len())];
            lines.extend(variants.iter().map(|v| {
                format!("{}{}w {}: {}", indent(1), v.width, v.format, v.path)
            }));
            lines
        }
        GenerateOutcome::SkippedNotImage => vec![format!("{} skipped: not an image", format_id(id))],
        GenerateOutcome::SkippedSourceMissing => {
            vec![format!("{} skipped: original missing", format_id(id))]
        }
    }
}

pub fn print_generate(id: MediaId, result: &Dispatched<GenerateOutcome>) {
    for line in format_generate(id, result) {
        println!("{}", line);
    }
}

/// Result of a conversions call.
pub fn format_conversions(id: MediaId, result: &Dispatched<ManipulateOutcome>) -> Vec<String> {
    match result {
        Dispatched::Queued => vec![format!("{} conversions queued", format_id(id))],
        Dispatched::Completed(ManipulateOutcome::SkippedNotImage) => {
            vec![format!("{} skipped: not an image", format_id(id))]
        }
        Dispatched::Completed(ManipulateOutcome::Performed { written, skipped }) => {
            let mut lines = vec![format!(
                "{} wrote {}, kept {}",
                format_id(id),
                written.len(),
                skipped.len()
            )];
            for (name, path) in written {
                lines.push(format!("{}{} \u{2192} {}", indent(1), name, path));
            }
            for name in skipped {
                lines.push(format!("{}{}: exists", indent(1), name));
            }
            lines
        }
    }
}

pub fn print_conversions(id: MediaId, result: &Dispatched<ManipulateOutcome>) {
    for line in format_conversions(id, result) {
        println!("{}", line);
    }
}

// ============================================================================
// Batches
// ============================================================================

/// Summary of a batch run. `verb` names what a processed item had done to it.
pub fn format_batch_report(verb: &str, report: &BatchReport) -> Vec<String> {
    if report.is_empty() {
        return vec!["No media items found to process.".to_string()];
    }
    let mut lines = vec![format!(
        "{} {}, queued {}, skipped {}, failed {}",
        verb,
        report.processed.len(),
        report.queued.len(),
        report.skipped.len(),
        report.failed.len()
    )];
    for (id, error) in &report.failed {
        lines.push(format!("{}Failed: {} - {}", indent(1), format_id(*id), error));
    }
    lines
}

pub fn print_batch_report(verb: &str, report: &BatchReport) {
    for line in format_batch_report(verb, report) {
        println!("{}", line);
    }
}

/// Coverage statistics followed by the effective configuration.
pub fn format_stats(stats: &StatsReport) -> Vec<String> {
    let mut lines = vec![
        "Responsive Images".to_string(),
        format!("{}Total images: {}", indent(1), stats.total_images),
        format!("{}With responsive images: {}", indent(1), stats.with_responsive),
        format!("{}Without responsive images: {}", indent(1), stats.without_responsive()),
    ];
    if let Some(coverage) = stats.coverage() {
        lines.push(format!("{}Coverage: {}%", indent(1), coverage));
    }
    lines.push(String::new());
    lines.push("Config".to_string());
    lines.push(format!("{}Enabled: {}", indent(1), yes_no(stats.enabled)));
    lines.push(format!("{}Auto generate: {}", indent(1), yes_no(stats.auto_generate)));
    lines.push(format!("{}Queue: {}", indent(1), yes_no(stats.queue)));
    lines.push(format!("{}Quality: {}", indent(1), stats.quality));
    lines.push(format!("{}Formats: {}", indent(1), join(&stats.formats)));
    lines.push(format!("{}Breakpoints: {}", indent(1), join(&stats.breakpoints)));
    lines.push(format!("{}Width calculator: {}", indent(1), stats.width_calculator));
    lines
}

pub fn print_stats(stats: &StatsReport) {
    for line in format_stats(stats) {
        println!("{}", line);
    }
}

//! # mediaforge
//!
//! A media library that stores uploaded originals on named disks and derives
//! responsive image sets and named conversions from them.
//!
//! # Architecture: Original → Derivatives
//!
//! Every media item owns one salted directory on its disk. The original sits
//! at the top; everything derived from it lives in subdirectories and can be
//! deleted and regenerated at will:
//!
//! ```text
//! {id}-{sha256(id ‖ app_key)[..32]}/
//! ├── sunset.jpg                              original
//! ├── responsive/sunset_1920w.webp            responsive set (width × format)
//! └── conversions/thumb/sunset.webp           named conversion
//! ```
//!
//! The responsive set is recorded as a manifest in the media item's custom
//! properties, so rendering a `<picture>` never touches storage.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`service`] | Upload, dispatch (queued or inline), delete, relocate, rename |
//! | [`responsive`] | Width calculators, manifest model, the responsive set generator |
//! | [`conversions`] | Conversion registry, config presets, manipulator, path resolver |
//! | [`imaging`] | Codec trait (`ImageBackend`), pure-Rust backend, scaling math |
//! | [`storage`] | `Storage` trait, local and in-memory disks, named `Disks` |
//! | [`media`] | `MediaItem`, directory derivation, manifest property bag |
//! | [`records`] | `RecordStore` trait, JSON file store, `MediaFilter` |
//! | [`collections`] | Named collections and selectors |
//! | [`queue`] | Task payloads, `TaskQueue`, background `WorkerQueue` |
//! | [`admin`] | Batch generate/clear and coverage statistics |
//! | [`html`] | `srcset` and `<picture>` markup with Maud |
//! | [`config`] | `mediaforge.toml` loading, merging and validation |
//! | [`format`] | Closed set of image formats and their extensions/MIME types |
//! | [`error`] | `MediaError`, the pipeline error taxonomy |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## All-or-Nothing Manifests
//!
//! A generation run renders every (width × format) variant in parallel and
//! only then replaces the manifest. A failure leaves the previous manifest in
//! place; files already written may stay on disk until the next run
//! overwrites them.
//!
//! ## Typed Skips
//!
//! Non-images and missing originals are not errors. Generation returns
//! [`responsive::GenerateOutcome`] and conversions return
//! [`conversions::ManipulateOutcome`], so batch callers can tell "skipped"
//! from "failed".
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, Lanczos3
//! resampling and encoding. No system libraries are needed.

pub mod admin;
pub mod collections;
pub mod config;
pub mod conversions;
pub mod error;
pub mod format;
pub mod html;
pub mod imaging;
pub mod media;
pub mod output;
pub mod queue;
pub mod records;
pub mod responsive;
pub mod service;
pub mod storage;

pub use error::MediaError;

#[cfg(test)]
pub(crate) mod test_helpers;

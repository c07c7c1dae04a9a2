//! Where a conversion's output lives.
//!
//! A conversion's output format is only certain once it has run, but URLs
//! are needed before that. The resolver infers the extension best-effort,
//! in this order:
//!
//! 1. a format remembered for this (media, conversion) in this process
//! 2. the format declared at registration
//! 3. a format token in the conversion name (`thumb-webp`)
//! 4. an existing file under any known extension, in [`PROBE_ORDER`]
//! 5. otherwise the original's file name unchanged
//!
//! Inference never fails: storage errors during probing just move on to the
//! next candidate. Callers that need certainty use [`has_conversion`].
//!
//! [`has_conversion`]: ConversionPathResolver::has_conversion

use super::registry::ConversionRegistry;
use crate::error::MediaError;
use crate::format::{ImageFormat, PROBE_ORDER};
use crate::media::{MediaId, MediaItem};
use crate::storage::Disks;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type FormatCache = HashMap<(MediaId, String), ImageFormat>;

pub struct ConversionPathResolver {
    registry: Arc<ConversionRegistry>,
    disks: Disks,
    app_key: String,
    cache: Mutex<FormatCache>,
}

impl ConversionPathResolver {
    pub fn new(registry: Arc<ConversionRegistry>, disks: Disks, app_key: impl Into<String>) -> Self {
        Self {
            registry,
            disks,
            app_key: app_key.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ConversionRegistry> {
        &self.registry
    }

    fn cache(&self) -> MutexGuard<'_, FormatCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the format a conversion actually produced.
    pub fn remember(&self, media: MediaId, conversion: &str, format: ImageFormat) {
        self.cache().insert((media, conversion.to_string()), format);
    }

    pub fn clear_format_cache(&self) {
        self.cache().clear();
    }

    /// Drop everything remembered for one media item.
    pub fn forget_media(&self, media: MediaId) {
        self.cache().retain(|(id, _), _| *id != media);
    }

    /// Best-effort output format of `conversion` for `media`.
    pub fn detect_format(&self, media: &MediaItem, conversion: &str) -> Option<ImageFormat> {
        if let Some(format) = self.cache().get(&(media.id, conversion.to_string())) {
            return Some(*format);
        }
        if !media.is_image() {
            return None;
        }
        let registered = self.registry.get(conversion).ok()?;

        let detected = registered
            .output_format()
            .or_else(|| ImageFormat::detect_in_name(conversion))
            .or_else(|| self.probe_existing(media, conversion));

        if let Some(format) = detected {
            self.remember(media.id, conversion, format);
        }
        detected
    }

    fn probe_existing(&self, media: &MediaItem, conversion: &str) -> Option<ImageFormat> {
        let disk = self.disks.get(&media.disk).ok()?;
        PROBE_ORDER.into_iter().find(|format| {
            let path = media.conversion_path(&self.app_key, conversion, format.extension());
            match disk.exists(&path) {
                Ok(found) => found,
                Err(e) => {
                    tracing::debug!(media_id = %media.id, %path, error = %e, "Probe failed");
                    false
                }
            }
        })
    }

    /// Storage path of the conversion, using the inferred extension.
    pub fn conversion_path(&self, media: &MediaItem, conversion: &str) -> String {
        match self.detect_format(media, conversion) {
            Some(format) => media.conversion_path(&self.app_key, conversion, format.extension()),
            None => format!(
                "{}/{}",
                media.conversion_dir(&self.app_key, conversion),
                media.file_name
            ),
        }
    }

    pub fn conversion_url(&self, media: &MediaItem, conversion: &str) -> Result<String, MediaError> {
        let disk = self.disks.get(&media.disk)?;
        Ok(disk.url(&self.conversion_path(media, conversion)))
    }

    /// Whether the conversion's file exists at its inferred path.
    pub fn has_conversion(&self, media: &MediaItem, conversion: &str) -> Result<bool, MediaError> {
        let disk = self.disks.get(&media.disk)?;
        Ok(disk.exists(&self.conversion_path(media, conversion))?)
    }
}

//! Library configuration.
//!
//! Handles loading, validating, and merging the `mediaforge.toml` file. The
//! file is sparse: stock defaults are the base layer and the user file only
//! overrides the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! app_key = "change-me"            # Salt for per-media directory names
//! default_disk = "public"          # Disk new uploads go to
//! default_collection = "Default"   # Collection attached when none is given
//! check_disk_accessibility = false # Probe a disk with write+delete before moving to it
//! records = "media.json"           # JSON record store
//!
//! [disks.public]
//! driver = "local"                 # local | memory
//! root = "storage/public"
//! url = "/storage"
//!
//! [responsive_images]
//! enabled = true
//! breakpoints = [320, 640, 1024, 1366, 1920]
//! quality = 85                     # 1-100
//! formats = ["webp", "jpg"]
//! queue = true                     # Generate in the background by default
//! width_calculator = "breakpoint"  # breakpoint | file_size_optimized
//! auto_generate = false            # Generate on every image upload
//! # min_width = 320
//! # max_width = 2560
//!
//! [conversions.thumb]
//! width = 300
//! height = 300
//! format = "webp"
//!
//! [processing]
//! max_processes = 4                # Max parallel encoders (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::conversions::ConversionPreset;
use crate::imaging::Quality;
use crate::responsive::{
    DEFAULT_BREAKPOINTS, ResponsiveDefaults, WidthCalculator, WidthCalculatorKind,
    build_calculator,
};
use crate::format::ImageFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "mediaforge.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Library configuration loaded from `mediaforge.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Salt mixed into every media directory name.
    pub app_key: String,
    pub default_disk: String,
    pub default_collection: String,
    /// Probe a disk with a write and a delete before relocating media onto it.
    pub check_disk_accessibility: bool,
    /// Path of the JSON record store.
    pub records: PathBuf,
    pub disks: BTreeMap<String, DiskConfig>,
    pub responsive_images: ResponsiveImagesConfig,
    /// Declarative conversions, registered under their table name.
    pub conversions: BTreeMap<String, ConversionPreset>,
    pub processing: ProcessingConfig,
}

impl Default for MediaConfig {
    fn default() -> Self {
        let mut disks = BTreeMap::new();
        disks.insert("public".to_string(), DiskConfig::default());
        Self {
            app_key: "change-me".to_string(),
            default_disk: "public".to_string(),
            default_collection: "Default".to_string(),
            check_disk_accessibility: false,
            records: PathBuf::from("media.json"),
            disks,
            responsive_images: ResponsiveImagesConfig::default(),
            conversions: BTreeMap::new(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl MediaConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_key.is_empty() {
            return Err(ConfigError::Validation("app_key must not be empty".into()));
        }
        if !self.disks.contains_key(&self.default_disk) {
            return Err(ConfigError::Validation(format!(
                "default_disk `{}` is not declared under [disks]",
                self.default_disk
            )));
        }
        self.responsive_images.validate()?;
        for (name, preset) in &self.conversions {
            if preset.width == Some(0) || preset.height == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "conversions.{name}: width and height must be positive"
                )));
            }
        }
        Ok(())
    }
}

/// Storage driver behind a named disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskDriver {
    #[default]
    Local,
    /// Process-local; contents are lost on exit.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiskConfig {
    pub driver: DiskDriver,
    /// Root directory for the `local` driver.
    pub root: PathBuf,
    /// Public URL prefix for files on this disk.
    pub url: String,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            driver: DiskDriver::Local,
            root: PathBuf::from("storage/public"),
            url: "/storage".to_string(),
        }
    }
}

/// Responsive image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponsiveImagesConfig {
    pub enabled: bool,
    /// Candidate widths for the breakpoint strategy.
    pub breakpoints: Vec<u32>,
    /// Encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    /// Output formats, in `<picture>` source order.
    pub formats: Vec<ImageFormat>,
    /// Whether generation goes through the task queue unless the caller says otherwise.
    pub queue: bool,
    pub width_calculator: WidthCalculatorKind,
    /// Generate a responsive set on every image upload.
    pub auto_generate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
}

impl Default for ResponsiveImagesConfig {
    fn default() -> Self {
        let defaults = ResponsiveDefaults::default();
        Self {
            enabled: true,
            breakpoints: DEFAULT_BREAKPOINTS.to_vec(),
            quality: defaults.quality.value(),
            formats: defaults.formats,
            queue: true,
            width_calculator: WidthCalculatorKind::default(),
            auto_generate: false,
            min_width: None,
            max_width: None,
        }
    }
}

impl ResponsiveImagesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation(
                "responsive_images.quality must be 1-100".into(),
            ));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::Validation(
                "responsive_images.formats must not be empty".into(),
            ));
        }
        if self.breakpoints.is_empty() || self.breakpoints.contains(&0) {
            return Err(ConfigError::Validation(
                "responsive_images.breakpoints must be non-empty and positive".into(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_width, self.max_width)
            && min > max
        {
            return Err(ConfigError::Validation(
                "responsive_images.min_width must not exceed max_width".into(),
            ));
        }
        Ok(())
    }

    /// Quality and formats used when a run leaves them unset.
    pub fn defaults(&self) -> ResponsiveDefaults {
        ResponsiveDefaults {
            quality: Quality::new(self.quality),
            formats: self.formats.clone(),
        }
    }

    /// The configured width strategy, bounded by `min_width`/`max_width`.
    pub fn calculator(&self) -> Box<dyn WidthCalculator> {
        build_calculator(
            self.width_calculator,
            &self.breakpoints,
            self.min_width,
            self.max_width,
        )
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encoder threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(MediaConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. A missing file is `Ok(None)`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MediaConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MediaConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<MediaConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_none() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
    }
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `mediaforge.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# mediaforge configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Salt mixed into every media directory name ({id}-{hash}).
# Changing it orphans every stored file, so set it once.
app_key = "change-me"

# Disk new uploads are written to. Must be declared under [disks].
default_disk = "public"

# Collection attached to uploads that name none (only if it exists).
default_collection = "Default"

# Probe a disk with a write and a delete before moving media onto it.
check_disk_accessibility = false

# JSON file holding media records and collections.
records = "media.json"

# ---------------------------------------------------------------------------
# Disks
# ---------------------------------------------------------------------------
[disks.public]
# local: files under `root`. memory: lost when the process exits.
driver = "local"
root = "storage/public"
# Public URL prefix for files on this disk.
url = "/storage"

# ---------------------------------------------------------------------------
# Responsive images
# ---------------------------------------------------------------------------
[responsive_images]
enabled = true

# Candidate widths for the breakpoint strategy.
breakpoints = [320, 640, 1024, 1366, 1920]

# Encoding quality (1 = worst, 100 = best).
quality = 85

# Output formats, in <picture> source order. The last one is the <img> fallback.
# Responsive formats: webp, avif, jpg, png.
formats = ["webp", "jpg"]

# Generate through the background queue unless told otherwise.
queue = true

# breakpoint: configured breakpoints that fit the original.
# file_size_optimized: widths stepping the predicted file size down by 30%.
width_calculator = "breakpoint"

# Generate a responsive set on every image upload.
auto_generate = false

# Optional bounds applied around the width strategy.
# min_width = 320
# max_width = 2560

# ---------------------------------------------------------------------------
# Conversions
# ---------------------------------------------------------------------------
# Each table registers a named conversion. The image is fitted inside
# width x height without upscaling. Without `format` the original's
# format is kept.
#
# [conversions.thumb]
# width = 300
# height = 300
# format = "webp"
# quality = 80

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel encoder threads. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4
"##
}

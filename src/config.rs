//! Store configuration module.
//!
//! Handles loading, validating, and merging `mapkeeper.toml`. Configuration is
//! layered: stock defaults are overridden by the user file found in the data
//! directory. The resulting [`StoreConfig`] is an ordinary value handed to
//! [`MapStore::new`](crate::store::MapStore::new), so tests can run several
//! independent stores side by side with different settings.
//!
//! ## Data Directory Layout
//!
//! ```text
//! data/
//! ├── mapkeeper.toml                 # Store config (optional)
//! ├── app-data/
//! │   ├── pinned.txt                 # Pinned popups (JSON-Lines)
//! │   └── maps/
//! │       ├── maps-loading-order.json
//! │       └── Region/
//! │           ├── world.png          # Map image
//! │           ├── markers.txt        # Markers (JSON-Lines)
//! │           ├── item-details.json  # Item metadata (whole JSON)
//! │           └── images/            # Uploaded attachments
//! ├── presets/                       # Marker presets (JSON-Lines *.txt)
//! └── assets/                        # Preset icons
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! [maps]
//! image_extensions = ["png", "jpg", "jpeg", "gif", "webp"]
//! default_size = [1280, 720]
//! image_url_marker = "/api/map-images/"
//!
//! [logging]
//! verbose = true    # Log every mutating store operation at info level
//! debug = false     # Trace path resolution and skipped records
//!
//! [writes]
//! lock_per_file = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file inside the data directory.
pub const CONFIG_FILENAME: &str = "mapkeeper.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Store configuration loaded from `mapkeeper.toml`.
///
/// `data_dir` is never read from the file; it is the directory the file was
/// loaded from (or `data` for [`StoreConfig::default`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Map catalog and image settings.
    pub maps: MapsConfig,
    /// Log verbosity toggles.
    pub logging: LoggingConfig,
    /// Write serialization settings.
    pub writes: WritesConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            maps: MapsConfig::default(),
            logging: LoggingConfig::default(),
            writes: WritesConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Default config rooted at `data_dir`.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn app_data_dir(&self) -> PathBuf {
        self.data_dir.join("app-data")
    }

    pub fn maps_root(&self) -> PathBuf {
        self.app_data_dir().join("maps")
    }

    pub fn pinned_file(&self) -> PathBuf {
        self.app_data_dir().join("pinned.txt")
    }

    pub fn presets_dir(&self) -> PathBuf {
        self.data_dir.join("presets")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maps.image_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "maps.image_extensions must not be empty".into(),
            ));
        }
        if let Some(bad) = self
            .maps
            .image_extensions
            .iter()
            .find(|e| e.is_empty() || !e.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(ConfigError::Validation(format!(
                "maps.image_extensions entry {bad:?} must be a bare extension like \"png\""
            )));
        }
        if self.maps.default_size[0] == 0 || self.maps.default_size[1] == 0 {
            return Err(ConfigError::Validation(
                "maps.default_size values must be non-zero".into(),
            ));
        }
        if !self.maps.image_url_marker.starts_with('/') {
            return Err(ConfigError::Validation(
                "maps.image_url_marker must start with '/'".into(),
            ));
        }
        Ok(())
    }
}

/// Map catalog and image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapsConfig {
    /// Extensions (without dot, lowercase) that make a file a map image.
    pub image_extensions: Vec<String>,
    /// `[width, height]` reported for every map by the sizes listing.
    pub default_size: [u32; 2],
    /// Substring identifying an `additionalImage` URL as a local upload.
    pub image_url_marker: String,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            image_extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_size: [1280, 720],
            image_url_marker: "/api/map-images/".to_string(),
        }
    }
}

impl MapsConfig {
    /// True if `name` ends with a supported image extension (case-insensitive).
    pub fn is_image_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.image_extensions.iter().any(|ext| {
            lower
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
        })
    }
}

/// Log verbosity toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log every mutating store operation at info level.
    pub verbose: bool,
    /// Enable debug-level tracing (path resolution, skipped records).
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            debug: false,
        }
    }
}

/// Write serialization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WritesConfig {
    /// Hold a per-file mutex across each read-modify-write.
    pub lock_per_file: bool,
}

impl Default for WritesConfig {
    fn default() -> Self {
        Self {
            lock_per_file: true,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(StoreConfig::default()).expect("default config must serialize")
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

/// Load `mapkeeper.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<StoreConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: StoreConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for the store rooted at `data_dir`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(data_dir: &Path) -> Result<StoreConfig, ConfigError> {
    let overlay = load_raw_config(data_dir)?;
    let mut config = resolve_config(stock_defaults_value(), overlay)?;
    config.data_dir = data_dir.to_path_buf();
    Ok(config)
}

/// Returns a fully-commented stock `mapkeeper.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# mapkeeper configuration
# =======================
# Place this file in the data directory as mapkeeper.toml.
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

[maps]
# File extensions (no dot, lowercase match) that make a file a map image.
image_extensions = ["png", "jpg", "jpeg", "gif", "webp"]
# [width, height] reported for every map by `mapkeeper sizes`.
default_size = [1280, 720]
# additionalImage URLs containing this marker point at uploaded files
# and are deleted when their item is cleaned up.
image_url_marker = "/api/map-images/"

[logging]
# Log every mutating store operation at info level.
verbose = true
# Trace path resolution and skipped records at debug level.
debug = false

[writes]
# Serialize read-modify-write cycles per file within this process.
lock_per_file = true
"##
}

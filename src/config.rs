//! Configuration module.
//!
//! Handles loading, validating, and merging `rethumb.toml`. Stock defaults are
//! overridden by whatever the user file sets; a missing file means "all
//! defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! media_root = "uploads/"                    # Directory holding the media tree
//! public_url = "http://localhost/uploads/"   # Locator prefix mapped onto media_root
//! database = "media.db"                      # SQLite metadata store
//! page_size = 50                             # Attachments fetched per query
//! jpeg_quality = 90                          # JPEG derivative quality (1-100)
//! # error_log = "rethumb-errors.log"         # Also append warnings here
//!
//! [sizes.thumbnail]
//! width = 300
//! height = 275
//! crop = true
//!
//! [sizes.medium]
//! width = 610
//! height = 610
//!
//! [sizes.large]
//! width = 960
//! height = 960
//! ```
//!
//! ## Size Policy Replacement
//!
//! Scalar keys merge over the stock defaults one by one. The `[sizes]` table
//! does not: if the user file defines any size, its `[sizes]` table is the
//! whole policy. Dropping a size from the file drops it from the policy, and
//! the next reconcile run removes its derivatives.
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::{SizePolicy, SizeSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "rethumb.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `rethumb.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the media tree; attachment paths resolve against it.
    pub media_root: PathBuf,
    /// Public URL prefix of `media_root`, stripped from attachment locators.
    pub public_url: String,
    /// SQLite metadata store.
    pub database: PathBuf,
    /// Attachments fetched per store query.
    pub page_size: usize,
    /// JPEG encoder quality for derivatives.
    pub jpeg_quality: u32,
    /// Optional file receiving warnings (skips, failed deletions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<PathBuf>,
    /// Named derivative sizes every image must have.
    pub sizes: SizePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("uploads/"),
            public_url: "http://localhost/uploads/".to_string(),
            database: PathBuf::from("media.db"),
            page_size: 50,
            jpeg_quality: 90,
            error_log: None,
            sizes: stock_sizes(),
        }
    }
}

/// `thumbnail` 300×275 cropped, `medium` 610×610 and `large` 960×960 fitted.
pub fn stock_sizes() -> SizePolicy {
    SizePolicy::from([
        ("thumbnail".to_string(), SizeSpec::crop(300, 275)),
        ("medium".to_string(), SizeSpec::fit(610, 610)),
        ("large".to_string(), SizeSpec::fit(960, 960)),
    ])
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.media_root.to_string_lossy().ends_with('/') {
            return Err(ConfigError::Validation(
                "media_root must end with '/'".into(),
            ));
        }
        if !self.public_url.ends_with('/') {
            return Err(ConfigError::Validation(
                "public_url must end with '/'".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Validation(
                "page_size must be greater than 0".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Validation(
                "jpeg_quality must be 1-100".into(),
            ));
        }
        if self.sizes.is_empty() {
            return Err(ConfigError::Validation("sizes must not be empty".into()));
        }
        for (name, spec) in &self.sizes {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "size names must not be empty".into(),
                ));
            }
            if spec.width == 0 && spec.height == 0 {
                return Err(ConfigError::Validation(format!(
                    "sizes.{name} needs a non-zero width or height"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
///
/// A `sizes` table in the overlay replaces the base policy instead of
/// merging into it.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => {
            let mut base = base;
            if ov.get("sizes").is_some() {
                if let toml::Value::Table(table) = &mut base {
                    table.remove("sizes");
                }
            }
            merge_toml(base, ov)
        }
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `rethumb.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# rethumb configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Directory holding the media tree (year/month folders of uploads).
# Must end with '/'.
media_root = "uploads/"

# Public URL prefix of media_root. Attachment locators must start with it;
# the remainder is the file path relative to media_root. Must end with '/'.
public_url = "http://localhost/uploads/"

# SQLite metadata store. Create an empty one with `rethumb init-db`.
database = "media.db"

# Attachments fetched per store query.
page_size = 50

# JPEG quality for generated derivatives (1-100). GIF and PNG are lossless.
jpeg_quality = 90

# Append warnings (skipped attachments, failed deletions) to this file too.
# error_log = "rethumb-errors.log"

# ---------------------------------------------------------------------------
# Size policy
# ---------------------------------------------------------------------------
# Every image attachment gets one derivative per size. A zero (or omitted)
# width or height leaves that side unconstrained.
#
#   crop = true   fill the exact box, cropping the overflow (centered)
#   crop = false  shrink to fit inside the box, keeping the aspect ratio
#
# Defining any [sizes.*] table here replaces this whole list: sizes you
# leave out are removed, along with their files, on the next run.

[sizes.thumbnail]
width = 300
height = 275
crop = true

[sizes.medium]
width = 610
height = 610
crop = false

[sizes.large]
width = 960
height = 960
crop = false
"##
}

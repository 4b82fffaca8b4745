//! Pipeline configuration.
//!
//! One explicit structure feeds both the generator and the resolver, so the
//! width list and URL layout cannot drift between them. It is loaded from an
//! optional `imgset.toml`, merged over stock defaults, and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source = "public"            # Asset root; logical keys are relative to it
//! output = "public/optimized"  # Derivative root (excluded from the scan)
//! include = []                 # Sub-paths of `source` to scan (empty = all)
//!
//! [images]
//! widths = [320, 640, 960, 1600]
//! min_bytes = 102400
//!
//! [quality]
//! avif = 50
//! avif_speed = 6
//! jpeg = 75
//! png_compression = 9
//!
//! [resolver]
//! url_prefix = "/optimized"
//! cdn_base = ""
//!
//! [processing]
//! max_processes = 4            # omit for auto = CPU cores
//! file_timeout_secs = 120      # 0 disables the timeout
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming::DEFAULT_WIDTHS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "imgset.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Asset root. Logical keys are computed relative to this directory.
    pub source: PathBuf,
    /// Derivative root. Skipped during the scan when nested in `source`.
    pub output: PathBuf,
    /// Sub-paths (directories or single files) of `source` to scan.
    /// Empty means the whole root.
    pub include: Vec<PathBuf>,
    pub images: ImagesConfig,
    pub quality: QualityConfig,
    pub resolver: ResolverSettings,
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("public"),
            output: PathBuf::from("public/optimized"),
            include: Vec::new(),
            images: ImagesConfig::default(),
            quality: QualityConfig::default(),
            resolver: ResolverSettings::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let widths = &self.images.widths;
        if widths.is_empty() {
            return Err(ConfigError::Validation(
                "images.widths must not be empty".into(),
            ));
        }
        if widths.contains(&0) {
            return Err(ConfigError::Validation(
                "images.widths values must be positive".into(),
            ));
        }
        if widths.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Validation(
                "images.widths must be strictly ascending".into(),
            ));
        }
        if !(1..=100).contains(&self.quality.avif) {
            return Err(ConfigError::Validation("quality.avif must be 1-100".into()));
        }
        if !(1..=10).contains(&self.quality.avif_speed) {
            return Err(ConfigError::Validation(
                "quality.avif_speed must be 1-10".into(),
            ));
        }
        if !(1..=100).contains(&self.quality.jpeg) {
            return Err(ConfigError::Validation("quality.jpeg must be 1-100".into()));
        }
        if self.quality.png_compression > 9 {
            return Err(ConfigError::Validation(
                "quality.png_compression must be 0-9".into(),
            ));
        }
        if !self.resolver.url_prefix.starts_with('/') {
            return Err(ConfigError::Validation(
                "resolver.url_prefix must start with '/'".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolver settings derived from this config.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            url_prefix: self.resolver.url_prefix.trim_end_matches('/').to_string(),
            cdn_base: self.resolver.cdn_base.trim_end_matches('/').to_string(),
            widths: self.images.widths.clone(),
        }
    }
}

/// Derivative generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Candidate widths, ascending. Widths above a source's native width are dropped.
    pub widths: Vec<u32>,
    /// Sources smaller than this many bytes are not worth re-encoding.
    pub min_bytes: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            widths: DEFAULT_WIDTHS.to_vec(),
            min_bytes: 100 * 1024,
        }
    }
}

/// Per-format encoder settings. Fixed for the whole run.
///
/// WebP has no entry: the pure-Rust encoder only writes lossless WebP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// AVIF quality (1 = worst, 100 = best).
    pub avif: u32,
    /// rav1e speed preset (1 = slowest/smallest, 10 = fastest).
    pub avif_speed: u8,
    /// JPEG quality (1-100).
    pub jpeg: u32,
    /// PNG compression level (0-9, zlib style).
    pub png_compression: u8,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            avif: 50,
            avif_speed: 6,
            jpeg: 75,
            png_compression: 9,
        }
    }
}

/// How derivatives are addressed once deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSettings {
    /// URL path under which the output root is served.
    pub url_prefix: String,
    /// Optional CDN origin prepended to every root-relative URL.
    pub cdn_base: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            url_prefix: "/optimized".to_string(),
            cdn_base: String::new(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Per-file decode/encode budget in seconds. `0` disables it.
    pub file_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            file_timeout_secs: 120,
        }
    }
}

impl ProcessingConfig {
    pub fn file_timeout(&self) -> Option<Duration> {
        (self.file_timeout_secs > 0).then(|| Duration::from_secs(self.file_timeout_secs))
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Normalized settings handed to the [`Resolver`](crate::resolve::Resolver).
///
/// Trailing slashes are already trimmed from `url_prefix` and `cdn_base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub url_prefix: String,
    pub cdn_base: String,
    pub widths: Vec<u32>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        PipelineConfig::default().resolver_config()
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
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
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, falling back to stock defaults if it is absent.
///
/// Relative `source`, `output`, and `include` paths are kept as written; they
/// are interpreted against the working directory.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imgset.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgset configuration
# ====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Asset root. Logical keys (the part of a derivative path that identifies the
# source) are computed relative to this directory.
source = "public"

# Where derivatives are written. If it lives inside `source` it is skipped
# during the scan, so a second run never re-processes its own output.
output = "public/optimized"

# Restrict the scan to these sub-paths of `source` (directories or single
# files). Empty means the whole root.
include = []

# ---------------------------------------------------------------------------
# Derivatives
# ---------------------------------------------------------------------------
[images]
# Candidate widths, strictly ascending. Widths wider than a source are
# dropped; a source narrower than every width gets one set at its own width.
widths = [320, 640, 960, 1600]

# Sources smaller than this many bytes are skipped.
min_bytes = 102400

# ---------------------------------------------------------------------------
# Encoders (WebP is always lossless)
# ---------------------------------------------------------------------------
[quality]
avif = 50
# rav1e speed preset, 1 (slowest) to 10 (fastest).
avif_speed = 6
jpeg = 75
# PNG compression level, 0 (fastest) to 9 (smallest).
png_compression = 9

# ---------------------------------------------------------------------------
# Resolver
# ---------------------------------------------------------------------------
[resolver]
# URL path under which `output` is served.
url_prefix = "/optimized"

# Optional CDN origin, e.g. "https://cdn.example.com". Applied to every
# root-relative URL, derivatives and originals alike.
cdn_base = ""

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to auto-detect (= number of CPU cores).
# max_processes = 4

# Per-file decode/encode budget in seconds. 0 disables it.
file_timeout_secs = 120
"##
}

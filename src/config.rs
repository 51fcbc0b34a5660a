//! Configuration for the image cache.
//!
//! Two layers live here:
//!
//! - **Cache limits**: the memory thresholds the cache reads from a
//!   [`ConfigSource`] every time it runs a soft flush. Missing keys fall back
//!   to defaults; unparsable values are logged and also fall back.
//! - **CLI configuration**: the [`Config`] struct parsed by the
//!   `pyramid-cache` binary via clap, with `PYRAMID_CACHE_` environment
//!   variable fallbacks.
//!
//! # Configuration Keys
//!
//! - `upperBoundBytes` - Usage the cache is trimmed back to (default: 200MB)
//! - `hysteresisBytes` - Margin above the bound before trimming starts
//!   (default: 25MB)
//!
//! Values are byte counts, optionally with a `KB`, `MB` or `GB` suffix
//! (binary multiples).
//!
//! # Environment Variables
//!
//! [`EnvConfig`] maps each key to an environment variable:
//!
//! - `PYRAMID_CACHE_UPPER_BOUND_BYTES`
//! - `PYRAMID_CACHE_HYSTERESIS_BYTES`

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::warn;

use crate::cache::EvictionOrder;
use crate::error::ConfigError;

// =============================================================================
// Default Values
// =============================================================================

/// Default upper bound on cache usage: 200MB.
pub const DEFAULT_UPPER_BOUND_BYTES: usize = 200 * 1024 * 1024;

/// Default hysteresis above the upper bound: 25MB.
pub const DEFAULT_HYSTERESIS_BYTES: usize = 25 * 1024 * 1024;

/// Configuration key for the upper bound.
pub const UPPER_BOUND_KEY: &str = "upperBoundBytes";

/// Configuration key for the hysteresis.
pub const HYSTERESIS_KEY: &str = "hysteresisBytes";

/// Prefix of the environment variables read by [`EnvConfig`].
pub const ENV_PREFIX: &str = "PYRAMID_CACHE_";

/// Default number of pyramid levels built by the CLI (levels 0 through 2).
pub const DEFAULT_PYRAMID_LEVELS: u32 = 3;

// =============================================================================
// Configuration Source
// =============================================================================

/// A key-value source of configuration strings.
pub trait ConfigSource {
    /// Raw value for `key`, or `None` if the key is not set.
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Reads configuration keys from `PYRAMID_CACHE_*` environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl EnvConfig {
    /// Environment variable name for a configuration key.
    ///
    /// `upperBoundBytes` becomes `PYRAMID_CACHE_UPPER_BOUND_BYTES`.
    pub fn var_name(key: &str) -> String {
        let mut name = String::from(ENV_PREFIX);
        for (i, c) in key.chars().enumerate() {
            if c.is_ascii_uppercase() && i > 0 {
                name.push('_');
            }
            name.push(c.to_ascii_uppercase());
        }
        name
    }
}

impl ConfigSource for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(Self::var_name(key)).ok()
    }
}

// =============================================================================
// Cache Limits
// =============================================================================

/// Memory thresholds for soft flushing.
///
/// The cache is trimmed once usage exceeds `upper_bound_bytes +
/// hysteresis_bytes`, and then trimmed back down to `upper_bound_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheLimits {
    /// Usage to trim back to, in bytes
    pub upper_bound_bytes: usize,

    /// Extra margin above the bound before trimming starts, in bytes
    pub hysteresis_bytes: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            upper_bound_bytes: DEFAULT_UPPER_BOUND_BYTES,
            hysteresis_bytes: DEFAULT_HYSTERESIS_BYTES,
        }
    }
}

impl CacheLimits {
    /// Create limits from explicit byte counts.
    pub fn new(upper_bound_bytes: usize, hysteresis_bytes: usize) -> Self {
        Self {
            upper_bound_bytes,
            hysteresis_bytes,
        }
    }

    /// Usage above which a soft flush starts evicting.
    pub fn purge_target(&self) -> usize {
        self.upper_bound_bytes.saturating_add(self.hysteresis_bytes)
    }

    /// Read limits from a configuration source, failing on invalid values.
    ///
    /// Missing keys use the defaults.
    pub fn try_from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        Ok(Self {
            upper_bound_bytes: read_limit(source, UPPER_BOUND_KEY)?
                .unwrap_or(DEFAULT_UPPER_BOUND_BYTES),
            hysteresis_bytes: read_limit(source, HYSTERESIS_KEY)?
                .unwrap_or(DEFAULT_HYSTERESIS_BYTES),
        })
    }

    /// Read limits from a configuration source.
    ///
    /// Invalid values are logged and replaced by their default; this never
    /// fails.
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let mut limits = Self::default();

        match read_limit(source, UPPER_BOUND_KEY) {
            Ok(Some(value)) => limits.upper_bound_bytes = value,
            Ok(None) => {}
            Err(e) => warn!("{}; using default {}", e, DEFAULT_UPPER_BOUND_BYTES),
        }

        match read_limit(source, HYSTERESIS_KEY) {
            Ok(Some(value)) => limits.hysteresis_bytes = value,
            Ok(None) => {}
            Err(e) => warn!("{}; using default {}", e, DEFAULT_HYSTERESIS_BYTES),
        }

        limits
    }
}

impl ConfigSource for CacheLimits {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            UPPER_BOUND_KEY => Some(self.upper_bound_bytes.to_string()),
            HYSTERESIS_KEY => Some(self.hysteresis_bytes.to_string()),
            _ => None,
        }
    }
}

fn read_limit(source: &dyn ConfigSource, key: &'static str) -> Result<Option<usize>, ConfigError> {
    let Some(value) = source.get(key) else {
        return Ok(None);
    };

    parse_byte_size(&value)
        .map(Some)
        .map_err(|message| ConfigError::Invalid {
            key,
            value,
            message,
        })
}

/// Parse a byte count such as `1048576`, `512KB`, `200MB` or `1GB`.
///
/// Suffixes are case-insensitive binary multiples; surrounding whitespace is
/// ignored.
pub fn parse_byte_size(value: &str) -> Result<usize, String> {
    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    let count: usize = digits
        .trim()
        .parse()
        .map_err(|_| format!("expected a byte count like 209715200 or 200MB, got {:?}", trimmed))?;

    count
        .checked_mul(multiplier)
        .ok_or_else(|| format!("byte count {:?} is too large", trimmed))
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Output format for the cache report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text
    Text,
    /// JSON object
    Json,
}

/// pyramid-cache - Warm an image cache and report its memory usage.
///
/// Decodes the given images, builds thumbnails and grayscale pyramid levels,
/// then runs a soft flush against the configured memory limits.
#[derive(Parser, Debug, Clone)]
#[command(name = "pyramid-cache")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Image files to load.
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    // =========================================================================
    // Derivation
    // =========================================================================
    /// Number of pyramid levels to build per image (0 disables pyramids).
    #[arg(short, long, default_value_t = DEFAULT_PYRAMID_LEVELS, env = "PYRAMID_CACHE_LEVELS")]
    pub levels: u32,

    /// Also build a 256px-wide thumbnail for every image.
    #[arg(long, default_value_t = false)]
    pub thumbnails: bool,

    /// Write the built pyramid levels as PNG files into this directory.
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    // =========================================================================
    // Memory Limits
    // =========================================================================
    /// Usage the cache is trimmed back to (e.g. 209715200 or 200MB).
    #[arg(long, default_value = "200MB", value_parser = parse_byte_size, env = "PYRAMID_CACHE_UPPER_BOUND_BYTES")]
    pub upper_bound: usize,

    /// Margin above the upper bound before trimming starts.
    #[arg(long, default_value = "25MB", value_parser = parse_byte_size, env = "PYRAMID_CACHE_HYSTERESIS_BYTES")]
    pub hysteresis: usize,

    /// Order in which entries of a pool are evicted.
    #[arg(long, value_enum, default_value_t = EvictionOrder::Insertion, env = "PYRAMID_CACHE_EVICTION_ORDER")]
    pub eviction_order: EvictionOrder,

    // =========================================================================
    // Output
    // =========================================================================
    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.images.is_empty() {
            return Err("At least one image file is required".to_string());
        }

        if self.upper_bound == 0 {
            return Err("upper_bound must be greater than 0".to_string());
        }

        if self.levels > 32 {
            return Err("levels must be at most 32".to_string());
        }

        if self.dump_dir.is_some() && self.levels == 0 {
            return Err("--dump-dir needs at least one pyramid level".to_string());
        }

        Ok(())
    }

    /// Memory limits selected on the command line.
    pub fn limits(&self) -> CacheLimits {
        CacheLimits::new(self.upper_bound, self.hysteresis)
    }
}

// =============================================================================
// Tests
// =============================================================================

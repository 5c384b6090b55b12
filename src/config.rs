/// Tracker configuration
///
/// All tunables are fixed once the tracker is built. Values come from
/// defaults, an optional JSON file, and a few environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default debounce window in seconds
pub const DEFAULT_DEBOUNCE_WINDOW_SECS: f64 = 2.0;

/// Detections must score strictly above this to count
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Frames are resized to this before inference
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Pause between loop iterations
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 100;

pub const DEFAULT_LOOKUP_URL: &str =
    "https://www.wikidata.org/w/rest.php/wikibase/v0/entities/search";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Remote description lookup settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    /// Search endpoint (Wikidata REST entity search)
    pub endpoint: String,

    /// Language code for descriptions
    pub language: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LOOKUP_URL.to_string(),
            language: "en".to_string(),
            timeout_secs: 10,
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for the sighting tracker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum seconds between two counted sightings of the same class
    pub debounce_window_secs: f64,

    /// Confidence threshold (0.0 - 1.0), compared with `>`
    pub confidence_threshold: f32,

    /// Resize target for captured frames
    pub frame_width: u32,
    pub frame_height: u32,

    /// Sleep between loop iterations in milliseconds
    pub frame_interval_ms: u64,

    /// Upper bound on narrations speaking at once
    pub max_concurrent_narrations: usize,

    pub lookup: LookupConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            debounce_window_secs: DEFAULT_DEBOUNCE_WINDOW_SECS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            max_concurrent_narrations: 4,
            lookup: LookupConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading tracker config from {}", path.display());

        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;

        Ok(config)
    }

    /// Apply `SIGHTING_*` environment overrides on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(raw) = std::env::var("SIGHTING_DEBOUNCE_SECS") {
            self.debounce_window_secs = raw.parse().map_err(|e| ConfigError::InvalidValue {
                name: "SIGHTING_DEBOUNCE_SECS",
                reason: format!("{}", e),
            })?;
        }

        if let Ok(raw) = std::env::var("SIGHTING_CONFIDENCE") {
            self.confidence_threshold = raw.parse().map_err(|e| ConfigError::InvalidValue {
                name: "SIGHTING_CONFIDENCE",
                reason: format!("{}", e),
            })?;
        }

        if let Ok(url) = std::env::var("SIGHTING_LOOKUP_URL") {
            self.lookup.endpoint = url;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = Duration::try_from_secs_f64(self.debounce_window_secs) {
            return Err(ConfigError::InvalidValue {
                name: "debounce_window_secs",
                reason: format!("{} is not a usable duration: {}", self.debounce_window_secs, e),
            });
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                name: "confidence_threshold",
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }

        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::InvalidValue {
                name: "frame_size",
                reason: format!("{}x{} is empty", self.frame_width, self.frame_height),
            });
        }

        if self.max_concurrent_narrations == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_concurrent_narrations",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.lookup.endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "lookup.endpoint",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Saturates instead of panicking on a config that skipped `validate`
    pub fn debounce_window(&self) -> Duration {
        Duration::try_from_secs_f64(self.debounce_window_secs).unwrap_or(Duration::MAX)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

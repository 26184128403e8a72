//! Application configuration: optional TOML file, then environment overrides.
//!
//! ```toml
//! [upstream]
//! base_url = "https://api.polygon.io"
//! throttle_ms = 12000
//! api_keys = ["..."]
//! timeout_secs = 30
//!
//! [store]
//! path = "finhelper.db"
//! busy_timeout_secs = 15
//! ```
//!
//! Environment variables:
//! - `POLYGON_API_KEY`, `POLYGON_API_KEY_1` .. `POLYGON_API_KEY_5`: appended to the key pool
//! - `THROTTLE_TIME`: milliseconds between upstream calls
//! - `FINHELPER_DB_PATH`: store path

use finhelper_core::upstream::{polygon::DEFAULT_BASE_URL, PolygonSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// The free tier allows five calls a minute.
pub const DEFAULT_THROTTLE_MS: u64 = 12_000;

const KEY_VARS: [&str; 6] = [
    "POLYGON_API_KEY",
    "POLYGON_API_KEY_1",
    "POLYGON_API_KEY_2",
    "POLYGON_API_KEY_3",
    "POLYGON_API_KEY_4",
    "POLYGON_API_KEY_5",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var} must be an integer number of milliseconds, got {value:?}")]
    InvalidThrottle { var: &'static str, value: String },

    #[error("no API keys configured (set POLYGON_API_KEY or [upstream] api_keys)")]
    NoApiKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub throttle_ms: u64,
    pub api_keys: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            throttle_ms: DEFAULT_THROTTLE_MS,
            api_keys: Vec::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("finhelper.db"),
            busy_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// File (when given) plus process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for var in KEY_VARS {
            if let Some(key) = lookup(var) {
                let key = key.trim();
                if !key.is_empty() && !self.upstream.api_keys.iter().any(|k| k == key) {
                    self.upstream.api_keys.push(key.to_string());
                }
            }
        }

        if let Some(value) = lookup("THROTTLE_TIME") {
            self.upstream.throttle_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidThrottle {
                        var: "THROTTLE_TIME",
                        value,
                    })?;
        }

        if let Some(path) = lookup("FINHELPER_DB_PATH") {
            if !path.trim().is_empty() {
                self.store.path = PathBuf::from(path.trim());
            }
        }
        Ok(())
    }

    /// Scrape commands need at least one key.
    pub fn require_api_keys(&self) -> Result<(), ConfigError> {
        if self.upstream.api_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::NoApiKeys);
        }
        Ok(())
    }

    pub fn polygon_settings(&self) -> PolygonSettings {
        PolygonSettings {
            base_url: self.upstream.base_url.clone(),
            throttle: Duration::from_millis(self.upstream.throttle_ms),
            timeout: Duration::from_secs(self.upstream.timeout_secs),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.store.busy_timeout_secs)
    }
}

//! Sync configuration.
//!
//! Values come from an optional TOML file, then `CLINIC_SYNC_*` environment
//! variables override individual fields.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;
pub const DEFAULT_SUCCESS_RESET_MS: u64 = 3000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_BASE_URL: &str = "CLINIC_SYNC_BASE_URL";
pub const ENV_DEBOUNCE_MS: &str = "CLINIC_SYNC_DEBOUNCE_MS";
pub const ENV_TIMEOUT_SECS: &str = "CLINIC_SYNC_TIMEOUT_SECS";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for the remote mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Server root; requests go to `<base_url>/sync`.
    pub base_url: String,
    /// Quiet period before a scheduled push fires.
    pub debounce_ms: u64,
    /// How long `success` is shown before reverting to `idle`.
    pub success_reset_ms: u64,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            success_reset_ms: DEFAULT_SUCCESS_RESET_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    /// Load from a TOML file, apply environment overrides, and validate.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!(path = %path.display(), base_url = %config.base_url, "Loaded sync config");
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without overrides or validation.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from `lookup`, which maps variable names to values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_BASE_URL) {
            self.base_url = val;
        }
        if let Some(val) = lookup(ENV_DEBOUNCE_MS) {
            self.debounce_ms = parse_override(ENV_DEBOUNCE_MS, &val)?;
        }
        if let Some(val) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = parse_override(ENV_TIMEOUT_SECS, &val)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "base_url must start with http:// or https://, got {base_url}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be greater than 0".into()));
        }
        Ok(())
    }

    /// Full URL of the sync endpoint.
    pub fn sync_url(&self) -> String {
        format!("{}/sync", self.base_url.trim().trim_end_matches('/'))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn success_reset(&self) -> Duration {
        Duration::from_millis(self.success_reset_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_override(key: &'static str, value: &str) -> ConfigResult<u64> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        key,
        value: value.to_string(),
    })
}

//! Rate limit configuration
//!
//! Thresholds are read once at construction and immutable thereafter; a
//! `RateLimiter` never observes config changes after it is built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that could not be read
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Failed to parse the config file
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path that could not be parsed
        path: String,
        /// Underlying TOML error
        source: toml::de::Error,
    },

    /// Config values are out of range
    #[error("invalid rate limit config: {0}")]
    Invalid(String),
}

/// Sliding-window budgets and backoff shape.
///
/// Delays are fractional seconds so backoff math stays in one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests admitted per trailing minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u64,

    /// Requests admitted per trailing hour
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u64,

    /// Tokens admitted per trailing minute
    #[serde(default = "default_tokens_per_minute")]
    pub tokens_per_minute: u64,

    /// Tokens admitted per trailing hour
    #[serde(default = "default_tokens_per_hour")]
    pub tokens_per_hour: u64,

    /// Attempts the retry executor may spend per call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in seconds
    #[serde(default = "default_base_delay")]
    pub base_delay: f64,

    /// Backoff clamp in seconds
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,

    /// Exponential growth factor per attempt
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,

    /// Fraction of the delay added as random jitter (0.0 - 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Mandatory cooldown after a provider rate limit violation, minutes
    #[serde(default = "default_stabilization_period_minutes")]
    pub stabilization_period_minutes: u64,
}

fn default_requests_per_minute() -> u64 {
    60
}

fn default_requests_per_hour() -> u64 {
    3000
}

fn default_tokens_per_minute() -> u64 {
    150_000
}

fn default_tokens_per_hour() -> u64 {
    1_000_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    300.0
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.1
}

fn default_stabilization_period_minutes() -> u64 {
    15
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            requests_per_hour: default_requests_per_hour(),
            tokens_per_minute: default_tokens_per_minute(),
            tokens_per_hour: default_tokens_per_hour(),
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            exponential_base: default_exponential_base(),
            jitter_factor: default_jitter_factor(),
            stabilization_period_minutes: default_stabilization_period_minutes(),
        }
    }
}

impl RateLimitConfig {
    /// Create a configuration with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-minute request budget
    #[must_use]
    pub fn with_requests_per_minute(mut self, limit: u64) -> Self {
        self.requests_per_minute = limit;
        self
    }

    /// Set the per-hour request budget
    #[must_use]
    pub fn with_requests_per_hour(mut self, limit: u64) -> Self {
        self.requests_per_hour = limit;
        self
    }

    /// Set the per-minute token budget
    #[must_use]
    pub fn with_tokens_per_minute(mut self, limit: u64) -> Self {
        self.tokens_per_minute = limit;
        self
    }

    /// Set the per-hour token budget
    #[must_use]
    pub fn with_tokens_per_hour(mut self, limit: u64) -> Self {
        self.tokens_per_hour = limit;
        self
    }

    /// Set the retry attempt budget
    #[must_use]
    pub fn with_max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = attempts;
        self
    }

    /// Set the base backoff delay in seconds
    #[must_use]
    pub fn with_base_delay(mut self, seconds: f64) -> Self {
        self.base_delay = seconds;
        self
    }

    /// Set the backoff clamp in seconds
    #[must_use]
    pub fn with_max_delay(mut self, seconds: f64) -> Self {
        self.max_delay = seconds;
        self
    }

    /// Set the exponential growth factor
    #[must_use]
    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    /// Set the jitter fraction
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Set the stabilization period in minutes
    #[must_use]
    pub fn with_stabilization_period_minutes(mut self, minutes: u64) -> Self {
        self.stabilization_period_minutes = minutes;
        self
    }

    /// Stabilization period as a duration.
    #[must_use]
    pub fn stabilization_period(&self) -> Duration {
        Duration::from_secs(self.stabilization_period_minutes * 60)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// parsed values fail validation.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a threshold or backoff
    /// parameter is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.base_delay <= 0.0 {
            return Err(ConfigError::Invalid("base_delay must be positive".into()));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::Invalid(
                "max_delay must be at least base_delay".into(),
            ));
        }
        if self.exponential_base < 1.0 {
            return Err(ConfigError::Invalid(
                "exponential_base must be at least 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::Invalid(
                "jitter_factor must be within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.requests_per_minute, 60);
        assert_eq!(config.requests_per_hour, 3000);
        assert_eq!(config.tokens_per_minute, 150_000);
        assert_eq!(config.tokens_per_hour, 1_000_000);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, 1.0);
        assert_eq!(config.max_delay, 300.0);
        assert_eq!(config.exponential_base, 2.0);
        assert_eq!(config.jitter_factor, 0.1);
        assert_eq!(config.stabilization_period_minutes, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RateLimitConfig::new()
            .with_requests_per_minute(2)
            .with_tokens_per_minute(500)
            .with_max_retries(3)
            .with_jitter_factor(0.0)
            .with_stabilization_period_minutes(0);
        assert_eq!(config.requests_per_minute, 2);
        assert_eq!(config.tokens_per_minute, 500);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.stabilization_period(), Duration::ZERO);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RateLimitConfig::new().with_max_retries(0).validate().is_err());
        assert!(RateLimitConfig::new().with_base_delay(0.0).validate().is_err());
        assert!(RateLimitConfig::new().with_max_delay(0.5).validate().is_err());
        assert!(RateLimitConfig::new()
            .with_exponential_base(0.9)
            .validate()
            .is_err());
        assert!(RateLimitConfig::new()
            .with_jitter_factor(1.5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "requests_per_minute = 10\ntokens_per_minute = 25000\nmax_retries = 2"
        )
        .unwrap();

        let config = RateLimitConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.requests_per_minute, 10);
        assert_eq!(config.tokens_per_minute, 25_000);
        assert_eq!(config.max_retries, 2);
        // Unspecified fields fall back to defaults
        assert_eq!(config.requests_per_hour, 3000);
    }

    #[test]
    fn test_from_toml_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "requests_per_second = 10").unwrap();
        assert!(matches!(
            RateLimitConfig::from_toml_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_from_toml_file_missing() {
        assert!(matches!(
            RateLimitConfig::from_toml_file("/nonexistent/palisade.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}

//! Ledger configuration.
//!
//! Consolidates the environment variables read by the library.

use std::time::Duration;

/// Tunables for units of work and history queries
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Longest a unit of work waits for an account lock
    pub lock_timeout: Duration,
    /// Retries of a unit of work that hit a concurrency conflict
    pub max_retries: u32,
    /// Base delay before the first retry, doubled on each further attempt
    pub retry_backoff: Duration,
    /// Cap applied to every history query
    pub history_limit: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            max_retries: 3,
            retry_backoff: Duration::from_millis(10),
            history_limit: 200,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `LEDGER_LOCK_TIMEOUT_MS` (default: 2000)
    /// - `LEDGER_MAX_RETRIES` (default: 3)
    /// - `LEDGER_RETRY_BACKOFF_MS` (default: 10)
    /// - `LEDGER_HISTORY_LIMIT` (default: 200)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a loaded value fails [`validate`](Self::validate)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            lock_timeout: Duration::from_millis(parse_env_or(
                "LEDGER_LOCK_TIMEOUT_MS",
                defaults.lock_timeout.as_millis() as u64,
            )),
            max_retries: parse_env_or("LEDGER_MAX_RETRIES", defaults.max_retries),
            retry_backoff: Duration::from_millis(parse_env_or(
                "LEDGER_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )),
            history_limit: parse_env_or("LEDGER_HISTORY_LIMIT", defaults.history_limit),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LEDGER_LOCK_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.max_retries > 20 {
            return Err(ConfigError::Invalid {
                var: "LEDGER_MAX_RETRIES".to_string(),
                reason: "Must be at most 20".to_string(),
            });
        }

        if self.history_limit < 1 {
            return Err(ConfigError::Invalid {
                var: "LEDGER_HISTORY_LIMIT".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset or malformed
pub fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

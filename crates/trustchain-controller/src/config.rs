//! Controller configuration
//!
//! Defaults suit a single controller instance; every value can be overridden
//! through `TRUSTCHAIN_*` environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable for the log level
pub const ENV_LOG_LEVEL: &str = "TRUSTCHAIN_LOG_LEVEL";
/// Environment variable for the conflict requeue delay, in seconds
pub const ENV_CONFLICT_REQUEUE: &str = "TRUSTCHAIN_CONFLICT_REQUEUE_SECS";
/// Environment variable for the error requeue delay, in seconds
pub const ENV_ERROR_REQUEUE: &str = "TRUSTCHAIN_ERROR_REQUEUE_SECS";
/// Environment variable for the account server timeout, in seconds
pub const ENV_PUBLISH_TIMEOUT: &str = "TRUSTCHAIN_PUBLISH_TIMEOUT_SECS";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level or filter directive, e.g. `info` or `trustchain_controller=debug`
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Requeue delay after an optimistic-concurrency conflict
    pub conflict_requeue: Duration,

    /// Requeue delay after any other transient error
    pub error_requeue: Duration,

    /// Secret key holding the CA bundle when the TLS config names none
    pub default_ca_key: String,

    /// Timeout for a single account server operation
    pub publish_timeout: Duration,

    pub log: LogConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            conflict_requeue: Duration::from_secs(30),
            error_requeue: Duration::from_secs(10),
            default_ca_key: "ca.crt".into(),
            publish_timeout: Duration::from_secs(10),
            log: LogConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log.level = level;
        }
        if let Some(value) = lookup(ENV_CONFLICT_REQUEUE) {
            config.conflict_requeue = parse_secs(ENV_CONFLICT_REQUEUE, &value)?;
        }
        if let Some(value) = lookup(ENV_ERROR_REQUEUE) {
            config.error_requeue = parse_secs(ENV_ERROR_REQUEUE, &value)?;
        }
        if let Some(value) = lookup(ENV_PUBLISH_TIMEOUT) {
            config.publish_timeout = parse_secs(ENV_PUBLISH_TIMEOUT, &value)?;
        }

        Ok(config)
    }
}

fn parse_secs(name: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
        name: name.into(),
        value: value.into(),
        reason: e.to_string(),
    })?;

    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            name: name.into(),
            value: value.into(),
            reason: "must be at least one second".into(),
        });
    }

    Ok(Duration::from_secs(secs))
}

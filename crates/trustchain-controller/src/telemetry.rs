//! Logging setup

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{ConfigError, LogConfig};

/// Install the global tracing subscriber
///
/// Fails if the level cannot be parsed or a subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| ConfigError::InvalidValue {
        name: "log.level".into(),
        value: config.level.clone(),
        reason: e.to_string(),
    })?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| ConfigError::Logging(e.to_string()))
}

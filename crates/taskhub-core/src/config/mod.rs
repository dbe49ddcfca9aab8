//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! `config/default.toml`, an environment overlay and `TASKHUB__*` environment
//! variables. Each sub-module represents a logical configuration section.

pub mod database;
pub mod listener;
pub mod logging;
pub mod redis;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::listener::ListenerConfig;
pub use self::logging::LoggingConfig;
pub use self::redis::RedisConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Redis pub/sub settings.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Event listener settings.
    #[serde(default)]
    pub listener: ListenerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the file at `path` with the `config/{env}` overlay and
    /// environment variables such as `TASKHUB__WORKER__POOL_SIZE`.
    /// Missing files are not an error; every section has defaults.
    pub fn load(path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("TASKHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        self.worker.validate()?;
        self.listener.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker.pool_size, 32);
        assert!(config.worker.greedy);
        assert_eq!(config.redis.channel, "queue");
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let config = AppConfig::load("config/does-not-exist", "missing").expect("load");
        assert_eq!(config.worker.heartbeat_seconds, 60);
        assert_eq!(config.listener.reconnect_interval_seconds, 60);
        assert!(config.listener.max_reconnect_attempts.is_none());
    }
}

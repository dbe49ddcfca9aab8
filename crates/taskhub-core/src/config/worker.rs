//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Smallest accepted worker pool size.
pub const MIN_POOL_SIZE: usize = 1;

/// Largest accepted worker pool size.
pub const MAX_POOL_SIZE: usize = 1000;

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Whether a worker re-submits its task while the queue is non-empty.
    #[serde(default = "default_true")]
    pub greedy: bool,
    /// Interval in seconds between heartbeat ticks.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_seconds: u64,
}

impl WorkerConfig {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_seconds)
    }

    /// Check the pool size range and the heartbeat interval.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&self.pool_size) {
            return Err(AppError::configuration(format!(
                "worker.pool_size must be between {MIN_POOL_SIZE} and {MAX_POOL_SIZE}, got {}",
                self.pool_size
            )));
        }
        if self.heartbeat_seconds == 0 {
            return Err(AppError::configuration(
                "worker.heartbeat_seconds must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            greedy: default_true(),
            heartbeat_seconds: default_heartbeat(),
        }
    }
}

fn default_pool_size() -> usize {
    32
}

fn default_true() -> bool {
    true
}

fn default_heartbeat() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_bounds() {
        let mut config = WorkerConfig::default();

        config.pool_size = 0;
        assert!(config.validate().is_err());

        config.pool_size = 1001;
        assert!(config.validate().is_err());

        config.pool_size = 1;
        assert!(config.validate().is_ok());

        config.pool_size = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let config = WorkerConfig {
            heartbeat_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Event listener configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Event listener and reconnect policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Whether to subscribe to the wakeup channel at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay in seconds before the first reconnect attempt.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_seconds: u64,
    /// Give up after this many failed attempts; `None` retries forever.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    /// Multiplier applied to the delay after every failed attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound in seconds for the reconnect delay.
    #[serde(default = "default_max_reconnect_interval")]
    pub max_reconnect_interval_seconds: u64,
}

impl ListenerConfig {
    /// Reconnect interval as a [`Duration`].
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_seconds)
    }

    /// Reconnect delay ceiling as a [`Duration`].
    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_interval_seconds)
    }

    /// Check that the reconnect policy is well formed.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.reconnect_interval_seconds == 0 {
            return Err(AppError::configuration(
                "listener.reconnect_interval_seconds must be greater than zero",
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(AppError::configuration(format!(
                "listener.backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            reconnect_interval_seconds: default_reconnect_interval(),
            max_reconnect_attempts: None,
            backoff_factor: default_backoff_factor(),
            max_reconnect_interval_seconds: default_max_reconnect_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reconnect_interval() -> u64 {
    60
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_max_reconnect_interval() -> u64 {
    300
}

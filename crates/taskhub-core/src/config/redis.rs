//! Redis pub/sub configuration.

use serde::{Deserialize, Serialize};

/// Redis connection and wakeup channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Channel producers publish to when new work is enqueued.
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            channel: default_channel(),
        }
    }
}

fn default_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_channel() -> String {
    "queue".to_string()
}

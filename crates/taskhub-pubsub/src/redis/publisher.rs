//! Redis `PUBLISH` side of the wakeup channel.

use async_trait::async_trait;
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use taskhub_core::config::RedisConfig;
use taskhub_core::error::{AppError, ErrorKind};
use taskhub_core::result::AppResult;
use taskhub_core::traits::pubsub::{TransportError, WakeupPublisher};

use super::mask_redis_url;

/// Publishes wakeup notifications over a managed, auto-reconnecting
/// Redis connection.
#[derive(Clone)]
pub struct RedisPublisher {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPublisher").finish_non_exhaustive()
    }
}

impl RedisPublisher {
    /// Connect to Redis using `config`.
    pub async fn connect(config: &RedisConfig) -> AppResult<Self> {
        info!(url = %mask_redis_url(&config.url), "Connecting Redis publisher");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::PubSub, "Failed to create Redis client", e)
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::with_source(ErrorKind::PubSub, "Failed to connect to Redis", e)
        })?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl WakeupPublisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| TransportError::Disconnected(format!("Redis PUBLISH failed: {e}")))?;

        debug!(channel, receivers, "Published wakeup");
        Ok(())
    }
}

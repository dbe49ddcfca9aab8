//! Redis `SUBSCRIBE` side of the wakeup channel.
//!
//! Each call to [`RedisTransport::subscribe`] opens a dedicated pub/sub
//! connection and splits it into a sink (kept by the control half for
//! `UNSUBSCRIBE`) and a message stream (owned by the reader).

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use redis::Client;
use redis::aio::{PubSubSink, PubSubStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use taskhub_core::config::RedisConfig;
use taskhub_core::error::{AppError, ErrorKind};
use taskhub_core::result::AppResult;
use taskhub_core::traits::pubsub::{
    PubSubEvent, PubSubTransport, Subscription, SubscriptionControl, SubscriptionStream,
    TransportError,
};

use super::mask_redis_url;

/// Opens Redis pub/sub subscriptions.
#[derive(Debug, Clone)]
pub struct RedisTransport {
    client: Client,
}

impl RedisTransport {
    /// Create a transport for the Redis server in `config`.
    ///
    /// No connection is made until [`PubSubTransport::subscribe`] is called.
    pub fn open(config: &RedisConfig) -> AppResult<Self> {
        info!(url = %mask_redis_url(&config.url), "Creating Redis pub/sub transport");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::PubSub, "Failed to create Redis client", e)
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PubSubTransport for RedisTransport {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!(channel, "Subscribed to Redis channel");

        let (sink, stream) = pubsub.split();
        let unsubscribed = CancellationToken::new();

        Ok(Subscription {
            stream: Box::new(RedisSubscriptionStream {
                stream,
                pending_ack: Some(channel.to_string()),
                unsubscribed: unsubscribed.clone(),
            }),
            control: Arc::new(RedisSubscriptionControl {
                sink: Mutex::new(sink),
                channel: channel.to_string(),
                unsubscribed,
            }),
        })
    }
}

/// Message stream of one Redis subscription.
struct RedisSubscriptionStream {
    stream: PubSubStream,
    /// Channel whose subscription confirmation has not been reported yet.
    pending_ack: Option<String>,
    unsubscribed: CancellationToken,
}

#[async_trait]
impl SubscriptionStream for RedisSubscriptionStream {
    async fn receive(&mut self) -> Result<PubSubEvent, TransportError> {
        if let Some(channel) = self.pending_ack.take() {
            return Ok(PubSubEvent::Subscribed { channel });
        }

        tokio::select! {
            biased;
            _ = self.unsubscribed.cancelled() => Err(TransportError::Unsubscribed),
            msg = self.stream.next() => match msg {
                Some(msg) => Ok(PubSubEvent::Message(msg.get_payload_bytes().to_vec())),
                None => Err(TransportError::Disconnected(
                    "Redis pub/sub stream closed".to_string(),
                )),
            },
        }
    }
}

/// Unsubscribe handle of one Redis subscription.
struct RedisSubscriptionControl {
    sink: Mutex<PubSubSink>,
    channel: String,
    unsubscribed: CancellationToken,
}

impl std::fmt::Debug for RedisSubscriptionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSubscriptionControl")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SubscriptionControl for RedisSubscriptionControl {
    async fn unsubscribe(&self) -> Result<(), TransportError> {
        // The reader is released even if the server is already gone.
        self.unsubscribed.cancel();

        self.sink
            .lock()
            .await
            .unsubscribe(self.channel.as_str())
            .await
            .map_err(|e| TransportError::Disconnected(e.to_string()))
    }
}

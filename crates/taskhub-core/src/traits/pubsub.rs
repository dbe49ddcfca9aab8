//! Publish/subscribe transport abstraction used by the event listener.
//!
//! A [`Subscription`] is split in two halves: the stream, owned by exactly
//! one reader, and the control, which may be shared so another task can
//! unsubscribe while the reader is blocked in [`SubscriptionStream::receive`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::AppError;

/// Typed message yielded by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubEvent {
    /// A payload published on the channel.
    Message(Vec<u8>),
    /// The server confirmed the subscription.
    Subscribed {
        /// Channel name.
        channel: String,
    },
}

/// Transport failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The subscription was ended on purpose through its control.
    #[error("unsubscribed")]
    Unsubscribed,

    /// The connection dropped while receiving.
    #[error("connection lost: {0}")]
    Disconnected(String),

    /// Establishing the connection or subscription failed.
    #[error("connect failed: {0}")]
    Connect(String),
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        AppError::pubsub(err.to_string())
    }
}

/// Receiving half of a subscription.
#[async_trait]
pub trait SubscriptionStream: Send + 'static {
    /// Wait for the next event.
    async fn receive(&mut self) -> Result<PubSubEvent, TransportError>;
}

/// Control half of a subscription.
#[async_trait]
pub trait SubscriptionControl: Send + Sync + std::fmt::Debug + 'static {
    /// Unsubscribe; a pending or later `receive` yields
    /// [`TransportError::Unsubscribed`].
    async fn unsubscribe(&self) -> Result<(), TransportError>;
}

/// A live subscription to one channel.
pub struct Subscription {
    /// Receiving half.
    pub stream: Box<dyn SubscriptionStream>,
    /// Control half.
    pub control: Arc<dyn SubscriptionControl>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

/// Factory for fresh subscriptions.
#[async_trait]
pub trait PubSubTransport: Send + Sync + std::fmt::Debug + 'static {
    /// Open a new connection and subscribe it to `channel`.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError>;
}

/// Publishes wakeup notifications.
#[async_trait]
pub trait WakeupPublisher: Send + Sync + std::fmt::Debug + 'static {
    /// Publish `payload` on `channel`.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), TransportError>;
}

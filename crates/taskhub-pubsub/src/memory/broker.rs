//! In-memory pub/sub broker with fault injection.
//!
//! Implements both the transport and the publisher traits on top of tokio
//! broadcast channels. Tests use [`MemoryBroker::disconnect_all`] and
//! [`MemoryBroker::fail_next_connects`] to drive the listener's reconnect
//! state machine without a Redis server.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use taskhub_core::traits::pubsub::{
    PubSubEvent, PubSubTransport, Subscription, SubscriptionControl, SubscriptionStream,
    TransportError, WakeupPublisher,
};

/// In-memory pub/sub broker.
#[derive(Debug)]
pub struct MemoryBroker {
    /// Channel name → broadcast sender
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    /// Drop tokens of subscriptions whose stream is still alive
    connections: Mutex<Vec<CancellationToken>>,
    /// Buffer size for new channels
    buffer_size: usize,
    /// Number of upcoming `subscribe` calls that should fail
    failing_connects: AtomicU32,
    /// Successful `subscribe` calls
    connects: AtomicUsize,
}

impl MemoryBroker {
    /// Create a broker whose channels buffer `buffer_size` messages.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            connections: Mutex::new(Vec::new()),
            buffer_size: buffer_size.max(1),
            failing_connects: AtomicU32::new(0),
            connects: AtomicUsize::new(0),
        }
    }

    /// Drop every live subscription as if the server went away.
    pub async fn disconnect_all(&self) {
        for token in self.connections.lock().await.drain(..) {
            token.cancel();
        }
    }

    /// Make the next `n` subscribe attempts fail with a connect error.
    pub fn fail_next_connects(&self, n: u32) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Number of subscriptions successfully opened so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of receivers currently attached to `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn take_failure(&self) -> bool {
        self.failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl PubSubTransport for MemoryBroker {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError> {
        if self.take_failure() {
            return Err(TransportError::Connect("injected connect failure".to_string()));
        }

        let rx = {
            let mut channels = self.channels.lock().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.buffer_size).0)
                .subscribe()
        };

        let dropped = CancellationToken::new();
        {
            let mut connections = self.connections.lock().await;
            connections.retain(|token| !token.is_cancelled());
            connections.push(dropped.clone());
        }
        self.connects.fetch_add(1, Ordering::SeqCst);

        let unsubscribed = CancellationToken::new();
        Ok(Subscription {
            stream: Box::new(MemoryStream {
                rx,
                pending_ack: Some(channel.to_string()),
                unsubscribed: unsubscribed.clone(),
                dropped,
            }),
            control: Arc::new(MemoryControl { unsubscribed }),
        })
    }
}

#[async_trait]
impl WakeupPublisher for MemoryBroker {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), TransportError> {
        let channels = self.channels.lock().await;
        if let Some(tx) = channels.get(channel) {
            // No receivers is not an error for pub/sub.
            let _ = tx.send(payload.to_vec());
        }
        Ok(())
    }
}

struct MemoryStream {
    rx: broadcast::Receiver<Vec<u8>>,
    pending_ack: Option<String>,
    unsubscribed: CancellationToken,
    dropped: CancellationToken,
}

#[async_trait]
impl SubscriptionStream for MemoryStream {
    async fn receive(&mut self) -> Result<PubSubEvent, TransportError> {
        if let Some(channel) = self.pending_ack.take() {
            return Ok(PubSubEvent::Subscribed { channel });
        }

        tokio::select! {
            biased;
            _ = self.unsubscribed.cancelled() => Err(TransportError::Unsubscribed),
            _ = self.dropped.cancelled() => {
                Err(TransportError::Disconnected("broker dropped the connection".to_string()))
            }
            msg = self.rx.recv() => match msg {
                Ok(payload) => Ok(PubSubEvent::Message(payload)),
                // Missed messages still mean "something happened".
                Err(broadcast::error::RecvError::Lagged(_)) => Ok(PubSubEvent::Message(Vec::new())),
                Err(broadcast::error::RecvError::Closed) => {
                    Err(TransportError::Disconnected("channel closed".to_string()))
                }
            },
        }
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        // Marks the slot in `connections` as free for pruning.
        self.dropped.cancel();
    }
}

#[derive(Debug)]
struct MemoryControl {
    unsubscribed: CancellationToken,
}

#[async_trait]
impl SubscriptionControl for MemoryControl {
    async fn unsubscribe(&self) -> Result<(), TransportError> {
        self.unsubscribed.cancel();
        Ok(())
    }
}

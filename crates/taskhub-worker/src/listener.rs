//! Event listener: turns a pub/sub subscription into wakeup signals.
//!
//! Two loops run side by side. The read loop owns the subscription stream,
//! forwards a wakeup for every message or subscription ack, and reconnects
//! per [`ReconnectPolicy`] when the transport drops. The monitor waits for
//! shutdown and unsubscribes the live subscription so a blocked `receive`
//! returns. Wakeups coalesce: a pending wakeup already covers new ones.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use taskhub_core::error::AppError;
use taskhub_core::traits::pubsub::{
    PubSubEvent, PubSubTransport, SubscriptionControl, SubscriptionStream, TransportError,
};

use crate::hooks::Hooks;
use crate::retry::ReconnectPolicy;

/// Channel the producer publishes wakeups on.
pub const DEFAULT_CHANNEL: &str = "queue";

type ControlSlot = Arc<Mutex<Option<Arc<dyn SubscriptionControl>>>>;

/// Listener construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListenerError {
    /// No transport was supplied.
    #[error("event listener requires a pub/sub transport")]
    MissingTransport,

    /// The channel name is empty.
    #[error("event listener channel must not be empty")]
    EmptyChannel,
}

impl From<ListenerError> for AppError {
    fn from(err: ListenerError) -> Self {
        AppError::configuration(err.to_string())
    }
}

/// Builder for [`EventListener`].
#[derive(Debug)]
pub struct EventListenerBuilder {
    transport: Option<Arc<dyn PubSubTransport>>,
    channel: String,
    policy: ReconnectPolicy,
    hooks: Hooks,
}

impl Default for EventListenerBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            channel: DEFAULT_CHANNEL.to_string(),
            policy: ReconnectPolicy::default(),
            hooks: Hooks::default(),
        }
    }
}

impl EventListenerBuilder {
    /// Transport used to open subscriptions.
    pub fn transport(mut self, transport: Arc<dyn PubSubTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Channel to subscribe to.
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Reconnect policy.
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Lifecycle hooks.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validate the settings and start both loops.
    pub fn build(self) -> Result<EventListener, ListenerError> {
        let transport = self.transport.ok_or(ListenerError::MissingTransport)?;
        if self.channel.trim().is_empty() {
            return Err(ListenerError::EmptyChannel);
        }

        let (wakeups, receiver) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let control: ControlSlot = Arc::new(Mutex::new(None));

        let reader = ReadLoop {
            transport,
            channel: self.channel.clone(),
            policy: self.policy,
            control: control.clone(),
            wakeups,
            shutdown: shutdown.clone(),
            hooks: self.hooks.clone(),
        };
        tracker.spawn(reader.run());
        tracker.spawn(monitor(control, shutdown.clone(), self.hooks.clone()));

        info!(channel = %self.channel, "Event listener started");

        Ok(EventListener {
            receiver,
            shutdown,
            tracker,
            hooks: self.hooks,
        })
    }
}

/// Running listener handle.
#[derive(Debug)]
pub struct EventListener {
    receiver: mpsc::Receiver<()>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    hooks: Hooks,
}

impl EventListener {
    /// Start configuring a listener.
    pub fn builder() -> EventListenerBuilder {
        EventListenerBuilder::default()
    }

    /// Wait for the next wakeup. `None` once the read loop has exited.
    pub async fn recv(&mut self) -> Option<()> {
        self.receiver.recv().await
    }

    /// Signal both loops to stop. Idempotent.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Wait until both loops have exited.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        (self.hooks.on_listener_exit)();
        info!("Event listener stopped");
    }
}

struct ReadLoop {
    transport: Arc<dyn PubSubTransport>,
    channel: String,
    policy: ReconnectPolicy,
    control: ControlSlot,
    wakeups: mpsc::Sender<()>,
    shutdown: CancellationToken,
    hooks: Hooks,
}

impl ReadLoop {
    async fn run(self) {
        (self.hooks.on_read_start)();

        let mut stream = match self.connect().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Initial subscription failed");
                None
            }
        };

        loop {
            let Some(active) = stream.as_mut() else {
                match self.reconnect().await {
                    Some(fresh) => {
                        stream = Some(fresh);
                        continue;
                    }
                    None => break,
                }
            };

            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = active.receive() => event,
            };

            match event {
                Ok(PubSubEvent::Message(_)) | Ok(PubSubEvent::Subscribed { .. }) => {
                    if !self.fan_out() {
                        debug!("Wakeup receiver dropped, stopping read loop");
                        break;
                    }
                }
                Err(TransportError::Unsubscribed) => {
                    debug!(channel = %self.channel, "Unsubscribed");
                    break;
                }
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "Subscription lost");
                    self.control.lock().await.take();
                    stream = None;
                }
            }
        }

        self.control.lock().await.take();
        (self.hooks.on_read_exit)();
        debug!("Read loop exited");
    }

    async fn connect(&self) -> Result<Box<dyn SubscriptionStream>, TransportError> {
        let subscription = self.transport.subscribe(&self.channel).await?;
        *self.control.lock().await = Some(subscription.control);
        Ok(subscription.stream)
    }

    /// Retry until subscribed, out of attempts, or shut down.
    async fn reconnect(&self) -> Option<Box<dyn SubscriptionStream>> {
        let mut attempts = 0;
        loop {
            if !self.policy.allows(attempts) {
                error!(
                    channel = %self.channel,
                    attempts,
                    "Giving up on event subscription"
                );
                return None;
            }
            attempts += 1;

            let delay = self.policy.delay_for(attempts);
            debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Reconnecting");
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.connect().await {
                Ok(stream) => {
                    info!(channel = %self.channel, attempts, "Event subscription restored");
                    (self.hooks.on_read_reconnect)();
                    return Some(stream);
                }
                Err(e) => warn!(attempt = attempts, error = %e, "Reconnect failed"),
            }
        }
    }

    /// Forward a wakeup. Returns `false` once the receiver is gone.
    fn fan_out(&self) -> bool {
        match self.wakeups.try_send(()) {
            Ok(()) => {
                (self.hooks.on_read_fan_out)();
                true
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("Wakeup already pending");
                true
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

async fn monitor(control: ControlSlot, shutdown: CancellationToken, hooks: Hooks) {
    (hooks.on_monitor_start)();
    shutdown.cancelled().await;

    let live = control.lock().await.clone();
    if let Some(control) = live {
        if let Err(e) = control.unsubscribe().await {
            warn!(error = %e, "Failed to unsubscribe");
        }
    }

    (hooks.on_monitor_exit)();
    debug!("Monitor exited");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use taskhub_core::traits::pubsub::WakeupPublisher;
    use taskhub_pubsub::MemoryBroker;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy::fixed(Duration::from_millis(20))
    }

    fn counter() -> (Arc<AtomicUsize>, crate::hooks::Hook) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            count,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    async fn next_wakeup(listener: &mut EventListener) -> Option<()> {
        tokio::time::timeout(TIMEOUT, listener.recv())
            .await
            .expect("no wakeup before timeout")
    }

    #[tokio::test]
    async fn test_build_without_transport_fails() {
        let err = EventListener::builder().build().unwrap_err();
        assert_eq!(err, ListenerError::MissingTransport);
    }

    #[tokio::test]
    async fn test_build_with_empty_channel_fails() {
        let err = EventListener::builder()
            .transport(Arc::new(MemoryBroker::default()))
            .channel("")
            .build()
            .unwrap_err();
        assert_eq!(err, ListenerError::EmptyChannel);
    }

    #[tokio::test]
    async fn test_ack_and_messages_forward_wakeups() {
        let broker = Arc::new(MemoryBroker::default());
        let mut listener = EventListener::builder()
            .transport(broker.clone())
            .build()
            .unwrap();

        // Subscription ack.
        assert!(next_wakeup(&mut listener).await.is_some());

        broker.publish(DEFAULT_CHANNEL, b"do").await.unwrap();
        assert!(next_wakeup(&mut listener).await.is_some());

        listener.cancel();
        listener.wait().await;
    }

    #[tokio::test]
    async fn test_resumes_after_disconnect() {
        let broker = Arc::new(MemoryBroker::default());
        let (reconnects, on_read_reconnect) = counter();
        let hooks = Hooks {
            on_read_reconnect,
            ..Hooks::default()
        };
        let mut listener = EventListener::builder()
            .transport(broker.clone())
            .policy(fast_policy())
            .hooks(hooks)
            .build()
            .unwrap();
        assert!(next_wakeup(&mut listener).await.is_some());

        broker.disconnect_all().await;

        // Ack of the fresh subscription.
        assert!(next_wakeup(&mut listener).await.is_some());
        assert_eq!(broker.connect_count(), 2);
        assert_eq!(reconnects.load(Ordering::SeqCst), 1);

        broker.publish(DEFAULT_CHANNEL, b"do").await.unwrap();
        assert!(next_wakeup(&mut listener).await.is_some());

        listener.cancel();
        listener.wait().await;
    }

    #[tokio::test]
    async fn test_retries_failed_connects() {
        let broker = Arc::new(MemoryBroker::default());
        broker.fail_next_connects(3);
        let mut listener = EventListener::builder()
            .transport(broker.clone())
            .policy(fast_policy())
            .build()
            .unwrap();

        assert!(next_wakeup(&mut listener).await.is_some());
        assert_eq!(broker.connect_count(), 1);

        listener.cancel();
        listener.wait().await;
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let broker = Arc::new(MemoryBroker::default());
        broker.fail_next_connects(100);
        let (read_exits, on_read_exit) = counter();
        let mut policy = fast_policy();
        policy.max_attempts = Some(2);

        let mut listener = EventListener::builder()
            .transport(broker.clone())
            .policy(policy)
            .hooks(Hooks {
                on_read_exit,
                ..Hooks::default()
            })
            .build()
            .unwrap();

        assert!(next_wakeup(&mut listener).await.is_none());
        assert_eq!(read_exits.load(Ordering::SeqCst), 1);
        assert_eq!(broker.connect_count(), 0);

        listener.cancel();
        listener.wait().await;
    }

    #[tokio::test]
    async fn test_cancel_and_wait_stop_both_loops() {
        let broker = Arc::new(MemoryBroker::default());
        let (monitor_exits, on_monitor_exit) = counter();
        let (read_exits, on_read_exit) = counter();
        let (listener_exits, on_listener_exit) = counter();
        let mut listener = EventListener::builder()
            .transport(broker.clone())
            .hooks(Hooks {
                on_monitor_exit,
                on_read_exit,
                on_listener_exit,
                ..Hooks::default()
            })
            .build()
            .unwrap();
        assert!(next_wakeup(&mut listener).await.is_some());

        listener.cancel();
        listener.cancel();
        tokio::time::timeout(TIMEOUT, listener.wait())
            .await
            .expect("listener did not stop");

        assert_eq!(monitor_exits.load(Ordering::SeqCst), 1);
        assert_eq!(read_exits.load(Ordering::SeqCst), 1);
        assert_eq!(listener_exits.load(Ordering::SeqCst), 1);
        assert_eq!(broker.subscriber_count(DEFAULT_CHANNEL).await, 0);
        assert!(listener.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_while_reconnecting() {
        let broker = Arc::new(MemoryBroker::default());
        broker.fail_next_connects(1);
        let listener = EventListener::builder()
            .transport(broker.clone())
            .policy(ReconnectPolicy::fixed(Duration::from_secs(3600)))
            .build()
            .unwrap();

        tokio::task::yield_now().await;
        listener.cancel();
        tokio::time::timeout(TIMEOUT, listener.wait())
            .await
            .expect("listener stuck in reconnect delay");
    }
}

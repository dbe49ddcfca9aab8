//! Service loop: heartbeat, listener wakeups and shutdown ordering.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use taskhub_core::config::WorkerConfig;
use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_core::traits::producer::WorkProducer;
use taskhub_core::traits::pubsub::PubSubTransport;
use taskhub_core::traits::queue::WorkQueue;

use crate::executor::TaskExecutor;
use crate::hooks::Hooks;
use crate::listener::{DEFAULT_CHANNEL, EventListener};
use crate::pool::{TaskHandle, WorkerPool};
use crate::registry::JobRegistry;
use crate::retry::ReconnectPolicy;
use crate::task::QueueTask;

/// Builder for [`Service`].
#[derive(Debug)]
pub struct ServiceBuilder {
    queue: Option<Arc<dyn WorkQueue>>,
    registry: Arc<JobRegistry>,
    producer: Option<Arc<dyn WorkProducer>>,
    transport: Option<Arc<dyn PubSubTransport>>,
    channel: String,
    policy: ReconnectPolicy,
    pool_size: usize,
    greedy: bool,
    heartbeat: Duration,
    handle_signals: bool,
    shutdown: Option<ShutdownTrigger>,
    hooks: Hooks,
}

/// Future that stops the service when it completes. It is polled by one
/// watcher task for the whole run, so a signal is never missed between
/// loop passes.
struct ShutdownTrigger(Pin<Box<dyn Future<Output = ()> + Send>>);

impl ShutdownTrigger {
    fn new(future: impl Future<Output = ()> + Send + 'static) -> Self {
        Self(Box::pin(future))
    }
}

impl fmt::Debug for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShutdownTrigger")
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        let worker = WorkerConfig::default();
        Self {
            queue: None,
            registry: Arc::new(JobRegistry::new()),
            producer: None,
            transport: None,
            channel: DEFAULT_CHANNEL.to_string(),
            policy: ReconnectPolicy::default(),
            pool_size: worker.pool_size,
            greedy: worker.greedy,
            heartbeat: worker.heartbeat(),
            handle_signals: true,
            shutdown: None,
            hooks: Hooks::default(),
        }
    }
}

impl ServiceBuilder {
    /// Queue the workers consume.
    pub fn queue(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Job registry.
    pub fn registry(mut self, registry: Arc<JobRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Producer handed to jobs for follow-up work.
    pub fn producer(mut self, producer: Arc<dyn WorkProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Wakeup transport. Without one the service runs on heartbeats only.
    pub fn transport(mut self, transport: Arc<dyn PubSubTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Wakeup channel name.
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Listener reconnect policy.
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply pool size, greedy flag and heartbeat from `config`.
    pub fn worker_config(mut self, config: &WorkerConfig) -> Self {
        self.pool_size = config.pool_size;
        self.greedy = config.greedy;
        self.heartbeat = config.heartbeat();
        self
    }

    /// Number of workers.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Greedy resubmission.
    pub fn greedy(mut self, greedy: bool) -> Self {
        self.greedy = greedy;
        self
    }

    /// Heartbeat interval.
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Stop on Ctrl-C / SIGTERM. Enabled by default.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Stop when `trigger` completes, in place of Ctrl-C / SIGTERM.
    pub fn shutdown_on(mut self, trigger: impl Future<Output = ()> + Send + 'static) -> Self {
        self.shutdown = Some(ShutdownTrigger::new(trigger));
        self
    }

    /// Lifecycle hooks.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Start the pool and, when a transport is set, the listener.
    pub fn build(self) -> AppResult<Service> {
        let queue = self
            .queue
            .ok_or_else(|| AppError::configuration("service requires a work queue"))?;
        if self.heartbeat.is_zero() {
            return Err(AppError::configuration(
                "heartbeat interval must be greater than zero",
            ));
        }

        let pool = WorkerPool::new(self.pool_size, self.greedy, self.hooks.clone())?;

        let listener = match self.transport {
            Some(transport) => Some(
                EventListener::builder()
                    .transport(transport)
                    .channel(self.channel)
                    .policy(self.policy)
                    .hooks(self.hooks.clone())
                    .build()?,
            ),
            None => None,
        };

        let mut executor = TaskExecutor::new(queue, self.registry, self.hooks.clone());
        if let Some(producer) = self.producer {
            executor = executor.with_producer(producer);
        }

        let shutdown = match self.shutdown {
            Some(trigger) => Some(trigger),
            None if self.handle_signals => Some(ShutdownTrigger::new(shutdown_signal())),
            None => None,
        };

        let stop = CancellationToken::new();
        let signal_watch = shutdown.map(|trigger| {
            let stop = stop.clone();
            tokio::spawn(async move {
                trigger.0.await;
                info!("Shutdown signal received");
                stop.cancel();
            })
        });

        let jobs_shutdown = CancellationToken::new();
        let task: TaskHandle = Arc::new(QueueTask::new(Arc::new(executor), jobs_shutdown.clone()));

        Ok(Service {
            pool,
            listener,
            task,
            heartbeat: self.heartbeat,
            signal_watch,
            stop,
            jobs_shutdown,
        })
    }
}

/// Requests a graceful stop of a running [`Service`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Request shutdown and return immediately.
    pub fn stop(&self) {
        self.token.cancel();
    }
}

/// The running worker service.
#[derive(Debug)]
pub struct Service {
    pool: WorkerPool,
    listener: Option<EventListener>,
    task: TaskHandle,
    heartbeat: Duration,
    signal_watch: Option<JoinHandle<()>>,
    stop: CancellationToken,
    jobs_shutdown: CancellationToken,
}

impl Service {
    /// Start configuring a service.
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::default()
    }

    /// Handle that stops [`Service::run`] from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.stop.clone(),
        }
    }

    /// Request shutdown and return immediately.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Feed the pool until stopped, then shut down listener and pool in
    /// that order.
    pub async fn run(mut self) -> AppResult<()> {
        info!(
            pool_size = self.pool.size(),
            heartbeat_secs = self.heartbeat.as_secs_f64(),
            listening = self.listener.is_some(),
            "Service started"
        );

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut listening = self.listener.is_some();

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => {
                    info!("Stop requested");
                    break;
                }
                _ = heartbeat.tick() => {
                    trace!("Heartbeat");
                    self.tick();
                }
                wakeup = next_wakeup(&mut self.listener), if listening => match wakeup {
                    Some(()) => {
                        trace!("Wakeup received");
                        self.tick();
                    }
                    None => {
                        warn!("Event listener stopped, continuing on heartbeat only");
                        listening = false;
                    }
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn tick(&self) {
        self.pool.submit(self.task.clone());
    }

    async fn shutdown(&self) {
        info!("Shutting down");
        if let Some(watch) = &self.signal_watch {
            watch.abort();
        }
        if let Some(listener) = &self.listener {
            listener.cancel();
            listener.wait().await;
        }
        self.pool.cancel();
        self.jobs_shutdown.cancel();
        self.pool.wait().await;
        info!("Service stopped");
    }
}

async fn next_wakeup(listener: &mut Option<EventListener>) -> Option<()> {
    match listener {
        Some(listener) => listener.recv().await,
        None => None,
    }
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

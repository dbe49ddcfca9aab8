//! Worker engine for TaskHub.
//!
//! This crate provides:
//! - A fixed-size worker pool fed through a single-slot intake channel
//! - A task executor that claims one item, runs its job and applies the
//!   retry policy
//! - An event listener that turns a pub/sub subscription into wakeups and
//!   reconnects when the transport drops
//! - The service loop tying heartbeat, listener and pool together
//! - A job registry and the built-in jobs

pub mod executor;
pub mod hooks;
pub mod jobs;
pub mod listener;
pub mod pool;
pub mod queue;
pub mod recover;
pub mod registry;
pub mod retry;
pub mod service;
pub mod task;

pub use executor::{ExecutionError, RETRY_LIMIT, TaskExecutor};
pub use hooks::Hooks;
pub use listener::{DEFAULT_CHANNEL, EventListener, EventListenerBuilder, ListenerError};
pub use pool::{INTAKE_CAPACITY, PoolError, TaskHandle, WorkerPool};
pub use queue::MemoryWorkQueue;
pub use recover::JobPanic;
pub use registry::JobRegistry;
pub use retry::ReconnectPolicy;
pub use service::{Service, ServiceBuilder, StopHandle};
pub use task::{Performer, QueueTask};

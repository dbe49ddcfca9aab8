//! Observation hooks.
//!
//! Callbacks fired at well-defined points of the pool, listener, executor
//! and service lifecycles. Every hook defaults to a no-op; tests replace the
//! ones they care about with struct update syntax:
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use taskhub_worker::Hooks;
//!
//! let submitted = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&submitted);
//! let hooks = Hooks {
//!     on_submit: Arc::new(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }),
//!     ..Hooks::default()
//! };
//! (hooks.on_submit)();
//! assert_eq!(submitted.load(Ordering::SeqCst), 1);
//! ```

use std::sync::Arc;

use taskhub_core::types::WorkItem;

/// Hook without arguments.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Hook receiving a worker index.
pub type WorkerHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Hook receiving the panic message of a recovered job.
pub type RecoverHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Hook receiving the item about to be performed.
pub type ItemHook = Arc<dyn Fn(&WorkItem) + Send + Sync>;

/// Set of lifecycle callbacks shared by the engine components.
#[derive(Clone)]
pub struct Hooks {
    /// A task was offered to the pool intake.
    pub on_submit: Hook,
    /// A job panicked and the panic was contained.
    pub on_recover: RecoverHook,
    /// A job is about to run.
    pub on_job_perform: ItemHook,
    /// All pool workers exited.
    pub on_pool_exit: Hook,
    /// Both listener loops exited.
    pub on_listener_exit: Hook,
    /// The listener read loop started.
    pub on_read_start: Hook,
    /// The listener read loop exited.
    pub on_read_exit: Hook,
    /// The read loop re-established its subscription.
    pub on_read_reconnect: Hook,
    /// The read loop forwarded a wakeup downstream.
    pub on_read_fan_out: Hook,
    /// The listener monitor loop started.
    pub on_monitor_start: Hook,
    /// The listener monitor loop exited.
    pub on_monitor_exit: Hook,
    /// A pool worker started.
    pub on_worker_start: WorkerHook,
    /// A pool worker exited.
    pub on_worker_exit: WorkerHook,
    /// A pool worker finished one task.
    pub on_task_finish: WorkerHook,
}

impl Default for Hooks {
    fn default() -> Self {
        let noop: Hook = Arc::new(|| {});
        let worker_noop: WorkerHook = Arc::new(|_| {});
        Self {
            on_submit: noop.clone(),
            on_recover: Arc::new(|_: &str| {}),
            on_job_perform: Arc::new(|_: &WorkItem| {}),
            on_pool_exit: noop.clone(),
            on_listener_exit: noop.clone(),
            on_read_start: noop.clone(),
            on_read_exit: noop.clone(),
            on_read_reconnect: noop.clone(),
            on_read_fan_out: noop.clone(),
            on_monitor_start: noop.clone(),
            on_monitor_exit: noop,
            on_worker_start: worker_noop.clone(),
            on_worker_exit: worker_noop.clone(),
            on_task_finish: worker_noop,
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

//! Fixed-size worker pool.
//!
//! Workers share one intake receiver behind a FIFO-fair mutex, so idle
//! workers are served in the order they started waiting. The intake holds
//! [`INTAKE_CAPACITY`] task: one pending tick, never a backlog.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use taskhub_core::config::worker::{MAX_POOL_SIZE, MIN_POOL_SIZE};
use taskhub_core::error::AppError;

use crate::hooks::Hooks;
use crate::task::Performer;

/// Capacity of the pool intake channel.
pub const INTAKE_CAPACITY: usize = 1;

/// Shared handle to a pool task.
pub type TaskHandle = Arc<dyn Performer>;

type Intake = Arc<Mutex<mpsc::Receiver<TaskHandle>>>;

/// Pool construction errors.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Fewer workers than allowed.
    #[error("pool size {0} is below the minimum of {min}", min = MIN_POOL_SIZE)]
    SizeTooSmall(usize),

    /// More workers than allowed.
    #[error("pool size {0} exceeds the maximum of {max}", max = MAX_POOL_SIZE)]
    SizeTooLarge(usize),
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        AppError::configuration(err.to_string())
    }
}

/// A fixed set of workers consuming tasks from a single-slot intake.
#[derive(Debug)]
pub struct WorkerPool {
    sender: mpsc::Sender<TaskHandle>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    hooks: Hooks,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers. With `greedy` set, a worker resubmits its task
    /// while the queue still reports pending items.
    pub fn new(size: usize, greedy: bool, hooks: Hooks) -> Result<Self, PoolError> {
        if size < MIN_POOL_SIZE {
            return Err(PoolError::SizeTooSmall(size));
        }
        if size > MAX_POOL_SIZE {
            return Err(PoolError::SizeTooLarge(size));
        }

        let (sender, receiver) = mpsc::channel(INTAKE_CAPACITY);
        let intake: Intake = Arc::new(Mutex::new(receiver));
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        for index in 0..size {
            let worker = Worker {
                index,
                greedy,
                intake: intake.clone(),
                resubmit: sender.clone(),
                shutdown: shutdown.clone(),
                hooks: hooks.clone(),
            };
            tracker.spawn(worker.run());
        }

        info!(size, greedy, "Worker pool started");

        Ok(Self {
            sender,
            shutdown,
            tracker,
            hooks,
            size,
        })
    }

    /// Offer `task` to the pool without blocking.
    ///
    /// Returns `false` when a task is already pending or the pool is shut
    /// down; the pending task covers the request.
    pub fn submit(&self, task: TaskHandle) -> bool {
        (self.hooks.on_submit)();
        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("Pool intake full, submission coalesced");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Signal every worker to stop. Idempotent.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Whether [`WorkerPool::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Wait until every worker has exited.
    ///
    /// Workers only exit after [`WorkerPool::cancel`]; in-flight tasks are
    /// allowed to finish, the pending intake is not drained.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        (self.hooks.on_pool_exit)();
        info!("Worker pool stopped");
    }
}

struct Worker {
    index: usize,
    greedy: bool,
    intake: Intake,
    resubmit: mpsc::Sender<TaskHandle>,
    shutdown: CancellationToken,
    hooks: Hooks,
}

impl Worker {
    async fn run(self) {
        (self.hooks.on_worker_start)(self.index);
        debug!(worker = self.index, "Worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                task = receive(&self.intake) => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let depth = task.perform().await;

            if self.greedy
                && depth > 0
                && !self.shutdown.is_cancelled()
                && self.resubmit.try_send(task).is_err()
            {
                trace!(worker = self.index, depth, "Greedy resubmission dropped");
            }

            (self.hooks.on_task_finish)(self.index);
            tokio::task::yield_now().await;
        }

        (self.hooks.on_worker_exit)(self.index);
        debug!(worker = self.index, "Worker exited");
    }
}

async fn receive(intake: &Intake) -> Option<TaskHandle> {
    intake.lock().await.recv().await
}

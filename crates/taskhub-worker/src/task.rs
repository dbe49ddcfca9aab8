//! Pool tasks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::executor::TaskExecutor;

/// A unit the pool can run.
///
/// `perform` returns the queue depth observed afterwards; a positive value
/// lets a greedy pool resubmit the same task.
#[async_trait]
pub trait Performer: Send + Sync + std::fmt::Debug + 'static {
    /// Run the task once.
    async fn perform(&self) -> usize;
}

/// Task that processes one item from the queue.
#[derive(Debug, Clone)]
pub struct QueueTask {
    executor: Arc<TaskExecutor>,
    shutdown: CancellationToken,
}

impl QueueTask {
    /// Create a task running `executor`; jobs see `shutdown` as their
    /// cancellation parent.
    pub fn new(executor: Arc<TaskExecutor>, shutdown: CancellationToken) -> Self {
        Self { executor, shutdown }
    }
}

#[async_trait]
impl Performer for QueueTask {
    async fn perform(&self) -> usize {
        self.executor.perform(&self.shutdown).await
    }
}

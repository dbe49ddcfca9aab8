//! Queue manager contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{AppError, ErrorKind};
use crate::types::WorkItem;

/// Errors returned by a [`WorkQueue`].
#[derive(Debug, Error)]
pub enum QueueError {
    /// No unlocked item is available. Expected, not a failure.
    #[error("queue is empty")]
    Empty,

    /// The row is claimed by another transaction or no longer exists.
    #[error("work item '{0}' is not claimable")]
    NotClaimable(String),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] AppError),
}

impl QueueError {
    /// Whether this is the empty-queue sentinel.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Empty => AppError::not_found("queue is empty"),
            QueueError::NotClaimable(id) => {
                AppError::new(ErrorKind::Conflict, format!("work item '{id}' is not claimable"))
            }
            QueueError::Store(e) => e,
        }
    }
}

/// Lock-based FIFO-by-age store of pending work items.
///
/// Implementations must never hand the same unlocked item to two concurrent
/// `next` callers, and each of `next`/`push`/`pop` must apply completely or
/// not at all.
#[async_trait]
pub trait WorkQueue: Send + Sync + std::fmt::Debug + 'static {
    /// Claim the oldest unlocked item, marking it locked.
    async fn next(&self) -> Result<WorkItem, QueueError>;

    /// Release a claimed item to the tail of the queue.
    ///
    /// Persists `item.attempts` and `item.last_error` as given; the queue
    /// does not increment anything itself.
    async fn push(&self, item: &WorkItem) -> Result<(), QueueError>;

    /// Delete a claimed item permanently.
    async fn pop(&self, id: &str) -> Result<(), QueueError>;

    /// Number of unlocked items. Best-effort.
    async fn count(&self) -> Result<usize, QueueError>;
}

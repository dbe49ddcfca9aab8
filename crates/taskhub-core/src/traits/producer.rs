//! Producer side of the queue.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::NewWorkItem;

/// Inserts new work items and wakes up listening workers.
#[async_trait]
pub trait WorkProducer: Send + Sync + std::fmt::Debug + 'static {
    /// Enqueue a work item and return its identifier.
    ///
    /// The item is durable once this returns `Ok`. Failing to publish the
    /// wakeup notification is logged but does not fail the call: the next
    /// heartbeat picks the item up anyway.
    async fn enqueue(&self, item: NewWorkItem) -> AppResult<String>;
}

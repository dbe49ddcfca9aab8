//! Job capability and its execution context.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::traits::producer::WorkProducer;
use crate::types::WorkItem;

/// Error returned by a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job ran and failed.
    #[error("{0}")]
    Failed(String),

    /// The job observed cancellation and stopped early.
    #[error("job cancelled")]
    Cancelled,

    /// An application error surfaced from a collaborator.
    #[error(transparent)]
    Internal(#[from] AppError),
}

impl JobError {
    /// Shorthand for [`JobError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A pluggable unit of work resolved from a work item.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Run the job to completion.
    async fn perform(&self, ctx: JobContext) -> Result<(), JobError>;
}

/// Per-execution context handed to a [`Job`].
#[derive(Debug, Clone)]
pub struct JobContext {
    item_id: String,
    job_type: String,
    attempt: i32,
    cancel: CancellationToken,
    producer: Option<Arc<dyn WorkProducer>>,
}

impl JobContext {
    /// Build a context for `item`, cancelled through `cancel`.
    pub fn new(item: &WorkItem, cancel: CancellationToken) -> Self {
        Self {
            item_id: item.id.clone(),
            job_type: item.job_type.clone(),
            attempt: item.attempts,
            cancel,
            producer: None,
        }
    }

    /// Attach a producer so the job can enqueue follow-up work.
    pub fn with_producer(mut self, producer: Option<Arc<dyn WorkProducer>>) -> Self {
        self.producer = producer;
        self
    }

    /// Identifier of the work item being executed.
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Job type of the work item being executed.
    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Attempt number of this execution, starting at 1.
    pub fn attempt(&self) -> i32 {
        self.attempt
    }

    /// Token cancelled when the service shuts down or the execution ends.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Producer for follow-up work, when the service was given one.
    pub fn producer(&self) -> Option<&Arc<dyn WorkProducer>> {
        self.producer.as_ref()
    }
}

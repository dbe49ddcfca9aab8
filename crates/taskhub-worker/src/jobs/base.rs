//! No-op job.

use async_trait::async_trait;

use taskhub_core::traits::job::{Job, JobContext, JobError};

/// Job type handled by [`BaseJob`].
pub const JOB_TYPE: &str = "base";

/// Succeeds immediately. Used as a smoke job.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseJob;

#[async_trait]
impl Job for BaseJob {
    async fn perform(&self, ctx: JobContext) -> Result<(), JobError> {
        tracing::trace!(item_id = %ctx.item_id(), "Base job performed");
        Ok(())
    }
}

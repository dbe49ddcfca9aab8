//! Job that writes its payload to the log.

use async_trait::async_trait;

use taskhub_core::traits::job::{Job, JobContext, JobError};

/// Job type handled by [`LogJob`].
pub const JOB_TYPE: &str = "log";

/// Logs the payload as UTF-8 text at info level.
#[derive(Debug, Clone)]
pub struct LogJob {
    payload: Vec<u8>,
}

impl LogJob {
    /// Create a log job for `payload`.
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl Job for LogJob {
    async fn perform(&self, ctx: JobContext) -> Result<(), JobError> {
        let text = std::str::from_utf8(&self.payload)
            .map_err(|e| JobError::failed(format!("Payload is not valid UTF-8: {e}")))?;

        tracing::info!(
            item_id = %ctx.item_id(),
            attempt = ctx.attempt(),
            message = %text,
            "Log job"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskhub_core::types::WorkItem;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> JobContext {
        let item = WorkItem::new("log-1", JOB_TYPE, Vec::new());
        JobContext::new(&item, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_utf8_payload_succeeds() {
        let job = LogJob::new(b"hello".to_vec());
        assert!(job.perform(ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails() {
        let job = LogJob::new(vec![0xff, 0xfe]);
        let err = job.perform(ctx()).await.unwrap_err();
        assert!(matches!(err, JobError::Failed(_)));
    }
}

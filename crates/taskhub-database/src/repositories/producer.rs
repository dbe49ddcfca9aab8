//! Queue producer: inserts work items and publishes a wakeup.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use taskhub_core::error::{AppError, ErrorKind};
use taskhub_core::result::AppResult;
use taskhub_core::traits::producer::WorkProducer;
use taskhub_core::traits::pubsub::WakeupPublisher;
use taskhub_core::types::NewWorkItem;

const ENQUEUE: &str = "INSERT INTO work_queue (id, job_type, payload) VALUES ($1, $2, $3)";

/// Payload of the wakeup notification; listeners only care that one arrived.
pub const WAKEUP_PAYLOAD: &[u8] = b"do";

/// Enqueues work items into the `work_queue` table.
#[derive(Debug, Clone)]
pub struct PgWorkProducer {
    pool: PgPool,
    publisher: Option<Arc<dyn WakeupPublisher>>,
    channel: String,
}

impl PgWorkProducer {
    /// Create a producer that only writes to the database.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            publisher: None,
            channel: String::new(),
        }
    }

    /// Publish a wakeup on `channel` after every successful insert.
    pub fn with_publisher(
        mut self,
        publisher: Arc<dyn WakeupPublisher>,
        channel: impl Into<String>,
    ) -> Self {
        self.publisher = Some(publisher);
        self.channel = channel.into();
        self
    }
}

#[async_trait]
impl WorkProducer for PgWorkProducer {
    async fn enqueue(&self, item: NewWorkItem) -> AppResult<String> {
        if item.job_type.is_empty() {
            return Err(AppError::validation("job type must not be empty"));
        }

        let id = item.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        sqlx::query(ENQUEUE)
            .bind(&id)
            .bind(&item.job_type)
            .bind(&item.payload)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to enqueue work item", e))?;

        debug!(item_id = %id, job_type = %item.job_type, "Enqueued work item");

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(&self.channel, WAKEUP_PAYLOAD).await {
                warn!(item_id = %id, channel = %self.channel, error = %e, "Failed to publish wakeup");
            }
        }

        Ok(id)
    }
}

//! PostgreSQL queue manager.
//!
//! Every mutating operation runs in its own transaction and claims the row
//! with `FOR UPDATE SKIP LOCKED` first, so concurrent workers never block
//! each other and never act on a row another transaction is holding. A
//! transaction that is dropped before `commit` rolls back, which keeps
//! each operation all-or-nothing.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::trace;

use taskhub_core::error::{AppError, ErrorKind};
use taskhub_core::traits::queue::{QueueError, WorkQueue};
use taskhub_core::types::WorkItem;

/// Oldest unlocked item, skipping rows held by concurrent transactions.
const NEXT: &str = "SELECT id, job_type, payload, attempts, last_error, locked, updated_at \
     FROM work_queue \
     WHERE locked = FALSE \
     ORDER BY updated_at \
     LIMIT 1 \
     FOR UPDATE SKIP LOCKED";

const LOCK: &str = "UPDATE work_queue SET locked = TRUE WHERE id = $1";

/// Row claim used before push/pop.
const CLAIM: &str = "SELECT id FROM work_queue WHERE id = $1 FOR UPDATE SKIP LOCKED";

const PUSH: &str = "UPDATE work_queue \
     SET locked = FALSE, attempts = $2, last_error = $3, updated_at = NOW() \
     WHERE id = $1";

const POP: &str = "DELETE FROM work_queue WHERE id = $1";

const COUNT: &str = "SELECT COUNT(1) FROM work_queue WHERE locked = FALSE";

/// Durable, lock-based work queue backed by the `work_queue` table.
#[derive(Debug, Clone)]
pub struct PgWorkQueue {
    pool: PgPool,
}

impl PgWorkQueue {
    /// Create a new queue handle.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, QueueError> {
        self.pool
            .begin()
            .await
            .map_err(store_error("Failed to begin queue transaction"))
    }

    /// Claim the row `id` inside `tx` or fail without touching it.
    async fn claim(tx: &mut Transaction<'static, Postgres>, id: &str) -> Result<(), QueueError> {
        let claimed: Option<String> = sqlx::query_scalar(CLAIM)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(store_error("Failed to claim work item"))?;

        match claimed {
            Some(_) => Ok(()),
            None => Err(QueueError::NotClaimable(id.to_string())),
        }
    }
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    async fn next(&self) -> Result<WorkItem, QueueError> {
        let mut tx = self.begin().await?;

        let item = sqlx::query_as::<_, WorkItem>(NEXT)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error("Failed to select next work item"))?;

        let Some(mut item) = item else {
            return Err(QueueError::Empty);
        };

        sqlx::query(LOCK)
            .bind(&item.id)
            .execute(&mut *tx)
            .await
            .map_err(store_error("Failed to lock work item"))?;

        tx.commit()
            .await
            .map_err(store_error("Failed to commit dequeue"))?;

        item.locked = true;
        trace!(item_id = %item.id, job_type = %item.job_type, "Claimed work item");
        Ok(item)
    }

    async fn push(&self, item: &WorkItem) -> Result<(), QueueError> {
        let mut tx = self.begin().await?;
        Self::claim(&mut tx, &item.id).await?;

        sqlx::query(PUSH)
            .bind(&item.id)
            .bind(item.attempts)
            .bind(item.last_error.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(store_error("Failed to requeue work item"))?;

        tx.commit()
            .await
            .map_err(store_error("Failed to commit requeue"))?;

        trace!(item_id = %item.id, attempts = item.attempts, "Requeued work item");
        Ok(())
    }

    async fn pop(&self, id: &str) -> Result<(), QueueError> {
        let mut tx = self.begin().await?;
        Self::claim(&mut tx, id).await?;

        sqlx::query(POP)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store_error("Failed to delete work item"))?;

        tx.commit()
            .await
            .map_err(store_error("Failed to commit delete"))?;

        trace!(item_id = %id, "Deleted work item");
        Ok(())
    }

    async fn count(&self) -> Result<usize, QueueError> {
        let count: i64 = sqlx::query_scalar(COUNT)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error("Failed to count work items"))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Map a sqlx error into the store-unavailable queue error.
fn store_error(context: &'static str) -> impl Fn(sqlx::Error) -> QueueError {
    move |e| QueueError::Store(AppError::with_source(ErrorKind::Database, context, e))
}

//! Shared test helpers for integration tests.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{Mutex, MutexGuard};

use taskhub_core::traits::producer::WorkProducer;
use taskhub_core::types::NewWorkItem;
use taskhub_database::{PgWorkProducer, PgWorkQueue};

/// Tests share one table, so they run one at a time.
static SERIAL: Mutex<()> = Mutex::const_new(());

/// Test database context
pub struct TestDb {
    /// Database pool for direct queries
    pub pool: PgPool,
    /// Queue under test
    pub queue: PgWorkQueue,
    /// Producer writing into the same table
    pub producer: PgWorkProducer,
    _serial: MutexGuard<'static, ()>,
}

impl TestDb {
    /// Connect to the test database and empty the queue table.
    ///
    /// Returns `None` when `TASKHUB_TEST_DATABASE_URL` is not set.
    pub async fn connect() -> Option<Self> {
        let Ok(url) = std::env::var("TASKHUB_TEST_DATABASE_URL") else {
            eprintln!("TASKHUB_TEST_DATABASE_URL not set, skipping");
            return None;
        };
        let serial = SERIAL.lock().await;

        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(&url)
            .await
            .expect("Failed to connect to test database");

        taskhub_database::migration::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        sqlx::query("DELETE FROM work_queue")
            .execute(&pool)
            .await
            .expect("Failed to clean work_queue");

        Some(Self {
            queue: PgWorkQueue::new(pool.clone()),
            producer: PgWorkProducer::new(pool.clone()),
            pool,
            _serial: serial,
        })
    }

    /// Insert `n` items of `job_type` with ids `{prefix}-{i}`, oldest first.
    pub async fn seed(&self, prefix: &str, job_type: &str, n: usize) -> Vec<String> {
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let item = NewWorkItem::new(job_type, Vec::new()).with_id(format!("{prefix}-{i}"));
            ids.push(self.producer.enqueue(item).await.expect("Failed to seed item"));
        }
        ids
    }

    /// Read `(attempts, locked)` of a row directly.
    pub async fn row_state(&self, id: &str) -> Option<(i32, bool)> {
        sqlx::query_as("SELECT attempts, locked FROM work_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .expect("Failed to read row")
    }
}

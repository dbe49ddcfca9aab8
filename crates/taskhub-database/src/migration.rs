//! Schema migrations for the `work_queue` table.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use taskhub_core::error::{AppError, ErrorKind};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply pending migrations and return how many the binary embeds.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, AppError> {
    let known = MIGRATOR.iter().count();
    info!(migrations = known, "Applying work_queue migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to migrate work_queue schema: {e}"),
            e,
        )
    })?;

    info!(migrations = known, "work_queue schema is up to date");
    Ok(known)
}

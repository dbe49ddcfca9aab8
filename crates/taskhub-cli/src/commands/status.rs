//! Queue status command.

use crate::output::{self, OutputFormat};
use taskhub_core::error::AppError;
use taskhub_core::traits::queue::WorkQueue;
use taskhub_database::PgWorkQueue;

/// Execute the status command
pub async fn execute(config_path: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let db = super::create_db_pool(&config).await?;

    let reachable = db.health_check().await?;
    let pending = PgWorkQueue::new(db.pool().clone()).count().await?;
    db.close().await;

    match format {
        OutputFormat::Text => {
            println!("Queue Status:");
            output::print_kv("Database", if reachable { "ok" } else { "unexpected reply" });
            output::print_kv("Pending", &pending.to_string());
            output::print_kv("Pool Size", &config.worker.pool_size.to_string());
            output::print_kv("Greedy", &config.worker.greedy.to_string());
            output::print_kv("Heartbeat (s)", &config.worker.heartbeat_seconds.to_string());
            output::print_kv("Listener Enabled", &config.listener.enabled.to_string());
            output::print_kv("Channel", &config.redis.channel);
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "database": { "reachable": reachable },
            "pending": pending,
            "worker": {
                "pool_size": config.worker.pool_size,
                "greedy": config.worker.greedy,
                "heartbeat_seconds": config.worker.heartbeat_seconds,
            },
            "listener": {
                "enabled": config.listener.enabled,
                "channel": config.redis.channel,
            },
        })),
    }
    Ok(())
}

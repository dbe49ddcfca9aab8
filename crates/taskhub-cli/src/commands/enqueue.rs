//! Enqueue a work item from the command line.

use std::sync::Arc;

use clap::Args;

use crate::output::{self, OutputFormat};
use taskhub_core::error::AppError;
use taskhub_core::traits::producer::WorkProducer;
use taskhub_core::types::NewWorkItem;
use taskhub_database::PgWorkProducer;
use taskhub_pubsub::RedisPublisher;

/// Arguments for the enqueue command
#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Job type
    pub job_type: String,

    /// Payload, stored as UTF-8 bytes
    #[arg(short, long, default_value = "")]
    pub payload: String,

    /// Explicit item id; a UUID is generated otherwise
    #[arg(long)]
    pub id: Option<String>,

    /// Skip the wakeup notification
    #[arg(long)]
    pub no_publish: bool,
}

/// Execute the enqueue command
pub async fn execute(
    args: &EnqueueArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let db = super::create_db_pool(&config).await?;

    let mut producer = PgWorkProducer::new(db.pool().clone());
    if !args.no_publish {
        let publisher = RedisPublisher::connect(&config.redis).await?;
        producer = producer.with_publisher(Arc::new(publisher), config.redis.channel.clone());
    }

    let mut item = NewWorkItem::new(args.job_type.clone(), args.payload.as_bytes());
    if let Some(id) = &args.id {
        item = item.with_id(id.clone());
    }

    let id = producer.enqueue(item).await?;
    db.close().await;

    match format {
        OutputFormat::Text => {
            output::print_success(&format!("Work item '{}' enqueued (id: {id})", args.job_type));
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "id": id,
            "job_type": args.job_type,
        })),
    }
    Ok(())
}

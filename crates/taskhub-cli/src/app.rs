//! Configuration loading, logging setup and service wiring.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use taskhub_core::config::{AppConfig, LoggingConfig};
use taskhub_core::error::AppError;
use taskhub_core::traits::pubsub::{PubSubTransport, WakeupPublisher};
use taskhub_database::{DatabasePool, PgWorkProducer, PgWorkQueue};
use taskhub_pubsub::{RedisPublisher, RedisTransport};
use taskhub_worker::jobs::register_builtin;
use taskhub_worker::{JobRegistry, ReconnectPolicy, Service};

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Load configuration from `path` plus the `TASKHUB_ENV` overlay.
pub fn load_config(path: &str) -> Result<AppConfig, AppError> {
    let env = std::env::var("TASKHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(path, &env)
}

/// Initialize tracing. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Connect the store and transport, then run the worker service until
/// Ctrl-C or SIGTERM.
pub async fn run_server(config: AppConfig) -> Result<(), AppError> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting TaskHub");

    let db = DatabasePool::connect(&config.database).await?;
    let queue = Arc::new(PgWorkQueue::new(db.pool().clone()));
    let mut producer = PgWorkProducer::new(db.pool().clone());

    let mut transport: Option<Arc<dyn PubSubTransport>> = None;
    if config.listener.enabled {
        let publisher: Arc<dyn WakeupPublisher> =
            Arc::new(RedisPublisher::connect(&config.redis).await?);
        producer = producer.with_publisher(publisher, config.redis.channel.clone());
        transport = Some(Arc::new(RedisTransport::open(&config.redis)?));
    } else {
        warn!("Event listener disabled, polling on heartbeat only");
    }

    let mut registry = JobRegistry::new();
    register_builtin(&mut registry);
    info!(job_types = ?registry.registered_types(), "Job registry ready");

    let mut builder = Service::builder()
        .queue(queue)
        .registry(Arc::new(registry))
        .producer(Arc::new(producer))
        .worker_config(&config.worker)
        .channel(config.redis.channel.clone())
        .reconnect_policy(ReconnectPolicy::from(&config.listener));
    if let Some(transport) = transport {
        builder = builder.transport(transport);
    }

    let result = builder.build()?.run().await;
    db.close().await;
    result
}

//! Run the worker service.

use clap::Args;

use taskhub_cli::app;
use taskhub_core::error::AppError;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the worker pool size (1-1000)
    #[arg(long)]
    pub pool: Option<usize>,

    /// Override greedy resubmission
    #[arg(long)]
    pub greedy: Option<bool>,

    /// Override the heartbeat interval in seconds
    #[arg(long)]
    pub heartbeat: Option<u64>,

    /// Run database migrations on startup
    #[arg(long)]
    pub auto_migrate: bool,
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, config_path: &str) -> Result<(), AppError> {
    let mut config = super::load_config(config_path)?;

    if let Some(pool) = args.pool {
        config.worker.pool_size = pool;
    }
    if let Some(greedy) = args.greedy {
        config.worker.greedy = greedy;
    }
    if let Some(heartbeat) = args.heartbeat {
        config.worker.heartbeat_seconds = heartbeat;
    }
    if args.auto_migrate {
        config.database.auto_migrate = true;
    }
    config.worker.validate()?;

    app::init_logging(&config.logging);
    app::run_server(config).await
}

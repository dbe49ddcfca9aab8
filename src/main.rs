//! TaskHub Server: background job execution service.
//!
//! Loads configuration, initializes logging and runs the worker service
//! until Ctrl-C or SIGTERM.

use taskhub_cli::app;
use taskhub_core::config::AppConfig;
use taskhub_core::error::AppError;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    app::init_logging(&config.logging);

    if let Err(e) = app::run_server(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("TASKHUB_CONFIG").unwrap_or_else(|_| app::DEFAULT_CONFIG_PATH.to_string());
    app::load_config(&config_path)
}

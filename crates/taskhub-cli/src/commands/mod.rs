//! CLI command definitions and dispatch.

pub mod enqueue;
pub mod migrate;
pub mod serve;
pub mod status;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use taskhub_cli::app::DEFAULT_CONFIG_PATH;
use taskhub_core::config::AppConfig;
use taskhub_core::error::AppError;
use taskhub_database::DatabasePool;

/// TaskHub: background job execution service
#[derive(Debug, Parser)]
#[command(name = "taskhub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TASKHUB_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the worker service
    Serve(serve::ServeArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Enqueue a work item
    Enqueue(enqueue::EnqueueArgs),
    /// Show queue depth and worker settings
    Status,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Serve(args) => serve::execute(args, &self.config).await,
            Commands::Migrate(args) => migrate::execute(args, &self.config).await,
            Commands::Enqueue(args) => enqueue::execute(args, &self.config, self.format).await,
            Commands::Status => status::execute(&self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    taskhub_cli::app::load_config(config_path)
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from([
            "taskhub",
            "serve",
            "--pool",
            "8",
            "--greedy",
            "false",
            "--heartbeat",
            "5",
        ]);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.pool, Some(8));
        assert_eq!(args.greedy, Some(false));
        assert_eq!(args.heartbeat, Some(5));
        assert!(!args.auto_migrate);
    }

    #[test]
    fn test_parse_enqueue() {
        let cli = Cli::parse_from([
            "taskhub", "--format", "json", "enqueue", "log", "--payload", "hello", "--id", "abc",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        let Commands::Enqueue(args) = cli.command else {
            panic!("expected enqueue");
        };
        assert_eq!(args.job_type, "log");
        assert_eq!(args.payload, "hello");
        assert_eq!(args.id.as_deref(), Some("abc"));
    }
}

//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use taskhub_core::error::AppError;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config_path: &str) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let db = super::create_db_pool(&config).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            let known = taskhub_database::migration::run_migrations(db.pool()).await?;
            output::print_success(&format!("work_queue schema is current ({known} migrations)."));
        }
    }

    db.close().await;
    Ok(())
}

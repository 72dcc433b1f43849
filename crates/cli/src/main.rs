//! # Distributor CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Submission distribution from JSON data files
//! - Deferred queue sweeps
//! - Configuration validation and end point listing

mod cli;
mod commands;
mod error;
mod setup;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_end_points, run_submit, run_validate, run_work};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Distributor CLI starting"
    );

    let result = match &cli.command {
        Commands::Submit(args) => run_submit(args).await,
        Commands::Work(args) => run_work(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Endpoints(args) => run_end_points(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: cli.metrics_port,
        default_log_level: default_log_level.to_string(),
    })
}

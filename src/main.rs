// src/main.rs
mod batch;
mod config;
mod extractors;
mod pdf;
mod roster;
mod storage;
mod utils;

use clap::Parser;
use config::{Cli, Command, RunConfig};
use utils::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let cli = Cli::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging(cli.verbose);
    tracing::info!("Starting processing for args: {:?}", cli.command);

    // 3. Build the run configuration and dispatch
    let report = match &cli.command {
        Command::Grades(args) => {
            let config = RunConfig::from_grades_args(args)?;
            tracing::debug!("Run configuration: {:?}", config);
            batch::run_grades(&config).await?
        }
        Command::Redact(args) => {
            let config = RunConfig::from_redact_args(args);
            tracing::debug!("Run configuration: {:?}", config);
            batch::run_redact(&config, args.files.clone()).await?
        }
    };

    tracing::info!(
        "Processing finished. Success: {}, Failures: {}",
        report.succeeded,
        report.failed
    );

    if report.succeeded == 0 && report.failed > 0 {
        return Err(AppError::Processing(format!(
            "Every one of {} document(s) failed",
            report.failed
        )));
    }

    Ok(())
}

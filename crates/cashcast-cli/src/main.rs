//! Cashcast CLI - Cashflow forecasting pipeline
//!
//! Usage:
//!   cashcast run --provider stripe          Run the analysis once
//!   cashcast fetch --from DATE --to DATE    Export transactions
//!   cashcast schedule --every-hours 24      Run on an interval
//!   cashcast config                         Show effective configuration

mod cli;
mod commands;


use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

/// Install the process log
///
/// Events are appended to `--log-file` through an unbuffered handle, so
/// every line is on disk when the process exits. `--verbose` mirrors the
/// log to stderr.
fn init_logging(cli: &Cli) -> Result<()> {
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)
        .with_context(|| format!("Failed to open log file {}", cli.log_file.display()))?;

    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Arc::new(file));

    let stderr_layer = cli.verbose.then(|| {
        fmt::layer()
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match cli.command {
        Commands::Run {
            provider,
            no_recover,
            json,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_run(config, &provider, !no_recover, json).await
        }
        Commands::Fetch {
            provider,
            from,
            to,
            format,
            output,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_fetch(config, &provider, from, to, &format, output.as_deref()).await
        }
        Commands::Schedule {
            provider,
            every_hours,
            runs,
            no_recover,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_schedule(config, &provider, every_hours, runs, !no_recover).await
        }
        Commands::Config { path } => commands::cmd_config(cli.config.as_deref(), path),
    }
}

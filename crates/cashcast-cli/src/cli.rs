//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Cashcast - Forecast cashflow from your payment and bank data
#[derive(Parser)]
#[command(name = "cashcast")]
#[command(about = "Cashflow forecasting pipeline with automatic recovery", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Process log file (appended to)
    #[arg(long, default_value = "cashcast.log", global = true)]
    pub log_file: PathBuf,

    /// Enable verbose logging (also mirrors the log to stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full analysis once: fetch, train, forecast, insights, knowledge update
    Run {
        /// Data provider: stripe, plaid
        #[arg(short, long, default_value = "stripe")]
        provider: String,

        /// Propagate the first failure instead of recovering and re-running
        #[arg(long)]
        no_recover: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch transactions for a date range
    Fetch {
        /// Data provider: stripe, plaid
        #[arg(short, long, default_value = "stripe")]
        provider: String,

        /// First day of the window (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the window, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Output format: json, csv
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the analysis now and then on a fixed interval
    Schedule {
        /// Data provider: stripe, plaid
        #[arg(short, long, default_value = "stripe")]
        provider: String,

        /// Hours between runs
        #[arg(long, default_value = "24")]
        every_hours: u64,

        /// Stop after this many runs (runs until interrupted if not set)
        #[arg(long)]
        runs: Option<u32>,

        /// Propagate failures instead of recovering and re-running
        #[arg(long)]
        no_recover: bool,
    },

    /// Show the effective configuration
    Config {
        /// Print the override file location instead
        #[arg(long)]
        path: bool,
    },
}

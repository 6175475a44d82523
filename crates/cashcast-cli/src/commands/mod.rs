//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `run` - One analysis run with optional recovery
//! - `fetch` - Transaction export for a date range
//! - `schedule` - Recurring analysis runs
//! - `config` - Effective configuration display

pub mod config;
pub mod fetch;
pub mod run;
pub mod schedule;

// Re-export command functions for main.rs
pub use config::*;
pub use fetch::*;
pub use run::*;
pub use schedule::*;

use std::path::Path;

use anyhow::{Context, Result};
use cashcast_core::{Credentials, Orchestrator, PipelineConfig, ProviderKind};

/// Load the pipeline config, from `path` if given
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(path).context("Failed to load configuration")
}

/// Build an orchestrator over the HTTP providers and connect it
///
/// Credentials are read from the environment for the requested provider.
pub fn open_orchestrator(config: PipelineConfig, provider: &str) -> Result<Orchestrator> {
    let kind: ProviderKind = provider.parse()?;
    let mut orchestrator =
        Orchestrator::from_config(config).context("Failed to set up the pipeline")?;

    orchestrator
        .connect(kind.as_str(), &Credentials::from_env(kind))
        .with_context(|| format!("Failed to connect to {}", kind))?;

    Ok(orchestrator)
}

/// Signed amount with two decimals and thousands separators
pub fn format_amount(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "+" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}.{:02}", sign, grouped, cents % 100)
}

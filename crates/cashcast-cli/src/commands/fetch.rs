//! Transaction fetch command

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use cashcast_core::{PipelineConfig, TransactionSet};
use chrono::NaiveDate;

use super::open_orchestrator;

/// Output format for fetched transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("Unknown format '{}'. Use: json, csv", other),
        }
    }
}

/// Write the records of `data` in `format`
pub fn write_transactions<W: Write>(
    data: &TransactionSet,
    format: ExportFormat,
    mut writer: W,
) -> Result<()> {
    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, data.records())?;
            writeln!(writer)?;
        }
        ExportFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            for tx in data.records() {
                csv.serialize(tx)?;
            }
            csv.flush()?;
        }
    }
    Ok(())
}

pub async fn cmd_fetch(
    config: PipelineConfig,
    provider: &str,
    from: NaiveDate,
    to: NaiveDate,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let format = ExportFormat::parse(format)?;
    let mut orchestrator = open_orchestrator(config, provider)?;

    let data = orchestrator
        .fetch_window(from, to)
        .await
        .with_context(|| format!("Failed to fetch transactions for {}..{}", from, to))?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_transactions(&data, format, file)?;
            println!(
                "✅ Wrote {} transactions to {}",
                data.len(),
                path.display()
            );
        }
        None => write_transactions(&data, format, io::stdout().lock())?,
    }

    Ok(())
}

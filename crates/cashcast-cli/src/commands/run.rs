//! Analysis run command

use anyhow::{Context, Result};
use cashcast_core::{AnalysisResult, Orchestrator, PipelineConfig};
use tracing::info;

use super::{format_amount, open_orchestrator};

/// Run the analysis; on failure optionally recover and run once more
pub async fn analyze(
    orchestrator: &mut Orchestrator,
    recover: bool,
) -> cashcast_core::Result<AnalysisResult> {
    match orchestrator.run_analysis().await {
        Ok(result) => Ok(result),
        Err(e) if recover => {
            let report = orchestrator.recover(e).await?;
            info!(
                action = %report.action,
                attempts = report.attempts,
                "Re-running analysis after recovery"
            );
            orchestrator.run_analysis().await
        }
        Err(e) => Err(e),
    }
}

pub async fn cmd_run(config: PipelineConfig, provider: &str, recover: bool, json: bool) -> Result<()> {
    let mut orchestrator = open_orchestrator(config, provider)?;

    match analyze(&mut orchestrator, recover).await {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(provider, &result);
            }
            Ok(())
        }
        Err(e) => {
            let log = orchestrator.error_log();
            if !log.is_empty() {
                eprintln!("Errors recorded during this run ({}):", log.len());
                for entry in log.entries() {
                    eprintln!(
                        "   {}  {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.message
                    );
                }
            }
            Err(e).context("Cashflow analysis failed")
        }
    }
}

fn print_result(provider: &str, result: &AnalysisResult) {
    println!("✅ Cashflow analysis complete ({})", provider);
    println!();
    println!(
        "{:<10} {:>16} {:>16} {:>16}",
        "HORIZON", "ESTIMATE", "LOW", "HIGH"
    );
    println!("{}", "-".repeat(61));
    for (horizon, prediction) in &result.forecasts {
        println!(
            "{:<10} {:>16} {:>16} {:>16}",
            format!("{} days", horizon),
            format_amount(prediction.point_estimate),
            format_amount(prediction.confidence_low),
            format_amount(prediction.confidence_high)
        );
    }

    println!();
    println!("Insights:");
    for (key, text) in &result.insights {
        println!("   {}: {}", key, text);
    }
}

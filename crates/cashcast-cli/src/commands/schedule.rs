//! Recurring analysis runs

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Result};
use cashcast_core::{AnalysisResult, PipelineConfig, ProviderKind};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use super::{analyze, open_orchestrator};

/// Call `job` once per `period`, starting immediately
///
/// Runs never overlap: a slow run delays the next tick. A failed run is
/// logged and the schedule continues. Stops after `max_runs` runs or on
/// Ctrl-C. Returns the number of successful runs.
pub async fn run_schedule<F, Fut>(period: Duration, max_runs: Option<u32>, mut job: F) -> u32
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<AnalysisResult>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut run = 0;
    let mut succeeded = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Schedule interrupted");
                break;
            }
        }

        run += 1;
        info!(run, "Running scheduled analysis...");
        match job(run).await {
            Ok(result) => {
                succeeded += 1;
                info!(
                    run,
                    horizons = result.forecasts.len(),
                    "Scheduled analysis completed"
                );
            }
            Err(e) => error!(run, "Scheduled analysis failed: {:#}", e),
        }

        if max_runs.is_some_and(|max| run >= max) {
            break;
        }
    }
    succeeded
}

pub async fn cmd_schedule(
    config: PipelineConfig,
    provider: &str,
    every_hours: u64,
    runs: Option<u32>,
    recover: bool,
) -> Result<()> {
    if every_hours == 0 {
        bail!("--every-hours must be at least 1");
    }
    let kind: ProviderKind = provider.parse()?;

    println!(
        "⏱  Running {} analysis every {} hours (Ctrl-C to stop)",
        kind, every_hours
    );
    info!(provider = %kind, every_hours, "Starting analysis schedule");

    let period = Duration::from_secs(every_hours * 3600);
    let succeeded = run_schedule(period, runs, |_| {
        // Fresh orchestrator, connection and error log per run
        let config = config.clone();
        async move {
            let mut orchestrator = open_orchestrator(config, kind.as_str())?;
            let result = analyze(&mut orchestrator, recover).await?;
            Ok::<_, anyhow::Error>(result)
        }
    })
    .await;

    println!("Schedule stopped after {} successful runs", succeeded);
    Ok(())
}

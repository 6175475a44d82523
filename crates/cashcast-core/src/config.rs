//! Pipeline configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Explicit path, or the override in the data dir
//!    (~/.local/share/cashcast/config/pipeline.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default value.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::ProviderKind;
use crate::recovery::RetryPolicy;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/pipeline.toml");

/// Upper bound on `trailing_window_days` (100 years)
pub const MAX_TRAILING_WINDOW_DAYS: u32 = 36_500;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Days of history fetched by each run and by recovery refetches
    pub trailing_window_days: u32,
    /// Forecast horizons produced by `run_analysis`, in order
    pub horizons: Vec<u32>,
    /// Horizon recomputed for the knowledge store update
    pub knowledge_horizon_days: u32,
    pub retry: RetryPolicy,
    pub stripe_base_url: String,
    pub plaid_base_url: String,
    /// Directory for the file-backed knowledge store
    pub knowledge_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            trailing_window_days: 365,
            horizons: vec![30, 90],
            knowledge_horizon_days: 30,
            retry: RetryPolicy::default(),
            stripe_base_url: "https://api.stripe.com".to_string(),
            plaid_base_url: "https://production.plaid.com".to_string(),
            knowledge_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path, the data-dir override, or embedded defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?,
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => {
                    tracing::debug!(path = %default_path.display(), "Using config override");
                    fs::read_to_string(&default_path).map_err(|e| {
                        Error::Config(format!("Failed to read config: {}", e))
                    })?
                }
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        parse_config(&content)
    }

    pub fn base_url(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Stripe => &self.stripe_base_url,
            ProviderKind::Plaid => &self.plaid_base_url,
        }
    }

    /// Knowledge store directory, defaulting to the platform data dir
    pub fn knowledge_dir(&self) -> PathBuf {
        self.knowledge_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cashcast")
                .join("knowledge")
        })
    }

    fn validate(&self) -> Result<()> {
        if self.trailing_window_days == 0 {
            return Err(Error::Config(
                "trailing_window_days must be positive".to_string(),
            ));
        }
        if self.trailing_window_days > MAX_TRAILING_WINDOW_DAYS {
            return Err(Error::Config(format!(
                "trailing_window_days must be at most {}",
                MAX_TRAILING_WINDOW_DAYS
            )));
        }
        if self.horizons.is_empty() {
            return Err(Error::Config("horizons must not be empty".to_string()));
        }
        if self.horizons.contains(&0) || self.knowledge_horizon_days == 0 {
            return Err(Error::Config("horizons must be positive".to_string()));
        }
        if self.retry.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("cashcast").join("config").join("pipeline.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    pipeline: Option<RawPipeline>,
    retry: Option<RawRetry>,
    providers: Option<RawProviders>,
    knowledge: Option<RawKnowledge>,
}

#[derive(Debug, Deserialize)]
struct RawPipeline {
    trailing_window_days: Option<u32>,
    horizons: Option<Vec<u32>>,
    knowledge_horizon_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_retries: Option<u32>,
    backoff_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawProviders {
    stripe: Option<RawProvider>,
    plaid: Option<RawProvider>,
}

#[derive(Debug, Deserialize)]
struct RawProvider {
    base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKnowledge {
    dir: Option<PathBuf>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<PipelineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = PipelineConfig::default();

    if let Some(pipeline) = raw.pipeline {
        if let Some(days) = pipeline.trailing_window_days {
            config.trailing_window_days = days;
        }
        if let Some(horizons) = pipeline.horizons {
            config.horizons = horizons;
        }
        if let Some(days) = pipeline.knowledge_horizon_days {
            config.knowledge_horizon_days = days;
        }
    }

    if let Some(retry) = raw.retry {
        if let Some(max_retries) = retry.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(secs) = retry.backoff_secs {
            config.retry.backoff = Duration::from_secs(secs);
        }
    }

    if let Some(providers) = raw.providers {
        if let Some(url) = providers.stripe.and_then(|p| p.base_url) {
            config.stripe_base_url = url;
        }
        if let Some(url) = providers.plaid.and_then(|p| p.base_url) {
            config.plaid_base_url = url;
        }
    }

    if let Some(knowledge) = raw.knowledge {
        config.knowledge_dir = knowledge.dir;
    }

    config.validate()?;
    Ok(config)
}

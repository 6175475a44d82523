//! Data models for the cashflow pipeline

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Supported transaction data providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Payment processor API (balance transactions, cursor pagination)
    Stripe,
    /// Bank aggregation API (account transactions, offset pagination)
    Plaid,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Stripe => "stripe",
            ProviderKind::Plaid => "plaid",
        }
    }

    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Stripe, ProviderKind::Plaid]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stripe" => Ok(ProviderKind::Stripe),
            "plaid" => Ok(ProviderKind::Plaid),
            _ => Err(Error::InvalidProviderType(s.to_string())),
        }
    }
}

/// Inclusive date range for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(format!(
                "Window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Window ending today and extending back `days` days
    pub fn trailing(days: u32) -> Result<Self> {
        let end = Utc::now().date_naive();
        let start = end
            .checked_sub_signed(Duration::days(days as i64))
            .ok_or_else(|| {
                Error::InvalidInput(format!("Trailing window of {} days is out of range", days))
            })?;
        Ok(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A single cashflow record. Positive amounts are inflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Provider-side identifier
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
}

/// Transactions fetched for one window, ordered by timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSet {
    window: DateWindow,
    records: Vec<Transaction>,
}

impl TransactionSet {
    pub fn new(window: DateWindow, mut records: Vec<Transaction>) -> Self {
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Self { window, records }
    }

    pub fn window(&self) -> DateWindow {
        self.window
    }

    pub fn records(&self) -> &[Transaction] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check the training schema: finite amounts and a category on every record
    pub fn validate(&self) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::DataProcessing(format!(
                "No transactions in window {}",
                self.window
            )));
        }
        for tx in &self.records {
            if !tx.amount.is_finite() {
                return Err(Error::DataProcessing(format!(
                    "Transaction {} has non-finite amount",
                    tx.id
                )));
            }
            if tx.category.trim().is_empty() {
                return Err(Error::DataProcessing(format!(
                    "Transaction {} has no category",
                    tx.id
                )));
            }
        }
        Ok(())
    }

    /// SHA-256 over the ordered records, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for tx in &self.records {
            hasher.update(tx.id.as_bytes());
            hasher.update(tx.timestamp.to_rfc3339().as_bytes());
            hasher.update(tx.amount.to_le_bytes());
            hasher.update(tx.category.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Raw model output for one horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawForecast {
    pub cashflow: f64,
    pub low_ci: f64,
    pub high_ci: f64,
}

/// Validated cashflow prediction for a horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub horizon_days: u32,
    pub point_estimate: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
}

impl Prediction {
    /// Build from model output, rejecting non-finite or unordered bands
    pub fn from_raw(horizon_days: u32, raw: RawForecast) -> Result<Self> {
        let values = [raw.cashflow, raw.low_ci, raw.high_ci];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Prediction(format!(
                "Model returned non-finite forecast for {} days",
                horizon_days
            )));
        }
        if !(raw.low_ci <= raw.cashflow && raw.cashflow <= raw.high_ci) {
            return Err(Error::Prediction(format!(
                "Confidence band [{:.2}, {:.2}] does not contain estimate {:.2}",
                raw.low_ci, raw.high_ci, raw.cashflow
            )));
        }
        Ok(Self {
            horizon_days,
            point_estimate: raw.cashflow,
            confidence_low: raw.low_ci,
            confidence_high: raw.high_ci,
        })
    }
}

/// Insight key to human-readable text
pub type InsightSet = BTreeMap<String, String>;

/// Lifecycle of the forecast model as tracked by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Untrained,
    Trained,
}

impl ModelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Untrained => "untrained",
            ModelState::Trained => "trained",
        }
    }
}

/// Output of a complete pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Predictions keyed by horizon in days
    pub forecasts: BTreeMap<u32, Prediction>,
    pub insights: InsightSet,
}

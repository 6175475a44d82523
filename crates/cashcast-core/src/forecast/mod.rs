//! Forecast models
//!
//! - `ForecastModel` trait: train on a transaction set, predict a horizon,
//!   describe what was learned
//! - `BaselineModel`: daily net cashflow statistics with a normal band
//! - `MockModel`: scripted responses for tests

mod baseline;
mod mock;

pub use baseline::BaselineModel;
pub use mock::MockModel;

use crate::error::Result;
use crate::models::{InsightSet, RawForecast, TransactionSet};

/// Interface for cashflow forecasting models
///
/// Training replaces any previously learned state. `predict` and
/// `generate_insights` return `Error::NotTrained` until a training call
/// succeeds.
pub trait ForecastModel: Send + Sync {
    /// Human-readable name (for logging)
    fn name(&self) -> &str;

    fn train(&mut self, data: &TransactionSet) -> Result<()>;

    /// Cumulative net cashflow expected over the next `horizon_days`
    fn predict(&self, horizon_days: u32) -> Result<RawForecast>;

    /// Insights derived from the current trained state
    fn generate_insights(&self) -> Result<InsightSet>;
}

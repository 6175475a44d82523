//! Mock forecast model for testing
//!
//! Clones share state so tests can inspect calls after handing the model to
//! an orchestrator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::models::{InsightSet, RawForecast, TransactionSet};

use super::ForecastModel;

#[derive(Default)]
struct MockState {
    trained: bool,
    train_failures: VecDeque<Error>,
    predict_failures: VecDeque<Error>,
    insight_override: Option<InsightSet>,
    inverted_band: bool,
    trained_sizes: Vec<usize>,
    predict_calls: Vec<u32>,
    insight_calls: u32,
}

/// Mock model returning predictable forecasts
///
/// `predict(h)` returns `10h` with a band of `[8h, 12h]`.
#[derive(Clone, Default)]
pub struct MockModel {
    state: Arc<Mutex<MockState>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_next_train(&self, error: Error) {
        self.state().train_failures.push_back(error);
    }

    pub fn fail_next_predict(&self, error: Error) {
        self.state().predict_failures.push_back(error);
    }

    /// Return a band that does not contain the estimate
    pub fn return_inverted_band(&self) {
        self.state().inverted_band = true;
    }

    pub fn set_insights(&self, insights: InsightSet) {
        self.state().insight_override = Some(insights);
    }

    /// Sizes of the sets passed to successful and failed `train` calls
    pub fn trained_sizes(&self) -> Vec<usize> {
        self.state().trained_sizes.clone()
    }

    pub fn train_calls(&self) -> usize {
        self.state().trained_sizes.len()
    }

    pub fn predict_calls(&self) -> Vec<u32> {
        self.state().predict_calls.clone()
    }

    pub fn insight_calls(&self) -> u32 {
        self.state().insight_calls
    }

    pub fn is_trained(&self) -> bool {
        self.state().trained
    }
}

impl ForecastModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn train(&mut self, data: &TransactionSet) -> Result<()> {
        let mut state = self.state();
        state.trained_sizes.push(data.len());
        state.trained = false;

        if let Some(error) = state.train_failures.pop_front() {
            return Err(error);
        }
        data.validate()?;

        state.trained = true;
        Ok(())
    }

    fn predict(&self, horizon_days: u32) -> Result<RawForecast> {
        let mut state = self.state();
        state.predict_calls.push(horizon_days);

        if !state.trained {
            return Err(Error::NotTrained);
        }
        if let Some(error) = state.predict_failures.pop_front() {
            return Err(error);
        }

        let h = horizon_days as f64;
        let (low_ci, high_ci) = if state.inverted_band {
            (12.0 * h, 8.0 * h)
        } else {
            (8.0 * h, 12.0 * h)
        };
        Ok(RawForecast {
            cashflow: 10.0 * h,
            low_ci,
            high_ci,
        })
    }

    fn generate_insights(&self) -> Result<InsightSet> {
        let mut state = self.state();
        state.insight_calls += 1;

        if !state.trained {
            return Err(Error::NotTrained);
        }
        if let Some(ref insights) = state.insight_override {
            return Ok(insights.clone());
        }

        let mut insights = InsightSet::new();
        insights.insert("key_metric_1".to_string(), "Cashflow positive".to_string());
        insights.insert("key_metric_2".to_string(), "Spending stable".to_string());
        Ok(insights)
    }
}

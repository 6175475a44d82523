//! Baseline forecast model
//!
//! Treats daily net cashflow as independent draws: the point estimate for
//! `h` days is `h * mean` and the band is `± z * stddev * sqrt(h)`.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};

use crate::error::{Error, Result};
use crate::models::{InsightSet, RawForecast, TransactionSet};

use super::ForecastModel;

/// Two-sided 95% normal quantile
const DEFAULT_Z: f64 = 1.96;

/// Days compared against the full window for the trend insight
const RECENT_DAYS: usize = 30;

#[derive(Debug, Clone)]
struct TrainedStats {
    days: usize,
    mean_daily: f64,
    stddev_daily: f64,
    recent_mean_daily: f64,
    total_inflow: f64,
    total_outflow: f64,
    /// Outflow per category, positive values
    outflow_by_category: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct BaselineModel {
    z: f64,
    stats: Option<TrainedStats>,
}

impl BaselineModel {
    pub fn new() -> Self {
        Self {
            z: DEFAULT_Z,
            stats: None,
        }
    }

    /// Use a different band width (e.g. 1.645 for 90%)
    pub fn with_z(z: f64) -> Self {
        Self { z, stats: None }
    }

    pub fn is_trained(&self) -> bool {
        self.stats.is_some()
    }

    fn stats(&self) -> Result<&TrainedStats> {
        self.stats.as_ref().ok_or(Error::NotTrained)
    }
}

impl Default for BaselineModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Net amount per calendar day across the whole window, zero-filled
fn daily_net(data: &TransactionSet) -> Vec<f64> {
    let window = data.window();
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    let mut day = window.start;
    while day <= window.end {
        by_day.insert(day, 0.0);
        day += Duration::days(1);
    }

    for tx in data.records() {
        // Records outside the window still count toward their own day
        *by_day.entry(tx.timestamp.date_naive()).or_insert(0.0) += tx.amount;
    }

    by_day.into_values().collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn money(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount)
    }
}

impl ForecastModel for BaselineModel {
    fn name(&self) -> &str {
        "baseline"
    }

    fn train(&mut self, data: &TransactionSet) -> Result<()> {
        // Replaces prior state even when validation fails
        self.stats = None;
        data.validate()?;

        let daily = daily_net(data);
        let mean_daily = mean(&daily);
        let stddev_daily = stddev(&daily, mean_daily);
        let recent = &daily[daily.len().saturating_sub(RECENT_DAYS)..];

        let mut total_inflow = 0.0;
        let mut total_outflow = 0.0;
        let mut outflow_by_category: HashMap<String, f64> = HashMap::new();
        for tx in data.records() {
            if tx.amount >= 0.0 {
                total_inflow += tx.amount;
            } else {
                total_outflow += -tx.amount;
                *outflow_by_category.entry(tx.category.clone()).or_insert(0.0) += -tx.amount;
            }
        }

        self.stats = Some(TrainedStats {
            days: daily.len(),
            mean_daily,
            stddev_daily,
            recent_mean_daily: mean(recent),
            total_inflow,
            total_outflow,
            outflow_by_category,
        });
        Ok(())
    }

    fn predict(&self, horizon_days: u32) -> Result<RawForecast> {
        let stats = self.stats()?;
        let h = horizon_days as f64;
        let cashflow = stats.mean_daily * h;
        let half_width = self.z * stats.stddev_daily * h.sqrt();

        Ok(RawForecast {
            cashflow,
            low_ci: cashflow - half_width,
            high_ci: cashflow + half_width,
        })
    }

    fn generate_insights(&self) -> Result<InsightSet> {
        let stats = self.stats()?;
        let mut insights = InsightSet::new();

        insights.insert(
            "average_daily_net".to_string(),
            format!(
                "Average daily net cashflow is {} over the last {} days ({} in, {} out)",
                money(stats.mean_daily),
                stats.days,
                money(stats.total_inflow),
                money(stats.total_outflow)
            ),
        );

        insights.insert(
            "cashflow_volatility".to_string(),
            format!(
                "Daily net cashflow typically varies by {} around the average",
                money(stats.stddev_daily)
            ),
        );

        let change = stats.recent_mean_daily - stats.mean_daily;
        let direction = if change >= 0.0 { "up" } else { "down" };
        insights.insert(
            "recent_trend".to_string(),
            format!(
                "The last {} days averaged {} per day, {} {} on the full-window average",
                RECENT_DAYS.min(stats.days),
                money(stats.recent_mean_daily),
                direction,
                money(change.abs())
            ),
        );

        // Ties broken by name so repeated calls agree
        let largest = stats
            .outflow_by_category
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)));
        let outflow_text = match largest {
            Some((category, amount)) if stats.total_outflow > 0.0 => format!(
                "{} is the largest outflow at {} ({:.0}% of spending)",
                category,
                money(*amount),
                amount / stats.total_outflow * 100.0
            ),
            _ => "No outflows in the training window".to_string(),
        };
        insights.insert("largest_outflow_category".to_string(), outflow_text);

        Ok(insights)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::models::{DateWindow, Transaction};

    fn tx(id: &str, day: u32, amount: f64, category: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
            amount,
            category: category.to_string(),
            description: None,
        }
    }

    fn january(records: Vec<Transaction>) -> TransactionSet {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        TransactionSet::new(window, records)
    }

    fn sample() -> TransactionSet {
        january(vec![
            tx("a", 1, 3100.0, "Sales"),
            tx("b", 2, -1000.0, "Rent"),
            tx("c", 10, -100.0, "Fees"),
            tx("d", 20, 310.0, "Sales"),
        ])
    }

    #[test]
    fn test_untrained_fails() {
        let model = BaselineModel::new();
        assert!(!model.is_trained());
        assert!(matches!(model.predict(30), Err(Error::NotTrained)));
        assert!(matches!(model.generate_insights(), Err(Error::NotTrained)));
    }

    #[test]
    fn test_train_rejects_empty() {
        let mut model = BaselineModel::new();
        let result = model.train(&january(vec![]));
        assert!(matches!(result, Err(Error::DataProcessing(_))));
        assert!(!model.is_trained());
    }

    #[test]
    fn test_failed_retrain_clears_state() {
        let mut model = BaselineModel::new();
        model.train(&sample()).unwrap();
        assert!(model.is_trained());

        assert!(model.train(&january(vec![])).is_err());
        assert!(!model.is_trained());
    }

    #[test]
    fn test_predict_scales_with_horizon() {
        let mut model = BaselineModel::new();
        model.train(&sample()).unwrap();

        // Net 2310 over 31 days
        let p30 = model.predict(30).unwrap();
        let expected = 2310.0 / 31.0 * 30.0;
        assert!((p30.cashflow - expected).abs() < 1e-9);
        assert!(p30.low_ci <= p30.cashflow && p30.cashflow <= p30.high_ci);

        let p90 = model.predict(90).unwrap();
        assert!((p90.cashflow - 3.0 * p30.cashflow).abs() < 1e-9);
        assert!(p90.high_ci - p90.low_ci > p30.high_ci - p30.low_ci);
    }

    #[test]
    fn test_insights_are_stable() {
        let mut model = BaselineModel::new();
        model.train(&sample()).unwrap();

        let first = model.generate_insights().unwrap();
        let second = model.generate_insights().unwrap();
        assert_eq!(first, second);

        assert!(first["largest_outflow_category"].starts_with("Rent"));
        assert!(first.values().all(|v| !v.trim().is_empty()));
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_stddev_single_value() {
        assert_eq!(stddev(&[5.0], 5.0), 0.0);
        assert_eq!(money(-3.5), "-$3.50");
    }
}

//! Mock provider for testing
//!
//! Clones share state, so a test can keep a handle to the provider it hands
//! to the orchestrator and script failures or inspect calls through it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{Error, Result};
use crate::models::{DateWindow, ProviderKind, Transaction};

use super::{Connector, Credentials, DataProvider};

#[derive(Default)]
struct MockState {
    transactions: Vec<Transaction>,
    fetch_failures: VecDeque<Error>,
    reinitialize_failures: VecDeque<Error>,
    always_fail_fetch: Option<String>,
    always_fail_reinitialize: Option<String>,
    fetch_calls: Vec<DateWindow>,
    reinitialize_calls: u32,
}

/// Mock provider returning canned transactions
#[derive(Clone)]
pub struct MockProvider {
    kind: ProviderKind,
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// Create a mock serving a year and a half of generated history
    pub fn new(kind: ProviderKind) -> Self {
        let today = chrono::Utc::now().date_naive();
        Self::with_transactions(kind, sample_transactions(today, 540))
    }

    pub fn with_transactions(kind: ProviderKind, transactions: Vec<Transaction>) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(MockState {
                transactions,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next fetch with `error`
    pub fn fail_next_fetch(&self, error: Error) {
        self.state().fetch_failures.push_back(error);
    }

    /// Fail every fetch with a connectivity error
    pub fn fail_fetch_always(&self, message: &str) {
        self.state().always_fail_fetch = Some(message.to_string());
    }

    /// Fail the next reinitialize with `error`
    pub fn fail_next_reinitialize(&self, error: Error) {
        self.state().reinitialize_failures.push_back(error);
    }

    /// Fail every reinitialize with a connectivity error
    pub fn fail_reinitialize_always(&self, message: &str) {
        self.state().always_fail_reinitialize = Some(message.to_string());
    }

    pub fn set_transactions(&self, transactions: Vec<Transaction>) {
        self.state().transactions = transactions;
    }

    /// Windows requested so far, oldest first
    pub fn fetch_calls(&self) -> Vec<DateWindow> {
        self.state().fetch_calls.clone()
    }

    pub fn reinitialize_calls(&self) -> u32 {
        self.state().reinitialize_calls
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(&self, window: DateWindow) -> Result<Vec<Transaction>> {
        let mut state = self.state();
        state.fetch_calls.push(window);

        if let Some(error) = state.fetch_failures.pop_front() {
            return Err(error);
        }
        if let Some(ref message) = state.always_fail_fetch {
            return Err(Error::Connectivity(message.clone()));
        }

        Ok(state
            .transactions
            .iter()
            .filter(|tx| {
                let date = tx.timestamp.date_naive();
                date >= window.start && date <= window.end
            })
            .cloned()
            .collect())
    }

    async fn reinitialize(&mut self) -> Result<()> {
        let mut state = self.state();
        state.reinitialize_calls += 1;

        if let Some(error) = state.reinitialize_failures.pop_front() {
            return Err(error);
        }
        if let Some(ref message) = state.always_fail_reinitialize {
            return Err(Error::Connectivity(message.clone()));
        }
        Ok(())
    }
}

/// Connector handing out clones of one mock provider
#[derive(Clone)]
pub struct MockConnector {
    provider: MockProvider,
    opened: Arc<Mutex<Vec<ProviderKind>>>,
}

impl MockConnector {
    pub fn new(provider: MockProvider) -> Self {
        Self {
            provider,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn provider(&self) -> &MockProvider {
        &self.provider
    }

    /// Kinds passed to `open`, in call order
    pub fn opened(&self) -> Vec<ProviderKind> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Connector for MockConnector {
    fn open(&self, kind: ProviderKind, _credentials: &Credentials) -> Result<Box<dyn DataProvider>> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(kind);
        Ok(Box::new(MockProvider {
            kind,
            state: self.provider.state.clone(),
        }))
    }
}

/// Deterministic daily history ending at `end`
///
/// Weekday sales inflows, a monthly rent outflow on the 1st, weekly payroll
/// on Fridays and small fees every third day.
pub fn sample_transactions(end: NaiveDate, days: u32) -> Vec<Transaction> {
    let mut transactions = Vec::new();

    for offset in 0..days {
        let date = end - Duration::days(offset as i64);
        let noon = match date.and_hms_opt(12, 0, 0) {
            Some(dt) => dt.and_utc(),
            None => continue,
        };
        let weekday = date.weekday().num_days_from_monday();
        let push = |transactions: &mut Vec<Transaction>, kind: &str, amount: f64, category: &str| {
            transactions.push(Transaction {
                id: format!("{}-{}", kind, date.format("%Y%m%d")),
                timestamp: noon,
                amount,
                category: category.to_string(),
                description: Some(format!("{} {}", category, date)),
            });
        };

        if weekday < 5 {
            // Vary sales so the model sees some spread
            let sales = 1_200.0 + ((offset * 37) % 400) as f64;
            push(&mut transactions, "sale", sales, "Sales");
        }
        if date.day() == 1 {
            push(&mut transactions, "rent", -4_500.0, "Rent");
        }
        if weekday == 4 {
            push(&mut transactions, "payroll", -3_800.0, "Payroll");
        }
        if offset % 3 == 0 {
            push(&mut transactions, "fee", -(15.0 + (offset % 7) as f64), "Fees");
        }
    }

    transactions
}

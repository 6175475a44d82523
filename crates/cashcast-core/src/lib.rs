//! Cashcast Core Library
//!
//! Cashflow forecasting pipeline with bounded error recovery:
//! - Pluggable transaction data providers (Stripe-like, Plaid-like, mock)
//! - Forecast models behind a train/predict/insights interface
//! - Knowledge stores for prediction and history snapshots
//! - Pipeline orchestrator with an append-only error log
//! - Retry state machine mapping error kinds to corrective actions
//! - Layered TOML configuration

pub mod config;
pub mod error;
pub mod error_log;
pub mod forecast;
pub mod knowledge;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod recovery;

/// Test utilities including a mock provider API server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{default_config_path, PipelineConfig};
pub use error::{Error, ErrorKind, Result};
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use forecast::{BaselineModel, ForecastModel, MockModel};
pub use knowledge::{
    FileKnowledgeStore, KnowledgeRecord, KnowledgeStore, KnowledgeUpdate, MemoryKnowledgeStore,
};
pub use models::{
    AnalysisResult, DateWindow, InsightSet, ModelState, Prediction, ProviderKind, RawForecast,
    Transaction, TransactionSet,
};
pub use orchestrator::Orchestrator;
pub use provider::{
    Connection, Connector, Credentials, DataProvider, HttpConnector, MockConnector, MockProvider,
};
pub use recovery::{RecoveryAction, RecoveryReport, RecoveryState, RetryPolicy, RetryState};

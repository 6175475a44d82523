//! Pipeline orchestrator
//!
//! Runs fetch → train → predict (per horizon) → insights → knowledge update
//! strictly in order. A failing stage appends one entry to the error log and
//! propagates; nothing is retried unless the caller hands the error to
//! [`Orchestrator::recover`].
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut orchestrator = Orchestrator::from_config(PipelineConfig::load(None)?)?;
//! orchestrator.connect("stripe", &Credentials::from_env(ProviderKind::Stripe))?;
//!
//! let result = match orchestrator.run_analysis().await {
//!     Ok(result) => result,
//!     Err(e) => {
//!         orchestrator.recover(e).await?;
//!         orchestrator.run_analysis().await?
//!     }
//! };
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::error_log::ErrorLog;
use crate::forecast::{BaselineModel, ForecastModel};
use crate::knowledge::{
    FileKnowledgeStore, KnowledgeStore, KnowledgeUpdate, HISTORY_KEY, PREDICTIONS_KEY,
};
use crate::models::{
    AnalysisResult, DateWindow, InsightSet, ModelState, Prediction, ProviderKind, TransactionSet,
};
use crate::provider::{Connection, Connector, Credentials, HttpConnector};
use crate::recovery::{RecoveryAction, RecoveryReport, RecoveryState, RetryState};

/// Pipeline stages, for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetch,
    Train,
    Predict,
    Insights,
    UpdateKnowledge,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Train => "train",
            Stage::Predict => "predict",
            Stage::Insights => "insights",
            Stage::UpdateKnowledge => "update_knowledge",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Stage::Fetch => "Failed to fetch financial data",
            Stage::Train => "Model training failed",
            Stage::Predict => "Cashflow prediction failed",
            Stage::Insights => "Insight generation failed",
            Stage::UpdateKnowledge => "Failed to update knowledge base",
        }
    }
}

/// Owns the connection, model, knowledge store and error log for one pipeline
///
/// Every operation takes `&mut self`; run concurrent pipelines on separate
/// instances.
pub struct Orchestrator {
    config: PipelineConfig,
    connector: Box<dyn Connector>,
    connection: Option<Connection>,
    model: Box<dyn ForecastModel>,
    model_state: ModelState,
    knowledge: Box<dyn KnowledgeStore>,
    error_log: ErrorLog,
    recovery_state: RecoveryState,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        connector: Box<dyn Connector>,
        model: Box<dyn ForecastModel>,
        knowledge: Box<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            config,
            connector,
            connection: None,
            model,
            model_state: ModelState::Untrained,
            knowledge,
            error_log: ErrorLog::new(),
            recovery_state: RecoveryState::Idle,
        }
    }

    /// HTTP providers, the baseline model and a file knowledge store
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let connector = HttpConnector::from_config(&config);
        let knowledge = FileKnowledgeStore::new(config.knowledge_dir())?;
        Ok(Self::new(
            config,
            Box::new(connector),
            Box::new(BaselineModel::new()),
            Box::new(knowledge),
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn model_state(&self) -> ModelState {
        self.model_state
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// State reached by the most recent `recover` call
    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery_state
    }

    /// Log a stage failure and append it to the error log
    fn logged<T>(&mut self, stage: Stage, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            error!(
                stage = stage.as_str(),
                kind = %e.kind(),
                "{}: {}",
                stage.failure_message(),
                e
            );
            self.error_log.record_error(e);
        }
        result
    }

    // ========== Connection ==========

    /// Open a connection to `provider_type` ("stripe" or "plaid")
    ///
    /// An unknown provider type or unusable credentials leave the current
    /// connection untouched.
    pub fn connect(&mut self, provider_type: &str, credentials: &Credentials) -> Result<&Connection> {
        let kind: ProviderKind = provider_type.parse()?;
        let provider = self.connector.open(kind, credentials)?;

        info!(provider = %kind, "Connected to data provider");
        Ok(&*self.connection.insert(Connection::new(provider)))
    }

    // ========== Stages ==========

    async fn fetch_inner(&self, window: DateWindow) -> Result<TransactionSet> {
        let connection = self.connection.as_ref().ok_or(Error::NotConnected)?;
        connection.fetch(window).await
    }

    /// Fetch transactions dated within `[start, end]` from the active connection
    pub async fn fetch_window(&mut self, start: NaiveDate, end: NaiveDate) -> Result<TransactionSet> {
        let result = match DateWindow::new(start, end) {
            Ok(window) => self.fetch_inner(window).await,
            Err(e) => Err(e),
        };
        let data = self.logged(Stage::Fetch, result)?;
        info!(
            records = data.len(),
            window = %data.window(),
            "Fetched financial data"
        );
        Ok(data)
    }

    async fn fetch_trailing(&mut self) -> Result<TransactionSet> {
        match DateWindow::trailing(self.config.trailing_window_days) {
            Ok(window) => self.fetch_window(window.start, window.end).await,
            Err(e) => self.logged(Stage::Fetch, Err(e)),
        }
    }

    fn train_inner(&mut self, data: TransactionSet) -> Result<()> {
        // Retraining replaces the prior state, so any failure leaves us untrained
        self.model_state = ModelState::Untrained;
        data.validate()?;
        self.model.train(&data)?;
        self.model_state = ModelState::Trained;

        info!(
            model = self.model.name(),
            records = data.len(),
            fingerprint = %data.fingerprint(),
            "Model training completed successfully"
        );
        Ok(())
    }

    /// Train the model on a fetched set, consuming it
    pub fn train_on_window(&mut self, data: TransactionSet) -> Result<()> {
        let result = self.train_inner(data);
        self.logged(Stage::Train, result)
    }

    fn predict_inner(&self, horizon_days: u32) -> Result<Prediction> {
        if horizon_days == 0 {
            return Err(Error::InvalidInput("Horizon must be at least one day".to_string()));
        }
        if self.model_state != ModelState::Trained {
            return Err(Error::NotTrained);
        }
        let raw = self.model.predict(horizon_days)?;
        Prediction::from_raw(horizon_days, raw)
    }

    /// Predict cumulative cashflow over the next `horizon_days`
    pub fn predict(&mut self, horizon_days: u32) -> Result<Prediction> {
        let result = self.predict_inner(horizon_days);
        self.logged(Stage::Predict, result)
    }

    fn insights_inner(&self) -> Result<InsightSet> {
        if self.model_state != ModelState::Trained {
            return Err(Error::NotTrained);
        }
        let insights = self.model.generate_insights()?;
        if insights.is_empty() {
            return Err(Error::Insight("Model returned no insights".to_string()));
        }
        if let Some((key, _)) = insights.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::Insight(format!("Insight `{}` is blank", key)));
        }
        Ok(insights)
    }

    /// Insights derived from the trained model, recomputed on every call
    pub fn generate_insights(&mut self) -> Result<InsightSet> {
        let result = self.insights_inner();
        self.logged(Stage::Insights, result)
    }

    async fn update_knowledge_inner(&self) -> Result<()> {
        let prediction = self.predict_inner(self.config.knowledge_horizon_days)?;
        let window = DateWindow::trailing(self.config.trailing_window_days)?;
        let history = self.fetch_inner(window).await?;

        let to_value = |value: serde_json::Result<serde_json::Value>| {
            value.map_err(|e| Error::Update(format!("Failed to serialize results: {}", e)))
        };
        let mut update = KnowledgeUpdate::new();
        update.insert(PREDICTIONS_KEY.to_string(), to_value(serde_json::to_value(prediction))?);
        update.insert(HISTORY_KEY.to_string(), to_value(serde_json::to_value(&history))?);

        self.knowledge.update(update).map_err(|e| match e {
            Error::Update(_) => e,
            other => Error::Update(other.to_string()),
        })?;

        info!(
            store = self.knowledge.name(),
            records = history.len(),
            "Knowledge base updated"
        );
        Ok(())
    }

    /// Store a fresh short-horizon prediction and the trailing history
    ///
    /// Store failures are `Error::Update`; a failing internal prediction or
    /// fetch keeps its own kind so it can still be recovered.
    pub async fn update_knowledge_base(&mut self) -> Result<()> {
        let result = self.update_knowledge_inner().await;
        self.logged(Stage::UpdateKnowledge, result)
    }

    async fn run_stages(&mut self) -> Result<AnalysisResult> {
        let data = self.fetch_trailing().await?;
        self.train_on_window(data)?;

        let mut forecasts = BTreeMap::new();
        for horizon in self.config.horizons.clone() {
            forecasts.insert(horizon, self.predict(horizon)?);
        }

        let insights = self.generate_insights()?;
        self.update_knowledge_base().await?;

        Ok(AnalysisResult {
            forecasts,
            insights,
        })
    }

    /// Run the whole pipeline once
    ///
    /// The first failing stage aborts the run and its error is returned;
    /// partial results are discarded.
    pub async fn run_analysis(&mut self) -> Result<AnalysisResult> {
        let result = self.run_stages().await;
        match result {
            Ok(ref analysis) => info!(
                horizons = ?analysis.forecasts.keys().collect::<Vec<_>>(),
                insights = analysis.insights.len(),
                "Cashflow predictive analysis completed successfully"
            ),
            Err(ref e) => error!(kind = %e.kind(), "Main analysis run failed: {}", e),
        }
        result
    }

    // ========== Recovery ==========

    async fn corrective_action(&mut self, action: RecoveryAction) -> Result<()> {
        match action {
            RecoveryAction::Reconnect => {
                tokio::time::sleep(self.config.retry.backoff).await;
                let connection = self.connection.as_mut().ok_or(Error::NotConnected)?;
                connection.reinitialize().await
            }
            RecoveryAction::RefetchAndRetrain => {
                let window = DateWindow::trailing(self.config.trailing_window_days)?;
                let data = self.fetch_inner(window).await?;
                self.train_inner(data)
            }
        }
    }

    /// Retry after a classified failure
    ///
    /// Runs the corrective action for the error's kind up to `max_retries`
    /// times. Returns once an action succeeds; the caller then re-invokes the
    /// operation that failed. When every attempt fails the last error is
    /// returned. Kinds with no corrective action are returned unchanged
    /// without any attempt.
    pub async fn recover(&mut self, error: Error) -> Result<RecoveryReport> {
        let kind = error.kind();
        self.recovery_state = RecoveryState::Idle;
        let Some(action) = RecoveryAction::for_kind(kind) else {
            if kind.is_fatal() {
                warn!(kind = %kind, "Usage error is not retryable: {}", error);
            } else {
                warn!(kind = %kind, "No corrective action for error kind: {}", error);
            }
            return Err(error);
        };

        // Both actions work through the active connection
        if self.connection.is_none() {
            warn!(action = %action, "Cannot recover without an active connection");
            return Err(Error::NotConnected);
        }

        let mut retry = RetryState::new(self.config.retry.max_retries);
        self.recovery_state = retry.state();
        info!(action = %action, kind = %kind, "Starting recovery: {}", error);

        loop {
            let attempt = retry.begin_attempt();
            self.recovery_state = retry.state();

            match self.corrective_action(action).await {
                Ok(()) => {
                    self.recovery_state = retry.succeed();
                    info!(action = %action, attempts = attempt, "Recovered");
                    return Ok(RecoveryReport {
                        action,
                        attempts: attempt,
                        transitions: retry.transitions().to_vec(),
                    });
                }
                Err(e) => {
                    let max = retry.max_retries();
                    error!(
                        action = %action,
                        kind = %e.kind(),
                        "Retrying failed operation. Attempt {}/{}: {}",
                        attempt,
                        max,
                        e
                    );
                    self.error_log
                        .record(format!("Recovery attempt {}/{} failed: {}", attempt, max, e));

                    self.recovery_state = retry.fail();
                    if let RecoveryState::Exhausted { attempts } = self.recovery_state {
                        error!(action = %action, attempts, "Recovery exhausted");
                        return Err(e);
                    }
                }
            }
        }
    }
}

//! Integration tests for cashcast-core
//!
//! These tests drive the orchestrator end to end through mock providers,
//! models and knowledge stores: connect → fetch → train → predict →
//! insights → knowledge update, plus the recovery state machine.

use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use serde_json::Value;

use cashcast_core::{
    knowledge::{HISTORY_KEY, PREDICTIONS_KEY},
    provider::sample_transactions,
    BaselineModel, Credentials, Error, ErrorKind, FileKnowledgeStore, MemoryKnowledgeStore,
    MockConnector, MockModel, MockProvider, ModelState, Orchestrator, PipelineConfig,
    ProviderKind, RecoveryAction, RecoveryState, RetryPolicy,
};

struct Harness {
    orchestrator: Orchestrator,
    provider: MockProvider,
    connector: MockConnector,
    model: MockModel,
    store: MemoryKnowledgeStore,
}

fn config_with_backoff(backoff: Duration) -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            max_retries: 3,
            backoff,
        },
        ..Default::default()
    }
}

fn harness_with(provider: MockProvider, config: PipelineConfig) -> Harness {
    let connector = MockConnector::new(provider.clone());
    let model = MockModel::new();
    let store = MemoryKnowledgeStore::new();
    let orchestrator = Orchestrator::new(
        config,
        Box::new(connector.clone()),
        Box::new(model.clone()),
        Box::new(store.clone()),
    );
    Harness {
        orchestrator,
        provider,
        connector,
        model,
        store,
    }
}

fn harness() -> Harness {
    harness_with(
        MockProvider::new(ProviderKind::Stripe),
        config_with_backoff(Duration::ZERO),
    )
}

fn connected() -> Harness {
    let mut h = harness();
    h.orchestrator
        .connect("stripe", &Credentials::new().with("key", "x"))
        .expect("connect");
    h
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// =============================================================================
// Connection
// =============================================================================

#[test]
fn test_invalid_provider_types_leave_no_connection() {
    let mut h = harness();

    for bad in ["", "paypal", "square", "stripe2", "  "] {
        let err = h.orchestrator.connect(bad, &Credentials::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidProviderType, "{bad:?}");
        assert!(h.orchestrator.connection().is_none());
    }

    assert!(h.connector.opened().is_empty());
    assert!(h.orchestrator.error_log().is_empty());
}

#[test]
fn test_invalid_type_keeps_existing_connection() {
    let mut h = connected();
    h.orchestrator
        .connect("carrier-pigeon", &Credentials::new())
        .unwrap_err();

    let connection = h.orchestrator.connection().expect("still connected");
    assert_eq!(connection.kind(), ProviderKind::Stripe);
}

#[test]
fn test_connect_is_case_insensitive() {
    let mut h = harness();
    let connection = h.orchestrator.connect("Plaid", &Credentials::new()).unwrap();
    assert_eq!(connection.kind(), ProviderKind::Plaid);
    assert_eq!(h.connector.opened(), vec![ProviderKind::Plaid]);
}

// =============================================================================
// Untrained model
// =============================================================================

#[test]
fn test_predict_and_insights_require_training() {
    let mut h = connected();

    for horizon in [1, 7, 30, 90, 365, 10_000] {
        let err = h.orchestrator.predict(horizon).unwrap_err();
        assert!(matches!(err, Error::NotTrained), "horizon {horizon}");
    }
    assert!(matches!(
        h.orchestrator.generate_insights(),
        Err(Error::NotTrained)
    ));

    // The model is never consulted before training
    assert!(h.model.predict_calls().is_empty());
    assert_eq!(h.model.insight_calls(), 0);
    assert_eq!(h.orchestrator.error_log().len(), 7);
}

#[tokio::test]
async fn test_not_trained_does_not_enter_recovery() {
    let mut h = connected();
    let err = h.orchestrator.predict(30).unwrap_err();

    let err = h.orchestrator.recover(err).await.unwrap_err();
    assert!(matches!(err, Error::NotTrained));
    assert_eq!(h.orchestrator.recovery_state(), RecoveryState::Idle);
    assert_eq!(h.provider.reinitialize_calls(), 0);
    assert!(h.model.trained_sizes().is_empty());
}

// =============================================================================
// Stage sequencing
// =============================================================================

#[tokio::test]
async fn test_stripe_window_scenario() {
    let provider = MockProvider::with_transactions(
        ProviderKind::Stripe,
        sample_transactions(date(2024, 2, 15), 90),
    );
    let mut h = harness_with(provider, config_with_backoff(Duration::ZERO));
    h.orchestrator
        .connect("stripe", &Credentials::new().with("key", "x"))
        .unwrap();

    let data = h
        .orchestrator
        .fetch_window(date(2024, 1, 1), date(2024, 1, 31))
        .await
        .unwrap();
    assert!(!data.is_empty());
    assert!(data.records().iter().all(|tx| {
        let d = tx.timestamp.date_naive();
        d >= date(2024, 1, 1) && d <= date(2024, 1, 31)
    }));

    assert_eq!(h.orchestrator.model_state(), ModelState::Untrained);
    h.orchestrator.train_on_window(data).unwrap();
    assert_eq!(h.orchestrator.model_state(), ModelState::Trained);

    let prediction = h.orchestrator.predict(30).unwrap();
    assert_eq!(prediction.horizon_days, 30);
    assert!(prediction.confidence_low <= prediction.point_estimate);
    assert!(prediction.point_estimate <= prediction.confidence_high);
    assert!(h.orchestrator.error_log().is_empty());
}

#[tokio::test]
async fn test_run_analysis_produces_all_horizons() {
    let mut h = connected();
    let result = h.orchestrator.run_analysis().await.unwrap();

    assert_eq!(result.forecasts.keys().copied().collect::<Vec<_>>(), vec![30, 90]);
    assert_eq!(result.forecasts[&30].point_estimate, 300.0);
    assert_eq!(result.insights.len(), 2);

    // Main fetch plus the history fetch for the knowledge update
    let fetches = h.provider.fetch_calls();
    assert_eq!(fetches.len(), 2);
    let today = Utc::now().date_naive();
    assert!(fetches.iter().all(|w| w.end == today && w.days() == 365));

    assert_eq!(h.model.predict_calls(), vec![30, 90, 30]);
    assert!(h.orchestrator.error_log().is_empty());
}

#[tokio::test]
async fn test_fetch_failure_stops_the_run() {
    let mut h = connected();
    h.provider
        .fail_next_fetch(Error::Connectivity("connection reset".into()));

    let err = h.orchestrator.run_analysis().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);

    assert_eq!(h.model.train_calls(), 0);
    assert!(h.model.predict_calls().is_empty());
    assert_eq!(h.model.insight_calls(), 0);
    assert!(h.store.records().is_empty());

    // One entry for the failing stage
    assert_eq!(h.orchestrator.error_log().len(), 1);
    assert!(h.orchestrator.error_log().entries()[0]
        .message
        .contains("connection reset"));
}

#[tokio::test]
async fn test_training_failure_resets_model_state() {
    let mut h = connected();
    h.orchestrator.run_analysis().await.unwrap();
    assert_eq!(h.orchestrator.model_state(), ModelState::Trained);

    h.model
        .fail_next_train(Error::DataProcessing("schema mismatch".into()));
    let err = h.orchestrator.run_analysis().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DataProcessing);
    assert_eq!(h.orchestrator.model_state(), ModelState::Untrained);
    assert!(matches!(h.orchestrator.predict(30), Err(Error::NotTrained)));
}

#[tokio::test]
async fn test_invalid_band_is_prediction_error() {
    let mut h = connected();
    h.model.return_inverted_band();

    let err = h.orchestrator.run_analysis().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Prediction);
    assert_eq!(h.model.insight_calls(), 0);
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn test_blank_insight_is_rejected() {
    let mut h = connected();
    h.model.set_insights(
        [("trend".to_string(), "   ".to_string())]
            .into_iter()
            .collect(),
    );

    let err = h.orchestrator.run_analysis().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Insight);
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn test_insights_are_idempotent() {
    let mut h = connected();
    let data = h
        .orchestrator
        .fetch_window(Utc::now().date_naive() - chrono::Duration::days(60), Utc::now().date_naive())
        .await
        .unwrap();
    h.orchestrator.train_on_window(data).unwrap();

    let first = h.orchestrator.generate_insights().unwrap();
    let second = h.orchestrator.generate_insights().unwrap();
    assert_eq!(first, second);
    assert_eq!(h.model.insight_calls(), 2);
}

// =============================================================================
// Knowledge base
// =============================================================================

#[tokio::test]
async fn test_baseline_run_persists_to_file_store() {
    let temp = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(ProviderKind::Stripe);
    let mut orchestrator = Orchestrator::new(
        config_with_backoff(Duration::ZERO),
        Box::new(MockConnector::new(provider)),
        Box::new(BaselineModel::new()),
        Box::new(FileKnowledgeStore::new(temp.path()).unwrap()),
    );
    orchestrator
        .connect("stripe", &Credentials::new().with("key", "x"))
        .unwrap();

    let result = orchestrator.run_analysis().await.unwrap();
    assert_eq!(result.forecasts.keys().copied().collect::<Vec<_>>(), vec![30, 90]);
    for prediction in result.forecasts.values() {
        assert!(prediction.confidence_low <= prediction.point_estimate);
        assert!(prediction.point_estimate <= prediction.confidence_high);
    }
    assert!(orchestrator.error_log().is_empty());

    let records = FileKnowledgeStore::new(temp.path())
        .unwrap()
        .records()
        .unwrap();
    assert_eq!(records.len(), 1);

    let prediction = &records[0].entries[PREDICTIONS_KEY];
    assert_eq!(prediction["horizon_days"], Value::from(30));
    let low = prediction["confidence_low"].as_f64().unwrap();
    let point = prediction["point_estimate"].as_f64().unwrap();
    let high = prediction["confidence_high"].as_f64().unwrap();
    assert!(low <= point && point <= high);
    assert!((point - result.forecasts[&30].point_estimate).abs() < 1e-6);
}

#[tokio::test]
async fn test_knowledge_update_contents() {
    let mut h = connected();
    h.orchestrator.run_analysis().await.unwrap();

    let record = h.store.latest().expect("one record stored");
    assert_eq!(h.store.records().len(), 1);
    assert_eq!(record.digest.len(), 64);

    let prediction = &record.entries[PREDICTIONS_KEY];
    assert_eq!(prediction["horizon_days"], Value::from(30));
    assert_eq!(prediction["point_estimate"], Value::from(300.0));

    let history = &record.entries[HISTORY_KEY];
    assert!(!history["records"].as_array().unwrap().is_empty());
    assert_eq!(
        history["window"]["end"],
        Value::from(Utc::now().date_naive().to_string())
    );
}

#[tokio::test]
async fn test_store_failure_is_update_error() {
    let mut h = connected();
    h.store.fail_updates("read-only volume");

    let err = h.orchestrator.run_analysis().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Update);
    assert_eq!(h.orchestrator.error_log().len(), 1);

    // Not a recoverable kind
    let err = h.orchestrator.recover(err).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Update);
    assert_eq!(h.provider.reinitialize_calls(), 0);
}

#[tokio::test]
async fn test_update_fetch_failure_keeps_its_kind() {
    let mut h = connected();
    let data = h
        .orchestrator
        .fetch_window(Utc::now().date_naive() - chrono::Duration::days(30), Utc::now().date_naive())
        .await
        .unwrap();
    h.orchestrator.train_on_window(data).unwrap();

    h.provider
        .fail_next_fetch(Error::Connectivity("timeout".into()));
    let err = h.orchestrator.update_knowledge_base().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert!(h.store.records().is_empty());
}

// =============================================================================
// Recovery: connectivity
// =============================================================================

#[tokio::test]
async fn test_connectivity_recovered_on_first_attempt() {
    let mut h = connected();
    let report = h
        .orchestrator
        .recover(Error::Connectivity("reset".into()))
        .await
        .unwrap();

    assert_eq!(report.action, RecoveryAction::Reconnect);
    assert_eq!(report.attempts, 1);
    assert_eq!(h.provider.reinitialize_calls(), 1);
    assert_eq!(
        h.orchestrator.recovery_state(),
        RecoveryState::Recovered { attempts: 1 }
    );
    assert_eq!(h.orchestrator.connection().unwrap().reinitializations(), 1);
    assert!(h.orchestrator.error_log().is_empty());
}

#[tokio::test]
async fn test_connectivity_recovered_after_failures() {
    let mut h = connected();
    h.provider
        .fail_next_reinitialize(Error::Connectivity("still down".into()));
    h.provider
        .fail_next_reinitialize(Error::Connectivity("still down".into()));

    let report = h
        .orchestrator
        .recover(Error::Connectivity("reset".into()))
        .await
        .unwrap();

    assert_eq!(report.attempts, 3);
    assert_eq!(h.provider.reinitialize_calls(), 3);
    assert_eq!(
        report.transitions,
        vec![
            RecoveryState::Idle,
            RecoveryState::Retrying { attempt: 1 },
            RecoveryState::Retrying { attempt: 2 },
            RecoveryState::Retrying { attempt: 3 },
            RecoveryState::Recovered { attempts: 3 },
        ]
    );
    assert_eq!(h.orchestrator.error_log().len(), 2);
}

#[tokio::test]
async fn test_persistent_connectivity_failure_exhausts() {
    let mut h = connected();
    h.provider.fail_reinitialize_always("network unreachable");

    let err = h
        .orchestrator
        .recover(Error::Connectivity("reset".into()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert_eq!(
        h.orchestrator.recovery_state(),
        RecoveryState::Exhausted { attempts: 3 }
    );
    assert_eq!(h.provider.reinitialize_calls(), 3);

    let log = h.orchestrator.error_log();
    assert_eq!(log.len(), 3);
    assert!(log.entries()[0].message.starts_with("Recovery attempt 1/3"));
    assert!(log.entries()[2].message.starts_with("Recovery attempt 3/3"));
    assert!(log
        .entries()
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_backoff_precedes_each_reinitialize() {
    let backoff = Duration::from_millis(20);
    let mut h = harness_with(
        MockProvider::new(ProviderKind::Stripe),
        config_with_backoff(backoff),
    );
    h.orchestrator.connect("stripe", &Credentials::new()).unwrap();
    h.provider.fail_reinitialize_always("down");

    let started = Instant::now();
    h.orchestrator
        .recover(Error::Connectivity("reset".into()))
        .await
        .unwrap_err();

    assert!(started.elapsed() >= backoff * 3);
}

#[tokio::test]
async fn test_recovery_then_rerun_succeeds() {
    let mut h = connected();
    h.provider
        .fail_next_fetch(Error::Connectivity("connection reset".into()));

    let err = h.orchestrator.run_analysis().await.unwrap_err();
    h.orchestrator.recover(err).await.unwrap();
    let result = h.orchestrator.run_analysis().await.unwrap();

    assert_eq!(result.forecasts.len(), 2);
    assert_eq!(h.orchestrator.error_log().len(), 1);
}

// =============================================================================
// Recovery: data processing
// =============================================================================

#[tokio::test]
async fn test_data_processing_refetches_trailing_year() {
    let mut h = connected();
    let report = h
        .orchestrator
        .recover(Error::DataProcessing("bad column".into()))
        .await
        .unwrap();

    assert_eq!(report.action, RecoveryAction::RefetchAndRetrain);
    assert_eq!(report.attempts, 1);

    let fetches = h.provider.fetch_calls();
    assert_eq!(fetches.len(), 1);
    assert_eq!(fetches[0].end, Utc::now().date_naive());
    assert_eq!(fetches[0].days(), 365);

    assert_eq!(h.model.train_calls(), 1);
    assert_eq!(h.orchestrator.model_state(), ModelState::Trained);
    assert_eq!(h.provider.reinitialize_calls(), 0);
}

#[tokio::test]
async fn test_data_processing_one_cycle_per_attempt() {
    let mut h = connected();
    h.model
        .fail_next_train(Error::DataProcessing("corrupt".into()));
    h.provider
        .fail_next_fetch(Error::Connectivity("flaky".into()));

    // Attempt 1 fails in fetch, attempt 2 in train, attempt 3 succeeds
    let report = h
        .orchestrator
        .recover(Error::DataProcessing("bad column".into()))
        .await
        .unwrap();

    assert_eq!(report.attempts, 3);
    assert_eq!(h.provider.fetch_calls().len(), 3);
    assert_eq!(h.model.train_calls(), 2);
    assert_eq!(h.orchestrator.error_log().len(), 2);
}

#[tokio::test]
async fn test_data_processing_exhausts_on_empty_history() {
    let mut h = connected();
    h.provider.set_transactions(Vec::new());

    let err = h
        .orchestrator
        .recover(Error::DataProcessing("bad column".into()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DataProcessing);
    assert_eq!(h.provider.fetch_calls().len(), 3);
    assert_eq!(h.orchestrator.error_log().len(), 3);
    assert_eq!(h.orchestrator.model_state(), ModelState::Untrained);
}

#[tokio::test]
async fn test_fatal_kinds_never_retry() {
    let mut h = connected();
    for error in [
        Error::InvalidProviderType("paypal".into()),
        Error::InvalidCredentials("missing key".into()),
        Error::NotTrained,
        Error::InvalidInput("horizon".into()),
    ] {
        let kind = error.kind();
        let err = h.orchestrator.recover(error).await.unwrap_err();
        assert_eq!(err.kind(), kind);
    }

    assert!(h.provider.fetch_calls().is_empty());
    assert_eq!(h.provider.reinitialize_calls(), 0);
    assert!(h.orchestrator.error_log().is_empty());
}

//! Test utilities for cashcast-core
//!
//! Provides a mock HTTP server speaking just enough of the Stripe and Plaid
//! transaction APIs to exercise the adapters, including pagination and
//! credential rejection.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

/// Mock provider API server for testing
pub struct MockProviderServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
struct ServerState {
    unavailable: bool,
}

impl MockProviderServer {
    /// Stripe secret key accepted by the server
    pub const STRIPE_KEY: &'static str = "sk_test_mock";
    /// Plaid secret accepted by the server
    pub const PLAID_SECRET: &'static str = "plaid_secret_mock";

    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(ServerState { unavailable: false }).await
    }

    /// Start a server that answers every request with 503
    pub async fn start_unavailable() -> Self {
        Self::start_with(ServerState { unavailable: true }).await
    }

    async fn start_with(state: ServerState) -> Self {
        let app = Router::new()
            .route("/v1/balance_transactions", get(handle_stripe))
            .route("/transactions/get", post(handle_plaid))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockProviderServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "upstream temporarily unavailable",
    )
        .into_response()
}

async fn handle_stripe(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if state.unavailable {
        return unavailable();
    }

    let expected = format!("Bearer {}", MockProviderServer::STRIPE_KEY);
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"type": "invalid_request_error", "message": "Invalid API Key"}})),
        )
            .into_response();
    }

    // 2024-01-02, 2024-01-10 and 2024-01-20 at noon UTC
    let body = match params.get("starting_after").map(String::as_str) {
        None => json!({
            "data": [
                {"id": "txn_1", "amount": 250000, "created": 1704196800, "type": "charge",
                 "reporting_category": "charge", "description": "Invoice 1001"},
                {"id": "txn_2", "amount": -3500, "created": 1704888000, "type": "charge",
                 "reporting_category": null, "description": null}
            ],
            "has_more": true
        }),
        Some("txn_2") => json!({
            "data": [
                {"id": "txn_3", "amount": -120000, "created": 1705752000, "type": "payout",
                 "reporting_category": "payout", "description": "Weekly payout"}
            ],
            "has_more": false
        }),
        Some(_) => json!({"data": [], "has_more": false}),
    };

    Json(body).into_response()
}

#[derive(Deserialize)]
struct PlaidRequest {
    secret: String,
    options: Option<PlaidOptions>,
}

#[derive(Deserialize)]
struct PlaidOptions {
    offset: Option<usize>,
}

async fn handle_plaid(State(state): State<ServerState>, Json(req): Json<PlaidRequest>) -> Response {
    if state.unavailable {
        return unavailable();
    }

    if req.secret != MockProviderServer::PLAID_SECRET {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error_type": "INVALID_INPUT",
                "error_code": "INVALID_API_KEYS",
                "error_message": "invalid client_id or secret provided"
            })),
        )
            .into_response();
    }

    let all = [
        json!({"transaction_id": "plaid_1", "amount": -1800.0, "date": "2024-01-03",
               "name": "Client payment", "personal_finance_category": {"primary": "INCOME"}}),
        json!({"transaction_id": "plaid_2", "amount": 64.2, "date": "2024-01-08",
               "name": "Office supplies", "category": ["Shops", "Office Supplies"]}),
        json!({"transaction_id": "plaid_3", "amount": 1200.0, "date": "2024-01-15",
               "name": "Rent", "personal_finance_category": {"primary": "RENT_AND_UTILITIES"}}),
    ];

    // Serve at most two per page to force pagination
    let offset = req.options.and_then(|o| o.offset).unwrap_or(0);
    let page: Vec<_> = all.iter().skip(offset).take(2).cloned().collect();

    Json(json!({
        "transactions": page,
        "total_transactions": all.len()
    }))
    .into_response()
}

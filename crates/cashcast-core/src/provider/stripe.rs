//! Stripe-like provider
//!
//! Reads `GET /v1/balance_transactions` with bearer authentication and
//! cursor pagination (`has_more` / `starting_after`). Amounts arrive in
//! minor currency units and are signed from the account's point of view.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{DateWindow, ProviderKind, Transaction};

use super::{http_client, Credentials, DataProvider};

const PAGE_SIZE: u32 = 100;

pub struct StripeProvider {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl StripeProvider {
    /// Requires an `api_key` (or `key`) credential
    pub fn new(base_url: &str, credentials: &Credentials) -> Result<Self> {
        let api_key = credentials.require(ProviderKind::Stripe, &["api_key", "key"])?;
        Ok(Self {
            http_client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn fetch_page(
        &self,
        window: DateWindow,
        starting_after: Option<&str>,
    ) -> Result<BalanceTransactionList> {
        let start = window.start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end = window
            .end
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(start);

        let mut query = vec![
            ("limit".to_string(), PAGE_SIZE.to_string()),
            ("created[gte]".to_string(), start.to_string()),
            ("created[lte]".to_string(), end.to_string()),
        ];
        if let Some(cursor) = starting_after {
            query.push(("starting_after".to_string(), cursor.to_string()));
        }

        let response = self
            .http_client
            .get(format!("{}/v1/balance_transactions", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        Ok(response.json().await?)
    }
}

fn classify_status(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::InvalidCredentials(format!("Stripe rejected the API key ({})", status))
        }
        _ => Error::Connectivity(format!("Stripe returned {}: {}", status, body)),
    }
}

#[derive(Debug, Deserialize)]
struct BalanceTransactionList {
    data: Vec<BalanceTransaction>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct BalanceTransaction {
    id: String,
    amount: i64,
    created: i64,
    #[serde(rename = "type")]
    kind: String,
    reporting_category: Option<String>,
    description: Option<String>,
}

impl BalanceTransaction {
    fn into_transaction(self) -> Result<Transaction> {
        let timestamp = DateTime::from_timestamp(self.created, 0).ok_or_else(|| {
            Error::DataProcessing(format!(
                "Balance transaction {} has invalid timestamp {}",
                self.id, self.created
            ))
        })?;

        Ok(Transaction {
            id: self.id,
            timestamp,
            amount: self.amount as f64 / 100.0,
            category: self.reporting_category.unwrap_or(self.kind),
            description: self.description,
        })
    }
}

#[async_trait]
impl DataProvider for StripeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn fetch(&self, window: DateWindow) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.fetch_page(window, cursor.as_deref()).await?;
            debug!(count = page.data.len(), has_more = page.has_more, "Stripe page");

            cursor = page.data.last().map(|tx| tx.id.clone());
            for tx in page.data {
                transactions.push(tx.into_transaction()?);
            }

            if !page.has_more {
                break;
            }
            if cursor.is_none() {
                warn!("Stripe reported more pages but returned an empty page");
                break;
            }
        }

        Ok(transactions)
    }

    async fn reinitialize(&mut self) -> Result<()> {
        self.http_client = http_client()?;
        Ok(())
    }
}

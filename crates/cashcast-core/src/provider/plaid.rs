//! Plaid-like provider
//!
//! Reads `POST /transactions/get` with offset pagination. Plaid reports
//! outflows as positive amounts, so amounts are negated on the way in.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{DateWindow, ProviderKind, Transaction};

use super::{http_client, Credentials, DataProvider};

const PAGE_SIZE: u32 = 500;

/// Error codes that mean the credentials, not the network, are at fault
const CREDENTIAL_ERRORS: &[&str] = &[
    "INVALID_API_KEYS",
    "INVALID_ACCESS_TOKEN",
    "ITEM_LOGIN_REQUIRED",
];

pub struct PlaidProvider {
    http_client: Client,
    base_url: String,
    client_id: String,
    secret: String,
    access_token: String,
}

impl PlaidProvider {
    /// Requires `client_id`, `secret` and `access_token` credentials
    pub fn new(base_url: &str, credentials: &Credentials) -> Result<Self> {
        let kind = ProviderKind::Plaid;
        Ok(Self {
            http_client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: credentials.require(kind, &["client_id"])?,
            secret: credentials.require(kind, &["secret"])?,
            access_token: credentials.require(kind, &["access_token"])?,
        })
    }

    async fn fetch_page(&self, window: DateWindow, offset: u32) -> Result<TransactionsResponse> {
        let request = TransactionsRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            access_token: &self.access_token,
            start_date: window.start,
            end_date: window.end,
            options: RequestOptions {
                count: PAGE_SIZE,
                offset,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/transactions/get", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        Ok(response.json().await?)
    }
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> Error {
    let parsed: Option<PlaidError> = serde_json::from_str(body).ok();
    match parsed {
        Some(err) if CREDENTIAL_ERRORS.contains(&err.error_code.as_str()) => {
            Error::InvalidCredentials(format!("Plaid {}: {}", err.error_code, err.error_message))
        }
        Some(err) => Error::Connectivity(format!(
            "Plaid returned {} {}: {}",
            status, err.error_code, err.error_message
        )),
        None => Error::Connectivity(format!("Plaid returned {}: {}", status, body)),
    }
}

#[derive(Serialize)]
struct TransactionsRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    count: u32,
    offset: u32,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<PlaidTransaction>,
    total_transactions: u32,
}

#[derive(Debug, Deserialize)]
struct PlaidTransaction {
    transaction_id: String,
    amount: f64,
    date: NaiveDate,
    name: Option<String>,
    personal_finance_category: Option<PersonalFinanceCategory>,
    #[serde(default)]
    category: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PersonalFinanceCategory {
    primary: String,
}

#[derive(Debug, Deserialize)]
struct PlaidError {
    error_code: String,
    #[serde(default)]
    error_message: String,
}

impl PlaidTransaction {
    fn into_transaction(self) -> Transaction {
        let category = self
            .personal_finance_category
            .map(|c| c.primary)
            .or_else(|| self.category.and_then(|c| c.into_iter().next()))
            .unwrap_or_else(|| "UNCATEGORIZED".to_string());

        Transaction {
            id: self.transaction_id,
            timestamp: self.date.and_time(NaiveTime::MIN).and_utc(),
            amount: -self.amount,
            category,
            description: self.name,
        }
    }
}

#[async_trait]
impl DataProvider for PlaidProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Plaid
    }

    async fn fetch(&self, window: DateWindow) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();

        loop {
            let page = self.fetch_page(window, transactions.len() as u32).await?;
            let received = page.transactions.len();
            debug!(count = received, total = page.total_transactions, "Plaid page");

            transactions.extend(page.transactions.into_iter().map(|t| t.into_transaction()));

            if received == 0 || transactions.len() as u32 >= page.total_transactions {
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

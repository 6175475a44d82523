//! Transaction data providers
//!
//! # Architecture
//!
//! - `DataProvider` trait: fetch a window of transactions, reinitialize in place
//! - `Connection`: the handle the orchestrator owns, bound to one provider kind
//! - `Connector` trait: builds providers from a kind and credentials
//! - Implementations: `StripeProvider`, `PlaidProvider`, `MockProvider`
//!
//! # Configuration
//!
//! Environment variables read by [`Credentials::from_env`]:
//! - `STRIPE_API_KEY`: secret key for the Stripe-like provider
//! - `PLAID_CLIENT_ID`, `PLAID_SECRET`, `PLAID_ACCESS_TOKEN`: Plaid-like provider

mod mock;
mod plaid;
mod stripe;

pub use mock::{sample_transactions, MockConnector, MockProvider};
pub use plaid::PlaidProvider;
pub use stripe::StripeProvider;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::models::{DateWindow, ProviderKind, Transaction, TransactionSet};

/// Timeout applied to every provider HTTP call
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by the adapters
pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

/// Opaque provider credentials. Keys are case-insensitive.
#[derive(Clone, Default)]
pub struct Credentials {
    values: HashMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// First non-empty value among `aliases`, or `InvalidCredentials`
    pub fn require(&self, kind: ProviderKind, aliases: &[&str]) -> Result<String> {
        aliases
            .iter()
            .find_map(|key| self.get(key))
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidCredentials(format!(
                    "{} requires `{}`",
                    kind,
                    aliases.first().copied().unwrap_or_default()
                ))
            })
    }

    /// Read credentials for `kind` from environment variables
    pub fn from_env(kind: ProviderKind) -> Self {
        let vars: &[(&str, &str)] = match kind {
            ProviderKind::Stripe => &[("api_key", "STRIPE_API_KEY")],
            ProviderKind::Plaid => &[
                ("client_id", "PLAID_CLIENT_ID"),
                ("secret", "PLAID_SECRET"),
                ("access_token", "PLAID_ACCESS_TOKEN"),
            ],
        };

        let mut credentials = Self::new();
        for (key, var) in vars {
            if let Ok(value) = std::env::var(var) {
                credentials.insert(key, value);
            }
        }
        credentials
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_map()
            .entries(keys.into_iter().map(|k| (k, "***")))
            .finish()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut credentials = Self::new();
        for (k, v) in iter {
            credentials.insert(k.as_ref(), v);
        }
        credentials
    }
}

/// Interface for transaction data sources
///
/// Transport failures are `Connectivity`, undecodable payloads are
/// `DataProcessing`, rejected credentials are `InvalidCredentials`.
#[async_trait]
pub trait DataProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Fetch all transactions dated within the inclusive window
    async fn fetch(&self, window: DateWindow) -> Result<Vec<Transaction>>;

    /// Re-establish the underlying session without replacing the provider
    async fn reinitialize(&mut self) -> Result<()>;
}

/// Builds providers for `connect`
pub trait Connector: Send + Sync {
    fn open(&self, kind: ProviderKind, credentials: &Credentials) -> Result<Box<dyn DataProvider>>;
}

/// Connector for the real HTTP APIs
#[derive(Debug, Clone)]
pub struct HttpConnector {
    stripe_base_url: String,
    plaid_base_url: String,
}

impl HttpConnector {
    pub fn new(stripe_base_url: &str, plaid_base_url: &str) -> Self {
        Self {
            stripe_base_url: stripe_base_url.to_string(),
            plaid_base_url: plaid_base_url.to_string(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.base_url(ProviderKind::Stripe),
            config.base_url(ProviderKind::Plaid),
        )
    }
}

impl Connector for HttpConnector {
    fn open(&self, kind: ProviderKind, credentials: &Credentials) -> Result<Box<dyn DataProvider>> {
        Ok(match kind {
            ProviderKind::Stripe => {
                Box::new(StripeProvider::new(&self.stripe_base_url, credentials)?)
            }
            ProviderKind::Plaid => Box::new(PlaidProvider::new(&self.plaid_base_url, credentials)?),
        })
    }
}

/// Active provider session owned by the orchestrator
pub struct Connection {
    provider: Box<dyn DataProvider>,
    established_at: DateTime<Utc>,
    reinitializations: u32,
}

impl Connection {
    pub fn new(provider: Box<dyn DataProvider>) -> Self {
        Self {
            provider,
            established_at: Utc::now(),
            reinitializations: 0,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Number of successful in-place reinitializations
    pub fn reinitializations(&self) -> u32 {
        self.reinitializations
    }

    pub async fn fetch(&self, window: DateWindow) -> Result<TransactionSet> {
        debug!(provider = %self.kind(), window = %window, "Fetching transactions");
        let records = self.provider.fetch(window).await?;
        Ok(TransactionSet::new(window, records))
    }

    pub async fn reinitialize(&mut self) -> Result<()> {
        self.provider.reinitialize().await?;
        self.reinitializations += 1;
        self.established_at = Utc::now();
        info!(
            provider = %self.kind(),
            count = self.reinitializations,
            "Provider connection reinitialized"
        );
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.kind())
            .field("established_at", &self.established_at)
            .field("reinitializations", &self.reinitializations)
            .finish()
    }
}

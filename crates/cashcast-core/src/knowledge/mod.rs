//! Knowledge store destinations for pipeline results
//!
//! - `KnowledgeStore` trait: accepts incremental updates of named result sets
//! - `MemoryKnowledgeStore`: in-process, inspectable
//! - `FileKnowledgeStore`: one JSON line per update in a local directory

mod file;
mod memory;

pub use file::FileKnowledgeStore;
pub use memory::MemoryKnowledgeStore;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Named result blobs for one update
pub type KnowledgeUpdate = BTreeMap<String, serde_json::Value>;

/// Key for the latest short-horizon prediction
pub const PREDICTIONS_KEY: &str = "cashflow_predictions";
/// Key for the trailing transaction history
pub const HISTORY_KEY: &str = "historical_cashflow_data";

/// A stored update with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub recorded_at: DateTime<Utc>,
    /// SHA-256 of the serialized entries
    pub digest: String,
    pub entries: KnowledgeUpdate,
}

impl KnowledgeRecord {
    pub fn new(entries: KnowledgeUpdate) -> Result<Self> {
        let bytes = serde_json::to_vec(&entries)?;
        Ok(Self {
            recorded_at: Utc::now(),
            digest: hex::encode(Sha256::digest(&bytes)),
            entries,
        })
    }
}

/// Trait for knowledge store destinations
///
/// Implementations report failures as `Error::Update`.
pub trait KnowledgeStore: Send + Sync {
    /// Human-readable name for this store
    fn name(&self) -> &str;

    /// Merge a set of named results into the store
    fn update(&self, update: KnowledgeUpdate) -> Result<()>;
}

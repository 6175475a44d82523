//! In-memory knowledge store

use std::sync::{Arc, Mutex, MutexGuard};

use super::{KnowledgeRecord, KnowledgeStore, KnowledgeUpdate};
use crate::error::{Error, Result};

#[derive(Default)]
struct MemoryState {
    records: Vec<KnowledgeRecord>,
    failure: Option<String>,
}

/// Knowledge store kept in process memory
///
/// Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryKnowledgeStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn records(&self) -> Vec<KnowledgeRecord> {
        self.state().records.clone()
    }

    pub fn latest(&self) -> Option<KnowledgeRecord> {
        self.state().records.last().cloned()
    }

    /// Reject every following update with `message`
    pub fn fail_updates(&self, message: &str) {
        self.state().failure = Some(message.to_string());
    }
}

impl KnowledgeStore for MemoryKnowledgeStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn update(&self, update: KnowledgeUpdate) -> Result<()> {
        let mut state = self.state();
        if let Some(ref message) = state.failure {
            return Err(Error::Update(message.clone()));
        }
        state.records.push(KnowledgeRecord::new(update)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_updates_are_shared_between_clones() {
        let store = MemoryKnowledgeStore::new();
        let handle = store.clone();

        let mut update = KnowledgeUpdate::new();
        update.insert("k".to_string(), json!(1));
        store.update(update).unwrap();

        assert_eq!(handle.records().len(), 1);
        assert_eq!(handle.latest().unwrap().entries["k"], json!(1));
    }

    #[test]
    fn test_failing_store() {
        let store = MemoryKnowledgeStore::new();
        store.fail_updates("read-only");
        let err = store.update(KnowledgeUpdate::new()).unwrap_err();
        assert!(matches!(err, Error::Update(_)));
        assert!(store.records().is_empty());
    }
}

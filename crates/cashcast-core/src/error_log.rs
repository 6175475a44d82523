//! Append-only record of pipeline failures
//!
//! Owned by one orchestrator instance. Entries are never removed; callers
//! that need to keep them past the orchestrator's lifetime take a snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Vec<ErrorLogEntry>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time
    pub fn record(&mut self, message: impl Into<String>) {
        self.entries.push(ErrorLogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub fn record_error(&mut self, error: &Error) {
        self.record(error.to_string());
    }

    pub fn entries(&self) -> &[ErrorLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ErrorLogEntry> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_in_order() {
        let mut log = ErrorLog::new();
        assert!(log.is_empty());

        log.record("first");
        log.record_error(&Error::Connectivity("reset by peer".into()));

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].message, "first");
        assert_eq!(
            log.last().unwrap().message,
            "Connectivity error: reset by peer"
        );
        assert!(log.entries()[0].timestamp <= log.entries()[1].timestamp);
    }
}

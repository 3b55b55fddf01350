//! Durable storage of terminal outcomes.
//!
//! The relay only needs to hand a finished [`TerminalRecord`] to somewhere that
//! keeps it. Production deployments back [`RecordStore`] with a database;
//! [`MemoryRecordStore`] serves the demo binary and tests.

use crate::error::RelayError;
use crate::model::TerminalRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn persist(&self, record: TerminalRecord) -> Result<(), RelayError>;
}

/// Records grouped by session token.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<HashMap<String, Vec<TerminalRecord>>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records for one session, oldest first.
    pub fn records_for(&self, session_token: &str) -> Vec<TerminalRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_token)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn persist(&self, record: TerminalRecord) -> Result<(), RelayError> {
        let session = record.session_token().to_string();
        debug!(%session, request = %record.request_token(), "Persisting terminal record");
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session)
            .or_default()
            .push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AsyncResult;

    #[tokio::test]
    async fn test_groups_by_session() {
        let store = MemoryRecordStore::new();
        let declined = AsyncResult::declined("r-1", "age");
        store
            .persist(TerminalRecord::from_result("s-1", "credit", &declined))
            .await
            .unwrap();
        store
            .persist(TerminalRecord::from_result("s-2", "debit", &declined))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        let records = store.records_for("s-1");
        assert_eq!(records.len(), 1);
        assert!(matches!(
            &records[0],
            TerminalRecord::Declined { card_type, reason, .. } if card_type == "credit" && reason == "age"
        ));
        assert!(store.records_for("s-3").is_empty());
    }
}

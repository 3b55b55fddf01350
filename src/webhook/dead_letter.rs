use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// A webhook that was not delivered. Kept for inspection only, never replayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetter {
    pub event_id: String,
    pub callback_url: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Bounded in-memory log of failed deliveries. The oldest entry is evicted
/// once `capacity` is reached.
#[derive(Clone)]
pub struct DeadLetterLog {
    entries: Arc<Mutex<VecDeque<DeadLetter>>>,
    capacity: usize,
}

impl DeadLetterLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn record(&self, letter: DeadLetter) {
        warn!(
            event_id = %letter.event_id,
            callback_url = %letter.callback_url,
            reason = %letter.reason,
            "Webhook not delivered"
        );
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(letter);
    }

    /// Snapshot, oldest first.
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(id: &str) -> DeadLetter {
        DeadLetter {
            event_id: id.into(),
            callback_url: "https://acme.example/cb".into(),
            reason: "status 500".into(),
            failed_at: Utc::now(),
        }
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let log = DeadLetterLog::new(2);
        log.record(letter("a"));
        log.record(letter("b"));
        log.record(letter("c"));

        let ids: Vec<String> = log.entries().into_iter().map(|l| l.event_id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_zero_capacity_only_logs() {
        let log = DeadLetterLog::new(0);
        log.record(letter("a"));
        assert!(log.is_empty());
    }
}

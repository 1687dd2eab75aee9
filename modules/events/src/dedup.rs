// ProcessedEventStore port - idempotency keys for inbound events

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DedupError;

/// Idempotency store for inbound event handling.
///
/// Keys are scoped per channel so redeliveries of the same event id on the
/// same channel are detected while the set stays small. `mark_processed`
/// must be atomic per key (conditional insert).
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Records the key and returns `true` when this is the first time it
    /// has been seen, `false` on a duplicate.
    async fn mark_processed(&self, channel: &str, event_id: &str) -> Result<bool, DedupError>;

    /// Returns whether the key has already been recorded.
    async fn is_processed(&self, channel: &str, event_id: &str) -> Result<bool, DedupError>;
}

/// In-memory processed-event store for tests and single-process runs.
#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    seen: Mutex<HashSet<(String, String)>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn mark_processed(&self, channel: &str, event_id: &str) -> Result<bool, DedupError> {
        let mut seen = self.seen.lock().expect("processed-event set poisoned");
        Ok(seen.insert((channel.to_string(), event_id.to_string())))
    }

    async fn is_processed(&self, channel: &str, event_id: &str) -> Result<bool, DedupError> {
        let seen = self.seen.lock().expect("processed-event set poisoned");
        Ok(seen.contains(&(channel.to_string(), event_id.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_mark_wins_second_is_duplicate() {
        let store = InMemoryProcessedEventStore::new();

        assert!(store.mark_processed("order-created", "evt-1").await.unwrap());
        assert!(!store.mark_processed("order-created", "evt-1").await.unwrap());
        assert!(store.is_processed("order-created", "evt-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_dedup_is_scoped_per_channel() {
        let store = InMemoryProcessedEventStore::new();

        assert!(store.mark_processed("order-created", "evt-1").await.unwrap());
        assert!(!store.is_processed("order-cancelled", "evt-1").await.unwrap());
        assert!(store.mark_processed("order-cancelled", "evt-1").await.unwrap());
    }
}

// InMemoryEventBus - recording publisher for tests and local wiring

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::envelope::EventEnvelope;
use crate::error::PublishError;
use crate::publisher::EventPublisher;

/// Publisher that appends every envelope to an in-process log.
///
/// Tests read the log back through [`InMemoryEventBus::published`]; a
/// bounded number of injected transient failures can be queued with
/// [`InMemoryEventBus::fail_next`] to exercise retry paths.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<EventEnvelope>>,
    transient_failures: Mutex<u32>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far, in publish order.
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.events.lock().expect("event log poisoned").clone()
    }

    /// Envelopes of one event type, in publish order.
    pub fn published_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Makes the next `n` publish calls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        *self.transient_failures.lock().expect("failure counter poisoned") = n;
    }

    pub fn clear(&self) {
        self.events.lock().expect("event log poisoned").clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: &EventEnvelope) -> Result<(), PublishError> {
        {
            let mut failures = self.transient_failures.lock().expect("failure counter poisoned");
            if *failures > 0 {
                *failures -= 1;
                return Err(PublishError::Transient("injected failure".to_string()));
            }
        }

        debug!(event_type = %event.event_type, aggregate_id = %event.aggregate_id, "event published");
        self.events.lock().expect("event log poisoned").push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn envelope(event_type: &str, version: u64) -> EventEnvelope {
        EventEnvelope::new(event_type, "p-1", version, Utc::now(), None, json!({}))
    }

    #[tokio::test]
    async fn test_publish_records_in_order() {
        let bus = InMemoryEventBus::new();
        bus.publish(&envelope("StockReserved", 1)).await.unwrap();
        bus.publish(&envelope("LowStockAlert", 2)).await.unwrap();

        let published = bus.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].event_type, "StockReserved");
        assert_eq!(published[1].event_type, "LowStockAlert");
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient_and_bounded() {
        let bus = InMemoryEventBus::new();
        bus.fail_next(1);

        let err = bus.publish(&envelope("StockReserved", 1)).await.unwrap_err();
        assert!(err.is_transient());
        bus.publish(&envelope("StockReserved", 1)).await.unwrap();
        assert_eq!(bus.published().len(), 1);
    }
}

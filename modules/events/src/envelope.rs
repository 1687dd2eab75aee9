// EventEnvelope - wire format for every outbound integration event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::{NoContext, Timestamp, Uuid};

/// Envelope carried by every outbound integration event.
///
/// The payload is a type-specific JSON object; the envelope fields are
/// uniform across event types. `version` is a per-aggregate sequence:
/// consumers can rely on it being strictly increasing for a given
/// `aggregate_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: String,
    pub version: u64,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wraps a payload in a new envelope with a fresh v7 event id.
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        version: u64,
        occurred_at: DateTime<Utc>,
        correlation_id: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v7(Timestamp::now(NoContext)),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            version,
            occurred_at,
            correlation_id,
            payload,
        }
    }
}

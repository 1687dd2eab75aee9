// EventPublisher port - outbound integration event emission

use async_trait::async_trait;

use crate::envelope::EventEnvelope;
use crate::error::PublishError;

/// Outbound event emission port.
///
/// Bindings guarantee at-least-once delivery and preserve publish order
/// per `aggregate_id` (events for the same aggregate are keyed so the
/// transport keeps them on one partition).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &EventEnvelope) -> Result<(), PublishError>;
}

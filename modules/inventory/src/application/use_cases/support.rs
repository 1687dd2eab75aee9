// Shared helpers: post-save event publishing and conflict backoff

use std::time::Duration;

use events::{EventEnvelope, EventPublisher, PublishError};
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::config::RetrySettings;
use crate::domain::events::RecordedStockEvent;

const PUBLISH_ATTEMPTS: u32 = 3;
const PUBLISH_BACKOFF: Duration = Duration::from_millis(50);

/// Publishes drained events in order, after the aggregate was saved.
///
/// Transient failures are retried a few times. A persistently failing
/// event is error-logged and dropped: the save is already durable, and
/// replaying the aggregate's stream is the recovery path.
pub(crate) async fn publish_events<P>(publisher: &P, events: Vec<RecordedStockEvent>)
where
    P: EventPublisher + ?Sized,
{
    for recorded in events {
        match recorded.to_envelope() {
            Ok(envelope) => publish_one(publisher, &envelope).await,
            Err(err) => error!(error = %err, "failed to encode domain event"),
        }
    }
}

async fn publish_one<P>(publisher: &P, envelope: &EventEnvelope)
where
    P: EventPublisher + ?Sized,
{
    for attempt in 1..=PUBLISH_ATTEMPTS {
        match publisher.publish(envelope).await {
            Ok(()) => return,
            Err(PublishError::Transient(reason)) if attempt < PUBLISH_ATTEMPTS => {
                debug!(
                    event_type = %envelope.event_type,
                    attempt,
                    reason,
                    "transient publish failure, retrying"
                );
                sleep(PUBLISH_BACKOFF * attempt).await;
            }
            Err(err) => {
                error!(
                    event_type = %envelope.event_type,
                    aggregate_id = %envelope.aggregate_id,
                    version = envelope.version,
                    error = %err,
                    "giving up on event publish"
                );
                return;
            }
        }
    }
}

/// Sleeps before the next optimistic-conflict retry: exponential in the
/// attempt number with up to 50% jitter.
pub(crate) async fn conflict_backoff(retry: &RetrySettings, attempt: u32) {
    let exponent = attempt.saturating_sub(1).min(8);
    let base = retry.backoff_base.saturating_mul(1u32 << exponent);
    let jitter_ms = rand::thread_rng().gen_range(0..=(base.as_millis() as u64 / 2).max(1));
    sleep(base + Duration::from_millis(jitter_ms)).await;
}

// Kafka order consumer - drives the inbound handlers with DLQ diversion

use std::sync::Arc;
use std::time::Duration;

use events::{
    EventPublisher, OrderCancelledEvent, OrderCreatedEvent, ProcessedEventStore, PublishError,
    ORDER_CANCELLED_CHANNEL, ORDER_CREATED_CHANNEL,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Header, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::Offset;
use tracing::{debug, error, info, warn};

use crate::application::event_handlers::{
    InboundOutcome, OrderCancelledHandler, OrderCreatedHandler,
};
use crate::application::ports::LockManager;
use crate::domain::repositories::ProductRepository;
use crate::InventoryError;

const DLQ_SUFFIX: &str = ".dlq";
const RETRY_BACKOFF: Duration = Duration::from_millis(100);
const DLQ_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumes the order channels and dispatches to the inbound handlers.
///
/// Offsets are committed only after a message is fully handled or
/// diverted, giving at-least-once semantics. Retriable failures are
/// retried in place up to the delivery budget, then the partition is
/// rewound so the message is delivered again later. Non-retriable
/// failures (poison messages) go straight to `<channel>.dlq` with the
/// error reason attached, and the offset is committed past them.
pub struct KafkaOrderConsumer<R, L, P, S>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
    S: ProcessedEventStore,
{
    consumer: StreamConsumer,
    dlq_producer: FutureProducer,
    order_created: Arc<OrderCreatedHandler<R, L, P, S>>,
    order_cancelled: Arc<OrderCancelledHandler<R, L, P>>,
    max_deliveries: u32,
}

impl<R, L, P, S> KafkaOrderConsumer<R, L, P, S>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
    S: ProcessedEventStore,
{
    pub fn new(
        brokers: &str,
        group_id: &str,
        order_created: Arc<OrderCreatedHandler<R, L, P, S>>,
        order_cancelled: Arc<OrderCancelledHandler<R, L, P>>,
        max_deliveries: u32,
    ) -> Result<Self, InventoryError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| {
                InventoryError::EventPublish(PublishError::Fatal(format!(
                    "failed to create consumer: {e}"
                )))
            })?;

        consumer
            .subscribe(&[ORDER_CREATED_CHANNEL, ORDER_CANCELLED_CHANNEL])
            .map_err(|e| {
                InventoryError::EventPublish(PublishError::Fatal(format!(
                    "failed to subscribe: {e}"
                )))
            })?;

        let dlq_producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| {
                InventoryError::EventPublish(PublishError::Fatal(format!(
                    "failed to create DLQ producer: {e}"
                )))
            })?;

        info!(group_id, "order consumer subscribed");
        Ok(Self {
            consumer,
            dlq_producer,
            order_created,
            order_cancelled,
            max_deliveries: max_deliveries.max(1),
        })
    }

    /// Runs the consume loop until the task is aborted.
    pub async fn run(&self) {
        loop {
            match self.consumer.recv().await {
                Ok(message) => self.handle_message(&message).await,
                Err(err) => {
                    error!(error = %err, "consumer receive failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn handle_message(&self, message: &BorrowedMessage<'_>) {
        let channel = message.topic();
        let Some(payload) = message.payload() else {
            warn!(channel, "discarding message without payload");
            self.commit(message);
            return;
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.dispatch(channel, payload).await {
                Ok(outcome) => {
                    debug!(channel, ?outcome, "inbound event handled");
                    break;
                }
                Err(err) if err.is_retriable() => {
                    if attempt < self.max_deliveries {
                        warn!(
                            channel,
                            attempt,
                            error = %err,
                            "retriable failure handling inbound event"
                        );
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                        continue;
                    }
                    // Leave the offset uncommitted and rewind: the message
                    // is redelivered once the infrastructure recovers.
                    warn!(
                        channel,
                        attempt,
                        error = %err,
                        "retries exhausted, leaving message for redelivery"
                    );
                    self.rewind(message);
                    return;
                }
                Err(err) => {
                    self.divert_to_dlq(channel, message, &err, attempt).await;
                    break;
                }
            }
        }

        self.commit(message);
    }

    fn rewind(&self, message: &BorrowedMessage<'_>) {
        if let Err(err) = self.consumer.seek(
            message.topic(),
            message.partition(),
            Offset::Offset(message.offset()),
            Duration::from_secs(1),
        ) {
            warn!(error = %err, "failed to rewind partition for redelivery");
        }
    }

    async fn dispatch(
        &self,
        channel: &str,
        payload: &[u8],
    ) -> Result<InboundOutcome, InventoryError> {
        match channel {
            ORDER_CREATED_CHANNEL => {
                let event: OrderCreatedEvent = serde_json::from_slice(payload)?;
                self.order_created.handle(&event).await
            }
            ORDER_CANCELLED_CHANNEL => {
                let event: OrderCancelledEvent = serde_json::from_slice(payload)?;
                self.order_cancelled.handle(&event).await
            }
            other => {
                warn!(channel = other, "message on unexpected channel ignored");
                Ok(InboundOutcome::Rejected)
            }
        }
    }

    async fn divert_to_dlq(
        &self,
        channel: &str,
        message: &BorrowedMessage<'_>,
        err: &InventoryError,
        attempts: u32,
    ) {
        let dlq_topic = format!("{channel}{DLQ_SUFFIX}");
        let reason = err.to_string();
        let attempts_text = attempts.to_string();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "x-dlq-source-channel",
                value: Some(channel),
            })
            .insert(Header {
                key: "x-dlq-error",
                value: Some(reason.as_str()),
            })
            .insert(Header {
                key: "x-dlq-attempts",
                value: Some(attempts_text.as_str()),
            });

        let payload = message.payload().unwrap_or_default();
        let mut record = FutureRecord::to(&dlq_topic).payload(payload).headers(headers);
        if let Some(key) = message.key() {
            record = record.key(key);
        }

        error!(
            channel,
            dlq_topic = %dlq_topic,
            attempts,
            error = %reason,
            "diverting poison message to dead-letter channel"
        );
        if let Err((kafka_error, _)) = self
            .dlq_producer
            .send(record, Timeout::After(DLQ_SEND_TIMEOUT))
            .await
        {
            // Without the DLQ write the offset still commits; losing the
            // message is preferable to wedging the partition.
            error!(
                channel,
                error = %kafka_error,
                "failed to write dead-letter message"
            );
        }
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(err) = self.consumer.commit_message(message, CommitMode::Async) {
            warn!(error = %err, "failed to commit consumer offset");
        }
    }
}

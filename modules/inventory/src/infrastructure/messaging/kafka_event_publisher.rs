// Kafka EventPublisher - outbound integration events keyed by aggregate

use std::time::Duration;

use async_trait::async_trait;
use events::{EventEnvelope, EventPublisher, PublishError};
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use tracing::debug;

/// Publishes envelopes to a single topic, keyed by `aggregate_id` so all
/// events of one product land on one partition in publish order.
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaEventPublisher {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| PublishError::Fatal(format!("failed to create producer: {e}")))?;

        Ok(Self {
            producer,
            topic: topic.into(),
            send_timeout: Duration::from_secs(5),
        })
    }

    fn classify(error: KafkaError) -> PublishError {
        match error {
            KafkaError::MessageProduction(
                RDKafkaErrorCode::MessageSizeTooLarge
                | RDKafkaErrorCode::InvalidMessage
                | RDKafkaErrorCode::UnknownTopic
                | RDKafkaErrorCode::UnknownTopicOrPartition,
            ) => PublishError::Fatal(error.to_string()),
            other => PublishError::Transient(other.to_string()),
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &EventEnvelope) -> Result<(), PublishError> {
        let payload =
            serde_json::to_vec(event).map_err(|e| PublishError::Fatal(e.to_string()))?;
        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(event.aggregate_id.as_bytes());

        match self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    topic = %self.topic,
                    partition,
                    offset,
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    "event published"
                );
                Ok(())
            }
            Err((kafka_error, _)) => Err(Self::classify(kafka_error)),
        }
    }
}

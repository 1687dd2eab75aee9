// Kafka bindings for outbound publishing and inbound consumption

mod kafka_event_publisher;
mod kafka_order_consumer;

pub use kafka_event_publisher::KafkaEventPublisher;
pub use kafka_order_consumer::KafkaOrderConsumer;

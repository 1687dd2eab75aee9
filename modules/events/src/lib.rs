// Events module - integration event contracts shared between services
//
// Holds the outbound event envelope, the inbound order event schemas,
// and the ports every transport binding implements:
// - EventPublisher: at-least-once outbound emission
// - ProcessedEventStore: idempotency keys for redelivered inbound events
//
// In-memory implementations of both ports are provided for tests and
// local wiring.

mod dedup;
mod envelope;
mod error;
mod in_memory;
mod orders;
mod publisher;

pub use dedup::{InMemoryProcessedEventStore, ProcessedEventStore};
pub use envelope::EventEnvelope;
pub use error::{DedupError, PublishError};
pub use in_memory::InMemoryEventBus;
pub use orders::{
    OrderCancelledEvent, OrderCreatedEvent, OrderItem, ORDER_CANCELLED_CHANNEL,
    ORDER_CREATED_CHANNEL,
};
pub use publisher::EventPublisher;

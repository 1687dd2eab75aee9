// Inbound event handlers - consume the order service's events

mod order_cancelled_handler;
mod order_created_handler;

pub use order_cancelled_handler::OrderCancelledHandler;
pub use order_created_handler::OrderCreatedHandler;

/// What handling an inbound event concluded.
///
/// Every variant acknowledges the message; retriable infrastructure
/// failures surface as errors instead so the transport redelivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The event was handled and its effects committed.
    Processed,
    /// The event was handled but the domain rejected it; the rejection
    /// has already been published outbound.
    Rejected,
    /// The event was seen before and skipped.
    Duplicate,
}

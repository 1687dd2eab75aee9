// Inbound order event schemas consumed from the order service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel carrying [`OrderCreatedEvent`].
pub const ORDER_CREATED_CHANNEL: &str = "order-created";

/// Channel carrying [`OrderCancelledEvent`].
pub const ORDER_CANCELLED_CHANNEL: &str = "order-cancelled";

/// One line of an order: a product and the quantity ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Emitted by the order service when a new order is placed.
///
/// Delivery is at-least-once; `event_id` is the idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    pub event_id: String,
    pub event_type: String,
    pub order_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub timestamp: DateTime<Utc>,
}

/// Emitted by the order service when an order is cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledEvent {
    pub event_id: String,
    pub event_type: String,
    pub order_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_created_parses_wire_json() {
        let raw = r#"{
            "eventId": "evt-1",
            "eventType": "OrderCreated",
            "orderId": "ORD-42",
            "customerId": "CUST-7",
            "items": [{"productId": "018f0000-0000-7000-8000-000000000001", "quantity": 3}],
            "timestamp": "2025-06-01T12:00:00Z"
        }"#;

        let event: OrderCreatedEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_id, "evt-1");
        assert_eq!(event.order_id, "ORD-42");
        assert_eq!(event.items.len(), 1);
        assert_eq!(event.items[0].quantity, 3);
    }

    #[test]
    fn test_order_cancelled_reason_is_optional() {
        let raw = r#"{
            "eventId": "evt-2",
            "eventType": "OrderCancelled",
            "orderId": "ORD-42",
            "timestamp": "2025-06-01T12:05:00Z"
        }"#;

        let event: OrderCancelledEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.order_id, "ORD-42");
        assert!(event.reason.is_none());
    }
}

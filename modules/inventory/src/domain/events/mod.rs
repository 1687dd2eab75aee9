// Domain events recorded by the Product aggregate

use chrono::{DateTime, Utc};
use events::EventEnvelope;
use serde::Serialize;

use crate::domain::value_objects::{
    InsufficientReason, ProductId, ReleaseReason, ReservationId, StockQuantity,
};
use crate::InventoryError;

/// Everything the inventory core tells the outside world.
///
/// The variants serialize to the type-specific payload object of the
/// outbound envelope; the event name travels in the envelope's
/// `eventType` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum StockEvent {
    StockReserved {
        product_id: ProductId,
        reservation_id: ReservationId,
        order_id: String,
        quantity: StockQuantity,
        available_after: StockQuantity,
        expires_at: DateTime<Utc>,
    },
    StockDeducted {
        product_id: ProductId,
        reservation_id: ReservationId,
        order_id: String,
        quantity: StockQuantity,
        total_after: StockQuantity,
    },
    StockReleased {
        product_id: ProductId,
        reservation_id: ReservationId,
        order_id: String,
        quantity: StockQuantity,
        available_after: StockQuantity,
        reason: ReleaseReason,
    },
    StockAdjusted {
        product_id: ProductId,
        delta: i64,
        reason: String,
        new_total: StockQuantity,
    },
    InsufficientStock {
        product_id: ProductId,
        order_id: String,
        requested: StockQuantity,
        available: StockQuantity,
        reason: InsufficientReason,
    },
    LowStockAlert {
        product_id: ProductId,
        available: StockQuantity,
        threshold: StockQuantity,
    },
    ProductStatusChanged {
        product_id: ProductId,
        active: bool,
    },
}

impl StockEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockReserved { .. } => "StockReserved",
            StockEvent::StockDeducted { .. } => "StockDeducted",
            StockEvent::StockReleased { .. } => "StockReleased",
            StockEvent::StockAdjusted { .. } => "StockAdjusted",
            StockEvent::InsufficientStock { .. } => "InsufficientStock",
            StockEvent::LowStockAlert { .. } => "LowStockAlert",
            StockEvent::ProductStatusChanged { .. } => "ProductStatusChanged",
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            StockEvent::StockReserved { product_id, .. }
            | StockEvent::StockDeducted { product_id, .. }
            | StockEvent::StockReleased { product_id, .. }
            | StockEvent::StockAdjusted { product_id, .. }
            | StockEvent::InsufficientStock { product_id, .. }
            | StockEvent::LowStockAlert { product_id, .. }
            | StockEvent::ProductStatusChanged { product_id, .. } => *product_id,
        }
    }

    /// The originating order id, when the event is tied to one.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            StockEvent::StockReserved { order_id, .. }
            | StockEvent::StockDeducted { order_id, .. }
            | StockEvent::StockReleased { order_id, .. }
            | StockEvent::InsufficientStock { order_id, .. } => Some(order_id),
            StockEvent::StockAdjusted { .. }
            | StockEvent::LowStockAlert { .. }
            | StockEvent::ProductStatusChanged { .. } => None,
        }
    }
}

/// A domain event with its position in the aggregate's event sequence.
///
/// `seq` becomes the envelope version: strictly increasing per product,
/// even when one mutation records several events.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStockEvent {
    pub seq: u64,
    pub occurred_at: DateTime<Utc>,
    pub event: StockEvent,
}

impl RecordedStockEvent {
    pub fn to_envelope(&self) -> Result<EventEnvelope, InventoryError> {
        Ok(EventEnvelope::new(
            self.event.event_type(),
            self.event.product_id().to_string(),
            self.seq,
            self.occurred_at,
            self.event.correlation_id().map(str::to_string),
            serde_json::to_value(&self.event)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_is_camel_case() {
        let event = StockEvent::StockReserved {
            product_id: ProductId::new(),
            reservation_id: ReservationId::new(),
            order_id: "ORD-1".to_string(),
            quantity: StockQuantity::of(3),
            available_after: StockQuantity::of(7),
            expires_at: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("productId").is_some());
        assert!(value.get("reservationId").is_some());
        assert_eq!(value["quantity"], json!(3));
        assert_eq!(value["availableAfter"], json!(7));
        assert!(value.get("expiresAt").is_some());
    }

    #[test]
    fn test_envelope_carries_type_aggregate_and_correlation() {
        let product_id = ProductId::new();
        let recorded = RecordedStockEvent {
            seq: 5,
            occurred_at: Utc::now(),
            event: StockEvent::StockReleased {
                product_id,
                reservation_id: ReservationId::new(),
                order_id: "ORD-9".to_string(),
                quantity: StockQuantity::of(2),
                available_after: StockQuantity::of(12),
                reason: ReleaseReason::Expired,
            },
        };

        let envelope = recorded.to_envelope().unwrap();
        assert_eq!(envelope.event_type, "StockReleased");
        assert_eq!(envelope.aggregate_id, product_id.to_string());
        assert_eq!(envelope.version, 5);
        assert_eq!(envelope.correlation_id.as_deref(), Some("ORD-9"));
        assert_eq!(envelope.payload["reason"], json!("EXPIRED"));
    }

    #[test]
    fn test_adjustment_has_no_correlation() {
        let event = StockEvent::StockAdjusted {
            product_id: ProductId::new(),
            delta: -4,
            reason: "shrinkage".to_string(),
            new_total: StockQuantity::of(6),
        };
        assert!(event.correlation_id().is_none());
        assert_eq!(event.event_type(), "StockAdjusted");
    }
}

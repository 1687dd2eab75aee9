// Reservation entity - a time-bounded hold on stock for one order

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ReservationId, StockQuantity};
use crate::InventoryError;

/// A hold on `quantity` units of a product's stock on behalf of an order.
///
/// A reservation ends in exactly one of three ways: deducted (consumed),
/// released explicitly, or released by the expiry sweeper. All three remove
/// it from its Stock; there is no status field to keep in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    quantity: StockQuantity,
    order_id: String,
    reserved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Reservation {
    /// Creates a new reservation expiring `ttl` after `reserved_at`.
    pub fn new(
        id: ReservationId,
        quantity: StockQuantity,
        order_id: impl Into<String>,
        reserved_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, InventoryError> {
        if quantity.is_zero() {
            return Err(InventoryError::EmptyReservation);
        }
        if ttl <= Duration::zero() {
            return Err(InventoryError::InvalidTtl);
        }

        Ok(Self {
            id,
            quantity,
            order_id: order_id.into(),
            reserved_at,
            expires_at: reserved_at + ttl,
        })
    }

    /// Reconstitutes a reservation from persistence.
    pub fn reconstitute(
        id: ReservationId,
        quantity: StockQuantity,
        order_id: String,
        reserved_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            quantity,
            order_id,
            reserved_at,
            expires_at,
        }
    }

    /// The expiry boundary is inclusive: a reservation is expired at
    /// exactly `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn quantity(&self) -> StockQuantity {
        self.quantity
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn reserved_at(&self) -> DateTime<Utc> {
        self.reserved_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_expiry_from_ttl() {
        let now = Utc::now();
        let reservation = Reservation::new(
            ReservationId::new(),
            StockQuantity::of(3),
            "ORD-1",
            now,
            Duration::minutes(30),
        )
        .unwrap();

        assert_eq!(reservation.expires_at(), now + Duration::minutes(30));
        assert!(reservation.reserved_at() < reservation.expires_at());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = Reservation::new(
            ReservationId::new(),
            StockQuantity::ZERO,
            "ORD-1",
            Utc::now(),
            Duration::minutes(30),
        );
        assert!(matches!(result, Err(InventoryError::EmptyReservation)));
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let result = Reservation::new(
            ReservationId::new(),
            StockQuantity::of(1),
            "ORD-1",
            Utc::now(),
            Duration::zero(),
        );
        assert!(matches!(result, Err(InventoryError::InvalidTtl)));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let reservation = Reservation::new(
            ReservationId::new(),
            StockQuantity::of(1),
            "ORD-1",
            now,
            Duration::minutes(5),
        )
        .unwrap();

        let expiry = reservation.expires_at();
        assert!(!reservation.is_expired(expiry - Duration::seconds(1)));
        assert!(reservation.is_expired(expiry));
        assert!(reservation.is_expired(expiry + Duration::seconds(1)));
    }
}

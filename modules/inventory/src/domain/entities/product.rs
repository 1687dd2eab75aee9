// Product aggregate root - orchestrates Stock and records domain events

use chrono::{DateTime, Duration, Utc};

use crate::domain::entities::{Reservation, Stock};
use crate::domain::events::{RecordedStockEvent, StockEvent};
use crate::domain::value_objects::{ProductId, ReleaseReason, ReservationId, StockQuantity};
use crate::InventoryError;

/// The consistency boundary of the inventory core.
///
/// A Product exclusively owns its Stock and every Reservation inside it;
/// outside code holds only a ReservationId and goes through the aggregate
/// to act on it. Each state change appends events to `pending_events`,
/// which the caller drains after a successful save.
#[derive(Debug, Clone)]
pub struct Product {
    id: ProductId,
    name: String,
    stock: Stock,
    low_stock_threshold: StockQuantity,
    active: bool,
    created_at: DateTime<Utc>,
    last_modified_at: DateTime<Utc>,
    event_seq: u64,
    pending_events: Vec<RecordedStockEvent>,
}

impl Product {
    /// Creates an active product with everything available (seed/import
    /// path; products are not created by the event flow).
    pub fn create(
        name: impl Into<String>,
        initial_total: StockQuantity,
        low_stock_threshold: StockQuantity,
        now: DateTime<Utc>,
    ) -> Result<Self, InventoryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InventoryError::InvalidProductName);
        }

        Ok(Self {
            id: ProductId::new(),
            name,
            stock: Stock::new(initial_total, now),
            low_stock_threshold,
            active: true,
            created_at: now,
            last_modified_at: now,
            event_seq: 0,
            pending_events: Vec::new(),
        })
    }

    /// Reconstitutes a product from persistence.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: ProductId,
        name: String,
        stock: Stock,
        low_stock_threshold: StockQuantity,
        active: bool,
        created_at: DateTime<Utc>,
        last_modified_at: DateTime<Utc>,
        event_seq: u64,
    ) -> Result<Self, InventoryError> {
        if name.trim().is_empty() {
            return Err(InventoryError::InvalidProductName);
        }

        Ok(Self {
            id,
            name,
            stock,
            low_stock_threshold,
            active,
            created_at,
            last_modified_at,
            event_seq,
            pending_events: Vec::new(),
        })
    }

    /// Reserves `quantity` for `order_id`, holding it until deducted,
    /// released, or expired.
    ///
    /// Records `StockReserved`, plus `LowStockAlert` when the mutation
    /// drops `available` from above the threshold to at-or-below it
    /// (transition-triggered; a zero threshold never alerts).
    pub fn reserve(
        &mut self,
        quantity: StockQuantity,
        order_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ReservationId, InventoryError> {
        if !self.active {
            return Err(InventoryError::ProductInactive(self.id.into_uuid()));
        }

        let available_before = self.stock.available();
        let reservation_id = ReservationId::new();
        let reservation = self
            .stock
            .reserve(reservation_id, quantity, order_id, ttl, now)?;

        self.record(
            StockEvent::StockReserved {
                product_id: self.id,
                reservation_id,
                order_id: order_id.to_string(),
                quantity,
                available_after: self.stock.available(),
                expires_at: reservation.expires_at(),
            },
            now,
        );

        if !self.low_stock_threshold.is_zero()
            && available_before > self.low_stock_threshold
            && self.stock.available() <= self.low_stock_threshold
        {
            self.record(
                StockEvent::LowStockAlert {
                    product_id: self.id,
                    available: self.stock.available(),
                    threshold: self.low_stock_threshold,
                },
                now,
            );
        }

        self.last_modified_at = now;
        Ok(reservation_id)
    }

    /// Adopts the service-wide default threshold when this product does
    /// not set one. Zero stays zero when the default is zero too, which
    /// keeps alerting off.
    pub fn inherit_low_stock_threshold(&mut self, default_threshold: StockQuantity) {
        if self.low_stock_threshold.is_zero() {
            self.low_stock_threshold = default_threshold;
        }
    }

    /// Releases a reservation back to available stock.
    pub fn release(
        &mut self,
        reservation_id: ReservationId,
        reason: ReleaseReason,
        now: DateTime<Utc>,
    ) -> Result<Reservation, InventoryError> {
        let reservation = self.stock.release(reservation_id, now)?;

        self.record(
            StockEvent::StockReleased {
                product_id: self.id,
                reservation_id,
                order_id: reservation.order_id().to_string(),
                quantity: reservation.quantity(),
                available_after: self.stock.available(),
                reason,
            },
            now,
        );
        self.last_modified_at = now;
        Ok(reservation)
    }

    /// Consumes a reservation: the order is paid, the stock leaves.
    pub fn deduct(
        &mut self,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, InventoryError> {
        let reservation = self.stock.deduct(reservation_id, now)?;

        self.record(
            StockEvent::StockDeducted {
                product_id: self.id,
                reservation_id,
                order_id: reservation.order_id().to_string(),
                quantity: reservation.quantity(),
                total_after: self.stock.total(),
            },
            now,
        );
        self.last_modified_at = now;
        Ok(reservation)
    }

    /// Removes stock without a reservation (damage, shrinkage, manual
    /// correction).
    pub fn deduct_direct(
        &mut self,
        quantity: StockQuantity,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        if !self.active {
            return Err(InventoryError::ProductInactive(self.id.into_uuid()));
        }

        self.stock.deduct_direct(quantity, now)?;
        self.record(
            StockEvent::StockAdjusted {
                product_id: self.id,
                delta: -i64::from(quantity.value()),
                reason: reason.to_string(),
                new_total: self.stock.total(),
            },
            now,
        );
        self.last_modified_at = now;
        Ok(())
    }

    /// Adds received stock.
    pub fn add_stock(
        &mut self,
        quantity: StockQuantity,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        self.stock.add(quantity, now)?;
        self.record(
            StockEvent::StockAdjusted {
                product_id: self.id,
                delta: i64::from(quantity.value()),
                reason: reason.to_string(),
                new_total: self.stock.total(),
            },
            now,
        );
        self.last_modified_at = now;
        Ok(())
    }

    /// Sets the absolute total after a recount.
    pub fn adjust_total(
        &mut self,
        new_total: StockQuantity,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        let old_total = self.stock.total();
        self.stock.adjust(new_total, now)?;
        self.record(
            StockEvent::StockAdjusted {
                product_id: self.id,
                delta: new_total.as_i64() - old_total.as_i64(),
                reason: reason.to_string(),
                new_total,
            },
            now,
        );
        self.last_modified_at = now;
        Ok(())
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.set_active(true, now);
    }

    /// An inactive product refuses reservations and direct deductions;
    /// releases and deductions of existing reservations still work.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.set_active(false, now);
    }

    fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        if self.active == active {
            return;
        }
        self.active = active;
        self.stock.touch(now);
        self.record(
            StockEvent::ProductStatusChanged {
                product_id: self.id,
                active,
            },
            now,
        );
        self.last_modified_at = now;
    }

    /// Releases every expired reservation, recording one `StockReleased`
    /// per entry with reason `EXPIRED`. Returns how many were released.
    pub fn cleanup_expired(&mut self, now: DateTime<Utc>) -> Result<usize, InventoryError> {
        let removed = self.stock.sweep_expired(now)?;
        if removed.is_empty() {
            return Ok(0);
        }

        let total_released: u32 = removed.iter().map(|r| r.quantity().value()).sum();
        let mut running = StockQuantity::of(
            self.stock
                .available()
                .value()
                .saturating_sub(total_released),
        );

        for reservation in &removed {
            running = running.add(reservation.quantity());
            self.record(
                StockEvent::StockReleased {
                    product_id: self.id,
                    reservation_id: reservation.id(),
                    order_id: reservation.order_id().to_string(),
                    quantity: reservation.quantity(),
                    available_after: running,
                    reason: ReleaseReason::Expired,
                },
                now,
            );
        }

        self.last_modified_at = now;
        Ok(removed.len())
    }

    /// Transfers the pending events out. The aggregate must be saved
    /// before the drained events are published.
    pub fn drain_events(&mut self) -> Vec<RecordedStockEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn record(&mut self, event: StockEvent, now: DateTime<Utc>) {
        self.event_seq += 1;
        self.pending_events.push(RecordedStockEvent {
            seq: self.event_seq,
            occurred_at: now,
            event,
        });
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> &Stock {
        &self.stock
    }

    pub fn low_stock_threshold(&self) -> StockQuantity {
        self.low_stock_threshold
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }

    /// The optimistic concurrency version observed by the repository.
    pub fn version(&self) -> u64 {
        self.stock.version()
    }

    /// Position of the last recorded event in this aggregate's stream.
    pub fn event_seq(&self) -> u64 {
        self.event_seq
    }

    pub fn pending_event_count(&self) -> usize {
        self.pending_events.len()
    }
}

// Stock entity - three-bucket quantity tracking with optimistic versioning

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::Reservation;
use crate::domain::value_objects::{ReservationId, StockQuantity};
use crate::InventoryError;

/// Stock levels of one product, owned exclusively by its Product.
///
/// Invariant after every operation: `available + reserved == total`, and
/// `reserved` equals the sum over the reservation table. Every mutation
/// bumps `version`, which the repository uses for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    available: StockQuantity,
    reserved: StockQuantity,
    total: StockQuantity,
    reservations: HashMap<ReservationId, Reservation>,
    version: u64,
    last_modified_at: DateTime<Utc>,
}

impl Stock {
    /// Creates stock with everything available and nothing reserved.
    pub fn new(initial_total: StockQuantity, now: DateTime<Utc>) -> Self {
        Self {
            available: initial_total,
            reserved: StockQuantity::ZERO,
            total: initial_total,
            reservations: HashMap::new(),
            version: 1,
            last_modified_at: now,
        }
    }

    /// Reconstitutes stock from persistence, re-checking the invariant.
    pub fn reconstitute(
        available: StockQuantity,
        reserved: StockQuantity,
        total: StockQuantity,
        reservations: HashMap<ReservationId, Reservation>,
        version: u64,
        last_modified_at: DateTime<Utc>,
    ) -> Result<Self, InventoryError> {
        let stock = Self {
            available,
            reserved,
            total,
            reservations,
            version,
            last_modified_at,
        };
        stock.check_invariants()?;
        Ok(stock)
    }

    /// Moves `quantity` from available to reserved under `reservation_id`.
    pub fn reserve(
        &mut self,
        reservation_id: ReservationId,
        quantity: StockQuantity,
        order_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Reservation, InventoryError> {
        if self.reservations.contains_key(&reservation_id) {
            return Err(InventoryError::DuplicateReservation(
                reservation_id.into_uuid(),
            ));
        }

        let remaining =
            self.available
                .checked_sub(quantity)
                .ok_or(InventoryError::InsufficientStock {
                    requested: quantity.value(),
                    available: self.available.value(),
                })?;

        let reservation = Reservation::new(reservation_id, quantity, order_id, now, ttl)?;
        self.available = remaining;
        self.reserved = self.reserved.add(quantity);
        self.reservations.insert(reservation_id, reservation.clone());
        self.touch(now);
        self.check_invariants()?;
        Ok(reservation)
    }

    /// Returns a reservation's quantity to available stock.
    ///
    /// Safe to call on an expired reservation still present in the table;
    /// the caller may be racing the sweeper.
    pub fn release(
        &mut self,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, InventoryError> {
        let reservation = self
            .reservations
            .remove(&reservation_id)
            .ok_or(InventoryError::ReservationNotFound(
                reservation_id.into_uuid(),
            ))?;

        self.available = self.available.add(reservation.quantity());
        self.reserved = self.sub_reserved(reservation.quantity())?;
        self.touch(now);
        self.check_invariants()?;
        Ok(reservation)
    }

    /// Consumes a reservation: the held quantity leaves the stock entirely.
    pub fn deduct(
        &mut self,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, InventoryError> {
        let reservation = self
            .reservations
            .remove(&reservation_id)
            .ok_or(InventoryError::ReservationNotFound(
                reservation_id.into_uuid(),
            ))?;

        self.reserved = self.sub_reserved(reservation.quantity())?;
        self.total = self
            .total
            .checked_sub(reservation.quantity())
            .ok_or_else(|| self.invariant_violation())?;
        self.touch(now);
        self.check_invariants()?;
        Ok(reservation)
    }

    /// Removes `quantity` directly from available stock, bypassing the
    /// reservation protocol (damage, shrinkage, manual correction).
    pub fn deduct_direct(
        &mut self,
        quantity: StockQuantity,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        self.available =
            self.available
                .checked_sub(quantity)
                .ok_or(InventoryError::InsufficientStock {
                    requested: quantity.value(),
                    available: self.available.value(),
                })?;
        self.total = self
            .total
            .checked_sub(quantity)
            .ok_or_else(|| self.invariant_violation())?;
        self.touch(now);
        self.check_invariants()
    }

    /// Adds received stock to the available bucket.
    pub fn add(&mut self, quantity: StockQuantity, now: DateTime<Utc>) -> Result<(), InventoryError> {
        self.available = self.available.add(quantity);
        self.total = self.total.add(quantity);
        self.touch(now);
        self.check_invariants()
    }

    /// Sets the absolute total; reserved stock is untouchable, so the new
    /// total must cover it.
    pub fn adjust(
        &mut self,
        new_total: StockQuantity,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        let available = new_total
            .checked_sub(self.reserved)
            .ok_or(InventoryError::AdjustmentTooLow {
                new_total: new_total.value(),
                reserved: self.reserved.value(),
            })?;

        self.total = new_total;
        self.available = available;
        self.touch(now);
        self.check_invariants()
    }

    /// Removes every reservation with `expires_at <= now` in one pass,
    /// returning their quantities to available. Bumps the version only when
    /// something was released.
    pub fn sweep_expired(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, InventoryError> {
        let expired_ids: Vec<ReservationId> = self
            .reservations
            .values()
            .filter(|r| r.is_expired(now))
            .map(Reservation::id)
            .collect();

        if expired_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut removed = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            if let Some(reservation) = self.reservations.remove(&id) {
                self.available = self.available.add(reservation.quantity());
                self.reserved = self.sub_reserved(reservation.quantity())?;
                removed.push(reservation);
            }
        }

        self.touch(now);
        self.check_invariants()?;
        Ok(removed)
    }

    pub fn available(&self) -> StockQuantity {
        self.available
    }

    pub fn reserved(&self) -> StockQuantity {
        self.reserved
    }

    pub fn total(&self) -> StockQuantity {
        self.total
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// The table stays inside the aggregate; the crate's persistence
    /// adapters are the only other readers.
    pub(crate) fn reservations(&self) -> &HashMap<ReservationId, Reservation> {
        &self.reservations
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.last_modified_at = now;
    }

    fn sub_reserved(&self, quantity: StockQuantity) -> Result<StockQuantity, InventoryError> {
        self.reserved
            .checked_sub(quantity)
            .ok_or_else(|| self.invariant_violation())
    }

    fn invariant_violation(&self) -> InventoryError {
        InventoryError::InvariantViolation {
            available: self.available.value(),
            reserved: self.reserved.value(),
            total: self.total.value(),
        }
    }

    fn check_invariants(&self) -> Result<(), InventoryError> {
        let sum = u64::from(self.available.value()) + u64::from(self.reserved.value());
        let held: u64 = self
            .reservations
            .values()
            .map(|r| u64::from(r.quantity().value()))
            .sum();

        if sum != u64::from(self.total.value()) || held != u64::from(self.reserved.value()) {
            return Err(self.invariant_violation());
        }
        Ok(())
    }
}


#[cfg(test)]
mod invariant_props {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(u32),
        ReleaseNth(usize),
        DeductNth(usize),
        DeductDirect(u32),
        Add(u32),
        Adjust(u32),
        Sweep,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..50).prop_map(Op::Reserve),
            (0usize..8).prop_map(Op::ReleaseNth),
            (0usize..8).prop_map(Op::DeductNth),
            (1u32..50).prop_map(Op::DeductDirect),
            (1u32..50).prop_map(Op::Add),
            (0u32..200).prop_map(Op::Adjust),
            Just(Op::Sweep),
        ]
    }

    proptest! {
        // Invariants 1-3: buckets balance and reserved matches the table,
        // whatever sequence of operations runs and whichever of them fail.
        #[test]
        fn stock_invariants_hold_under_any_sequence(
            initial in 0u32..200,
            ops in proptest::collection::vec(op_strategy(), 1..40),
        ) {
            let now = Utc::now();
            let mut stock = Stock::new(StockQuantity::of(initial), now);
            let mut live: Vec<ReservationId> = Vec::new();

            for (i, op) in ops.into_iter().enumerate() {
                let at = now + Duration::seconds(i as i64);
                match op {
                    Op::Reserve(q) => {
                        let id = ReservationId::new();
                        if stock
                            .reserve(id, StockQuantity::of(q), "ORD-P", Duration::minutes(30), at)
                            .is_ok()
                        {
                            live.push(id);
                        }
                    }
                    Op::ReleaseNth(n) => {
                        if !live.is_empty() {
                            let id = live.remove(n % live.len());
                            stock.release(id, at).unwrap();
                        }
                    }
                    Op::DeductNth(n) => {
                        if !live.is_empty() {
                            let id = live.remove(n % live.len());
                            stock.deduct(id, at).unwrap();
                        }
                    }
                    Op::DeductDirect(q) => {
                        let _ = stock.deduct_direct(StockQuantity::of(q), at);
                    }
                    Op::Add(q) => {
                        stock.add(StockQuantity::of(q), at).unwrap();
                    }
                    Op::Adjust(q) => {
                        let _ = stock.adjust(StockQuantity::of(q), at);
                    }
                    Op::Sweep => {
                        stock.sweep_expired(at).unwrap();
                    }
                }

                let held: u64 = live
                    .iter()
                    .filter_map(|id| stock.reservation(*id))
                    .map(|r| u64::from(r.quantity().value()))
                    .sum();
                prop_assert_eq!(
                    u64::from(stock.available().value()) + u64::from(stock.reserved().value()),
                    u64::from(stock.total().value())
                );
                prop_assert_eq!(u64::from(stock.reserved().value()), held);
            }
        }
    }
}

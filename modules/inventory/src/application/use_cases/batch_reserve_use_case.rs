// BatchReserveUseCase - reserve an order's items across products

use std::sync::Arc;

use events::EventPublisher;
use tracing::{error, warn};

use crate::application::dtos::commands::{
    BatchReserveCommand, ReleaseReservationCommand, ReserveStockCommand,
};
use crate::application::dtos::responses::{
    BatchReserveResponse, ItemOutcome, ItemReserveResult, ReservationResponse,
};
use crate::application::ports::{product_lock_key, LockManager};
use crate::application::use_cases::{ReleaseReservationUseCase, ReserveStockUseCase};
use crate::domain::repositories::ProductRepository;
use crate::domain::value_objects::ReleaseReason;
use crate::InventoryError;

/// Use case for reserving every item of an order.
///
/// Items are sorted by their product lock keys before any lock is taken,
/// so two batches touching the same products always acquire in the same
/// order. Locks are never held across items; each item runs the
/// single-product protocol on its own.
///
/// In atomic mode a failing item releases everything the batch reserved so
/// far and propagates the failure (the rejection event for the failing
/// item has already been published by the single-item use case).
pub struct BatchReserveUseCase<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    reserve: Arc<ReserveStockUseCase<R, L, P>>,
    release: Arc<ReleaseReservationUseCase<R, L, P>>,
}

impl<R, L, P> BatchReserveUseCase<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    pub fn new(
        reserve: Arc<ReserveStockUseCase<R, L, P>>,
        release: Arc<ReleaseReservationUseCase<R, L, P>>,
    ) -> Self {
        Self { reserve, release }
    }

    /// Executes the use case to reserve all items of an order
    ///
    /// # Errors
    /// In atomic mode, the first failing item's error after compensation.
    /// Non-atomic mode reports failures per item and does not error on
    /// domain rejections.
    pub async fn execute(
        &self,
        command: BatchReserveCommand,
    ) -> Result<BatchReserveResponse, InventoryError> {
        // Lexicographic lock-key order prevents deadlock between batches.
        let mut items = command.items;
        items.sort_by_key(|item| product_lock_key(item.product_id));

        let mut results: Vec<ItemReserveResult> = Vec::with_capacity(items.len());

        for item in items {
            let reserve_command = ReserveStockCommand {
                product_id: item.product_id,
                quantity: item.quantity,
                order_id: command.order_id.clone(),
                ttl: None,
            };

            match self.reserve.execute(reserve_command).await {
                Ok(response) => results.push(ItemReserveResult {
                    product_id: item.product_id,
                    outcome: ItemOutcome::Reserved(response),
                }),
                Err(err) if command.atomic => {
                    warn!(
                        order_id = %command.order_id,
                        product_id = %item.product_id,
                        error = %err,
                        "atomic batch failed, rolling back prior reservations"
                    );
                    self.roll_back(&command.order_id, &results).await;
                    return Err(err);
                }
                Err(err) => results.push(ItemReserveResult {
                    product_id: item.product_id,
                    outcome: ItemOutcome::Failed {
                        error: err.to_string(),
                    },
                }),
            }
        }

        Ok(BatchReserveResponse {
            order_id: command.order_id,
            results,
        })
    }

    /// Unwinds reservations made before a failing item, newest first.
    async fn roll_back(&self, order_id: &str, succeeded: &[ItemReserveResult]) {
        let reserved: Vec<&ReservationResponse> = succeeded
            .iter()
            .filter_map(|result| match &result.outcome {
                ItemOutcome::Reserved(response) => Some(response),
                ItemOutcome::Failed { .. } => None,
            })
            .collect();

        for response in reserved.iter().rev() {
            let release_command = ReleaseReservationCommand {
                reservation_id: response.reservation_id,
                order_id: order_id.to_string(),
                reason: ReleaseReason::Manual,
            };
            if let Err(err) = self.release.execute(release_command).await {
                // The reservation will still expire; the sweeper is the backstop.
                error!(
                    order_id,
                    reservation_id = %response.reservation_id,
                    error = %err,
                    "failed to roll back reservation"
                );
            }
        }
    }
}

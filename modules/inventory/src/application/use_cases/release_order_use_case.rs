// ReleaseOrderUseCase - release every reservation held for an order

use std::sync::Arc;

use events::EventPublisher;
use tracing::{info, warn};

use crate::application::dtos::commands::{ReleaseOrderCommand, ReleaseReservationCommand};
use crate::application::dtos::responses::{ReleaseFailure, ReleaseOrderResponse};
use crate::application::ports::LockManager;
use crate::application::use_cases::ReleaseReservationUseCase;
use crate::domain::repositories::ProductRepository;
use crate::InventoryError;

/// Use case for releasing all reservations of one order (cancellation).
///
/// Idempotent by construction: reservations already gone release as
/// no-ops, so redelivering the cancellation is harmless. Retriable
/// infrastructure errors abort the batch for redelivery; non-retriable
/// per-item failures are reported and skipped.
pub struct ReleaseOrderUseCase<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    repo: Arc<R>,
    release: Arc<ReleaseReservationUseCase<R, L, P>>,
}

impl<R, L, P> ReleaseOrderUseCase<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    pub fn new(repo: Arc<R>, release: Arc<ReleaseReservationUseCase<R, L, P>>) -> Self {
        Self { repo, release }
    }

    /// Executes the use case to release an order's reservations
    ///
    /// # Errors
    /// The first retriable infrastructure error; the caller redelivers and
    /// the already-released items no-op on the next pass.
    pub async fn execute(
        &self,
        command: ReleaseOrderCommand,
    ) -> Result<ReleaseOrderResponse, InventoryError> {
        let pairs = self
            .repo
            .find_reservations_by_order(&command.order_id)
            .await?;

        let mut released = Vec::with_capacity(pairs.len());
        let mut failed = Vec::new();

        for (product_id, reservation_id) in pairs {
            let release_command = ReleaseReservationCommand {
                reservation_id,
                order_id: command.order_id.clone(),
                reason: command.reason,
            };

            match self.release.execute(release_command).await {
                Ok(response) => released.push(response),
                Err(err) if err.is_retriable() => return Err(err),
                Err(err) => {
                    warn!(
                        order_id = %command.order_id,
                        product_id = %product_id,
                        reservation_id = %reservation_id,
                        error = %err,
                        "skipping reservation that cannot be released"
                    );
                    failed.push(ReleaseFailure {
                        reservation_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            order_id = %command.order_id,
            released = released.iter().filter(|r| r.was_released()).count(),
            failed = failed.len(),
            "order reservations released"
        );

        Ok(ReleaseOrderResponse {
            order_id: command.order_id,
            released,
            failed,
        })
    }
}

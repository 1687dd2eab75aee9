// ReleaseReservationUseCase - returns a hold to available stock

use std::sync::Arc;

use chrono::Utc;
use events::EventPublisher;
use tracing::{debug, info};

use crate::application::dtos::commands::ReleaseReservationCommand;
use crate::application::dtos::responses::{ReleaseOutcome, ReleaseResponse};
use crate::application::ports::{product_lock_key, with_lock, LockManager};
use crate::application::use_cases::support::{conflict_backoff, publish_events};
use crate::config::InventoryConfig;
use crate::domain::repositories::ProductRepository;
use crate::domain::value_objects::ProductId;
use crate::InventoryError;

/// Use case for releasing one reservation.
///
/// Releasing a reservation that no longer exists is a success, not an
/// error: order cancellation is retried at-least-once, and the sweeper may
/// get there first. The repository's reservation index resolves the owning
/// product.
pub struct ReleaseReservationUseCase<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    repo: Arc<R>,
    lock: Arc<L>,
    publisher: Arc<P>,
    config: InventoryConfig,
}

impl<R, L, P> ReleaseReservationUseCase<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    pub fn new(repo: Arc<R>, lock: Arc<L>, publisher: Arc<P>, config: InventoryConfig) -> Self {
        Self {
            repo,
            lock,
            publisher,
            config,
        }
    }

    /// Executes the use case to release a reservation
    ///
    /// # Errors
    /// * `InventoryError::ProductNotFound` - index points at a missing product
    /// * `InventoryError::Conflict` - version conflicts exhausted retries
    /// * `InventoryError::LockAcquisition` - product lock unavailable
    pub async fn execute(
        &self,
        command: ReleaseReservationCommand,
    ) -> Result<ReleaseResponse, InventoryError> {
        let Some(product_id) = self
            .repo
            .find_product_by_reservation(command.reservation_id)
            .await?
        else {
            debug!(
                reservation_id = %command.reservation_id,
                order_id = %command.order_id,
                "release of unknown reservation is a no-op"
            );
            return Ok(ReleaseResponse {
                reservation_id: command.reservation_id,
                outcome: ReleaseOutcome::AlreadyReleased,
            });
        };

        let key = product_lock_key(product_id);
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = with_lock(
                self.lock.as_ref(),
                &key,
                self.config.lock.wait_timeout,
                self.config.lock.lease_timeout,
                || self.release_once(product_id, &command),
            )
            .await;

            match outcome {
                Err(InventoryError::OptimisticConflict) if attempt < max_attempts => {
                    conflict_backoff(&self.config.retry, attempt).await;
                }
                Err(InventoryError::OptimisticConflict) => {
                    return Err(InventoryError::Conflict { attempts: attempt });
                }
                other => return other,
            }
        }
    }

    async fn release_once(
        &self,
        product_id: ProductId,
        command: &ReleaseReservationCommand,
    ) -> Result<ReleaseResponse, InventoryError> {
        let now = Utc::now();
        let mut product = self
            .repo
            .find_by_id(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id.into_uuid()))?;

        let expected_version = product.version();
        let reservation = match product.release(command.reservation_id, command.reason, now) {
            Ok(reservation) => reservation,
            // The sweeper won the race; the hold is already gone.
            Err(InventoryError::ReservationNotFound(_)) => {
                return Ok(ReleaseResponse {
                    reservation_id: command.reservation_id,
                    outcome: ReleaseOutcome::AlreadyReleased,
                });
            }
            Err(other) => return Err(other),
        };

        let available_after = product.stock().available();
        self.repo
            .update_with_version(&product, expected_version)
            .await?;
        publish_events(self.publisher.as_ref(), product.drain_events()).await;

        info!(
            product_id = %product_id,
            reservation_id = %command.reservation_id,
            order_id = %command.order_id,
            reason = %command.reason,
            quantity = %reservation.quantity(),
            "reservation released"
        );

        Ok(ReleaseResponse {
            reservation_id: command.reservation_id,
            outcome: ReleaseOutcome::Released {
                product_id,
                quantity: reservation.quantity(),
                available_after,
            },
        })
    }
}

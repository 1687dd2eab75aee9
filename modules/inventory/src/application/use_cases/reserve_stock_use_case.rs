// ReserveStockUseCase - phase one of the reservation protocol

use std::sync::Arc;

use chrono::Utc;
use events::EventPublisher;
use tracing::{debug, info};

use crate::application::dtos::commands::ReserveStockCommand;
use crate::application::dtos::responses::ReservationResponse;
use crate::application::ports::{product_lock_key, with_lock, LockManager};
use crate::application::use_cases::support::{conflict_backoff, publish_events};
use crate::config::InventoryConfig;
use crate::domain::events::{RecordedStockEvent, StockEvent};
use crate::domain::repositories::ProductRepository;
use crate::domain::value_objects::{InsufficientReason, StockQuantity};
use crate::InventoryError;

/// Use case for reserving stock on a single product.
///
/// Runs the full commit protocol under the product lock: load, reserve,
/// save with the optimistic version, publish the drained events. A version
/// conflict releases the lock, backs off, and retries the whole protocol
/// up to the configured attempt budget.
///
/// Rejections are published as `InsufficientStock` before the error
/// surfaces, so the order service always hears back.
pub struct ReserveStockUseCase<R, L, P>
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

impl<R, L, P> ReserveStockUseCase<R, L, P>
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

    /// Executes the use case to place a reservation
    ///
    /// # Errors
    /// * `InventoryError::ProductNotFound` - unknown product id
    /// * `InventoryError::ProductInactive` - product refuses reservations
    /// * `InventoryError::InsufficientStock` - not enough available
    /// * `InventoryError::Conflict` - version conflicts exhausted retries
    /// * `InventoryError::LockAcquisition` - product lock unavailable
    pub async fn execute(
        &self,
        command: ReserveStockCommand,
    ) -> Result<ReservationResponse, InventoryError> {
        let key = product_lock_key(command.product_id);
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = with_lock(
                self.lock.as_ref(),
                &key,
                self.config.lock.wait_timeout,
                self.config.lock.lease_timeout,
                || self.reserve_once(&command),
            )
            .await;

            match outcome {
                Err(InventoryError::OptimisticConflict) if attempt < max_attempts => {
                    debug!(
                        product_id = %command.product_id,
                        order_id = %command.order_id,
                        attempt,
                        "version conflict, retrying reservation"
                    );
                    conflict_backoff(&self.config.retry, attempt).await;
                }
                Err(InventoryError::OptimisticConflict) => {
                    return Err(InventoryError::Conflict { attempts: attempt });
                }
                other => return other,
            }
        }
    }

    async fn reserve_once(
        &self,
        command: &ReserveStockCommand,
    ) -> Result<ReservationResponse, InventoryError> {
        let now = Utc::now();

        let Some(mut product) = self.repo.find_by_id(command.product_id).await? else {
            self.publish_rejection(command, StockQuantity::ZERO, InsufficientReason::ProductNotFound, 1)
                .await;
            return Err(InventoryError::ProductNotFound(
                command.product_id.into_uuid(),
            ));
        };

        let expected_version = product.version();
        product.inherit_low_stock_threshold(StockQuantity::of(
            self.config.low_stock.default_threshold,
        ));
        let ttl = command.ttl.unwrap_or(self.config.reservation.default_ttl);

        let reservation_id = match product.reserve(command.quantity, &command.order_id, ttl, now) {
            Ok(id) => id,
            Err(InventoryError::ProductInactive(id)) => {
                self.publish_rejection(
                    command,
                    product.stock().available(),
                    InsufficientReason::Inactive,
                    product.event_seq(),
                )
                .await;
                return Err(InventoryError::ProductInactive(id));
            }
            Err(InventoryError::InsufficientStock {
                requested,
                available,
            }) => {
                self.publish_rejection(
                    command,
                    product.stock().available(),
                    InsufficientReason::Insufficient,
                    product.event_seq(),
                )
                .await;
                return Err(InventoryError::InsufficientStock {
                    requested,
                    available,
                });
            }
            Err(other) => return Err(other),
        };

        let reservation = product
            .stock()
            .reservation(reservation_id)
            .cloned()
            .ok_or(InventoryError::ReservationNotFound(
                reservation_id.into_uuid(),
            ))?;
        let available_after = product.stock().available();

        self.repo
            .update_with_version(&product, expected_version)
            .await?;
        publish_events(self.publisher.as_ref(), product.drain_events()).await;

        info!(
            product_id = %command.product_id,
            order_id = %command.order_id,
            reservation_id = %reservation_id,
            quantity = %command.quantity,
            available_after = %available_after,
            "stock reserved"
        );

        Ok(ReservationResponse {
            reservation_id,
            product_id: command.product_id,
            order_id: command.order_id.clone(),
            quantity: command.quantity,
            available_after,
            expires_at: reservation.expires_at(),
        })
    }

    /// Rejections do not mutate the aggregate, so nothing is saved; the
    /// event is built here and published directly.
    async fn publish_rejection(
        &self,
        command: &ReserveStockCommand,
        available: StockQuantity,
        reason: InsufficientReason,
        seq: u64,
    ) {
        let recorded = RecordedStockEvent {
            seq: seq.max(1),
            occurred_at: Utc::now(),
            event: StockEvent::InsufficientStock {
                product_id: command.product_id,
                order_id: command.order_id.clone(),
                requested: command.quantity,
                available,
                reason,
            },
        };
        publish_events(self.publisher.as_ref(), vec![recorded]).await;
    }
}

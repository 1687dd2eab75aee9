// DeductStockUseCase - phase two of the reservation protocol: consume the hold

use std::sync::Arc;

use chrono::Utc;
use events::EventPublisher;
use tracing::info;

use crate::application::dtos::commands::DeductStockCommand;
use crate::application::dtos::responses::DeductResponse;
use crate::application::ports::{product_lock_key, with_lock, LockManager};
use crate::application::use_cases::support::{conflict_backoff, publish_events};
use crate::config::InventoryConfig;
use crate::domain::repositories::ProductRepository;
use crate::domain::value_objects::ProductId;
use crate::InventoryError;

/// Use case for deducting reserved stock after payment confirmation.
///
/// A reservation can only be consumed while it is live: absent or expired
/// reservations fail with `ReservationInvalid`, and a second deduct for
/// the same reservation fails the same way with no side effects.
pub struct DeductStockUseCase<R, L, P>
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

impl<R, L, P> DeductStockUseCase<R, L, P>
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

    /// Executes the use case to consume a reservation
    ///
    /// # Errors
    /// * `InventoryError::ReservationInvalid` - reservation absent or expired
    /// * `InventoryError::ProductNotFound` - index points at a missing product
    /// * `InventoryError::Conflict` - version conflicts exhausted retries
    /// * `InventoryError::LockAcquisition` - product lock unavailable
    pub async fn execute(
        &self,
        command: DeductStockCommand,
    ) -> Result<DeductResponse, InventoryError> {
        let product_id = self
            .repo
            .find_product_by_reservation(command.reservation_id)
            .await?
            .ok_or(InventoryError::ReservationInvalid(
                command.reservation_id.into_uuid(),
            ))?;

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
                || self.deduct_once(product_id, &command),
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

    async fn deduct_once(
        &self,
        product_id: ProductId,
        command: &DeductStockCommand,
    ) -> Result<DeductResponse, InventoryError> {
        let now = Utc::now();
        let mut product = self
            .repo
            .find_by_id(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id.into_uuid()))?;

        // An expired hold must not be consumed even if the sweeper has not
        // collected it yet.
        match product.stock().reservation(command.reservation_id) {
            Some(reservation) if !reservation.is_expired(now) => {}
            _ => {
                return Err(InventoryError::ReservationInvalid(
                    command.reservation_id.into_uuid(),
                ));
            }
        }

        let expected_version = product.version();
        let reservation = match product.deduct(command.reservation_id, now) {
            Ok(reservation) => reservation,
            Err(InventoryError::ReservationNotFound(id)) => {
                return Err(InventoryError::ReservationInvalid(id));
            }
            Err(other) => return Err(other),
        };

        let total_after = product.stock().total();
        self.repo
            .update_with_version(&product, expected_version)
            .await?;
        publish_events(self.publisher.as_ref(), product.drain_events()).await;

        info!(
            product_id = %product_id,
            reservation_id = %command.reservation_id,
            order_id = %command.order_id,
            quantity = %reservation.quantity(),
            total_after = %total_after,
            "reserved stock deducted"
        );

        Ok(DeductResponse {
            product_id,
            reservation_id: command.reservation_id,
            quantity: reservation.quantity(),
            total_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use events::InMemoryEventBus;
    use serde_json::json;

    use crate::domain::entities::Product;
    use crate::domain::value_objects::{ReservationId, StockQuantity};
    use crate::infrastructure::locking::InMemoryLockManager;
    use crate::infrastructure::persistence::InMemoryProductRepository;

    fn test_config() -> InventoryConfig {
        let mut config = InventoryConfig::default();
        config.lock.wait_timeout = StdDuration::from_millis(100);
        config.retry.backoff_base = StdDuration::from_millis(1);
        config
    }

    fn use_case() -> (
        Arc<InMemoryProductRepository>,
        Arc<InMemoryEventBus>,
        DeductStockUseCase<InMemoryProductRepository, InMemoryLockManager, InMemoryEventBus>,
    ) {
        let repo = Arc::new(InMemoryProductRepository::new());
        let lock = Arc::new(InMemoryLockManager::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let uc = DeductStockUseCase::new(repo.clone(), lock, bus.clone(), test_config());
        (repo, bus, uc)
    }

    fn seed_reserved(
        repo: &InMemoryProductRepository,
        total: u32,
        reserved: u32,
        ttl: chrono::Duration,
    ) -> (ProductId, ReservationId) {
        let mut product = Product::create(
            "Hand Grinder",
            StockQuantity::of(total),
            StockQuantity::ZERO,
            Utc::now(),
        )
        .unwrap();
        let reservation_id = product
            .reserve(StockQuantity::of(reserved), "ORD-1", ttl, Utc::now())
            .unwrap();
        let product_id = product.id();
        repo.seed(product);
        (product_id, reservation_id)
    }

    fn command(reservation_id: ReservationId) -> DeductStockCommand {
        DeductStockCommand {
            reservation_id,
            order_id: "ORD-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_deduct_consumes_the_hold() {
        let (repo, bus, uc) = use_case();
        let (product_id, reservation_id) =
            seed_reserved(&repo, 10, 3, chrono::Duration::minutes(30));

        let response = uc.execute(command(reservation_id)).await.unwrap();

        assert_eq!(response.quantity.value(), 3);
        assert_eq!(response.total_after.value(), 7);

        let stored = repo.get(product_id).unwrap();
        assert_eq!(stored.stock().available().value(), 7);
        assert_eq!(stored.stock().reserved().value(), 0);
        assert_eq!(stored.stock().total().value(), 7);

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type, "StockDeducted");
        assert_eq!(published[0].payload["totalAfter"], json!(7));
    }

    #[tokio::test]
    async fn test_second_deduct_fails_with_reservation_invalid() {
        let (repo, bus, uc) = use_case();
        let (product_id, reservation_id) =
            seed_reserved(&repo, 10, 3, chrono::Duration::minutes(30));

        uc.execute(command(reservation_id)).await.unwrap();
        let second = uc.execute(command(reservation_id)).await;

        assert!(matches!(second, Err(InventoryError::ReservationInvalid(_))));
        assert_eq!(bus.published().len(), 1);
        assert_eq!(repo.get(product_id).unwrap().stock().total().value(), 7);
    }

    #[tokio::test]
    async fn test_expired_reservation_cannot_be_deducted() {
        let (repo, bus, uc) = use_case();
        let (product_id, reservation_id) =
            seed_reserved(&repo, 10, 3, chrono::Duration::milliseconds(1));

        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let result = uc.execute(command(reservation_id)).await;

        assert!(matches!(result, Err(InventoryError::ReservationInvalid(_))));
        assert!(bus.published().is_empty());
        // The hold stays for the sweeper to collect.
        let stored = repo.get(product_id).unwrap();
        assert_eq!(stored.stock().reserved().value(), 3);
        assert_eq!(stored.stock().total().value(), 10);
    }

    #[tokio::test]
    async fn test_unknown_reservation_fails() {
        let (_repo, _bus, uc) = use_case();
        let result = uc.execute(command(ReservationId::new())).await;
        assert!(matches!(result, Err(InventoryError::ReservationInvalid(_))));
    }
}

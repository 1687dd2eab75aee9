// ExpireReservationsUseCase - one pass of the expiry sweeper

use std::sync::Arc;

use chrono::{DateTime, Utc};
use events::EventPublisher;
use tracing::{debug, warn};

use crate::application::dtos::responses::SweepReport;
use crate::application::ports::{product_lock_key, with_lock, LockManager};
use crate::application::use_cases::support::publish_events;
use crate::config::InventoryConfig;
use crate::domain::repositories::ProductRepository;
use crate::domain::value_objects::ProductId;
use crate::InventoryError;

/// Use case for releasing expired reservations across all products.
///
/// Pages through active products holding reservations and sweeps each one
/// under its lock, with the short sweep wait. A product that cannot be
/// locked — or that a request-path writer beats to the save — is skipped
/// and revisited on the next tick; a release can never happen twice
/// because the second pass simply finds nothing expired.
pub struct ExpireReservationsUseCase<R, L, P>
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

impl<R, L, P> ExpireReservationsUseCase<R, L, P>
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

    /// Runs one sweep at the current time.
    pub async fn execute(&self) -> Result<SweepReport, InventoryError> {
        self.execute_at(Utc::now()).await
    }

    /// Runs one sweep with an explicit clock (deterministic in tests).
    pub async fn execute_at(&self, now: DateTime<Utc>) -> Result<SweepReport, InventoryError> {
        let mut report = SweepReport::default();
        let mut cursor: Option<ProductId> = None;

        loop {
            let page = self
                .repo
                .find_active_with_reservations(self.config.sweeper.page_size, cursor)
                .await?;

            for product_id in &page.items {
                report.products_scanned += 1;
                match self.sweep_product(*product_id, now).await {
                    Ok(0) => {}
                    Ok(released) => {
                        report.products_swept += 1;
                        report.reservations_released += released;
                    }
                    Err(InventoryError::LockAcquisition { .. })
                    | Err(InventoryError::OptimisticConflict) => {
                        debug!(product_id = %product_id, "product busy, skipping until next sweep");
                        report.products_skipped += 1;
                    }
                    Err(err) => {
                        warn!(product_id = %product_id, error = %err, "sweep failed for product");
                        report.errors.push(format!("{product_id}: {err}"));
                    }
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(report)
    }

    async fn sweep_product(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<usize, InventoryError> {
        let key = product_lock_key(product_id);
        with_lock(
            self.lock.as_ref(),
            &key,
            self.config.lock.sweep_wait_timeout,
            self.config.lock.lease_timeout,
            || async {
                let Some(mut product) = self.repo.find_by_id(product_id).await? else {
                    return Ok(0);
                };

                let expected_version = product.version();
                let released = product.cleanup_expired(now)?;
                if released == 0 {
                    return Ok(0);
                }

                self.repo
                    .update_with_version(&product, expected_version)
                    .await?;
                publish_events(self.publisher.as_ref(), product.drain_events()).await;
                Ok(released)
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use chrono::Duration;
    use events::InMemoryEventBus;
    use serde_json::json;

    use crate::domain::entities::Product;
    use crate::domain::value_objects::StockQuantity;
    use crate::infrastructure::locking::InMemoryLockManager;
    use crate::infrastructure::persistence::InMemoryProductRepository;

    fn test_config() -> InventoryConfig {
        let mut config = InventoryConfig::default();
        config.lock.sweep_wait_timeout = StdDuration::from_millis(50);
        config.sweeper.page_size = 2;
        config
    }

    fn use_case() -> (
        Arc<InMemoryProductRepository>,
        Arc<InMemoryLockManager>,
        Arc<InMemoryEventBus>,
        ExpireReservationsUseCase<InMemoryProductRepository, InMemoryLockManager, InMemoryEventBus>,
    ) {
        let repo = Arc::new(InMemoryProductRepository::new());
        let lock = Arc::new(InMemoryLockManager::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let uc = ExpireReservationsUseCase::new(repo.clone(), lock.clone(), bus.clone(), test_config());
        (repo, lock, bus, uc)
    }

    fn seed_with_reservation(
        repo: &InMemoryProductRepository,
        ttl_minutes: i64,
        now: DateTime<Utc>,
    ) -> ProductId {
        let mut product = Product::create(
            "Cold Brew Bottle",
            StockQuantity::of(10),
            StockQuantity::ZERO,
            now,
        )
        .unwrap();
        product
            .reserve(
                StockQuantity::of(3),
                "ORD-1",
                Duration::minutes(ttl_minutes),
                now,
            )
            .unwrap();
        let id = product.id();
        repo.seed(product);
        id
    }

    #[tokio::test]
    async fn test_sweep_releases_expired_reservations() {
        let (repo, _lock, bus, uc) = use_case();
        let now = Utc::now();
        let product_id = seed_with_reservation(&repo, 5, now);

        let report = uc.execute_at(now + Duration::minutes(6)).await.unwrap();

        assert_eq!(report.products_swept, 1);
        assert_eq!(report.reservations_released, 1);
        assert!(report.errors.is_empty());

        let stored = repo.get(product_id).unwrap();
        assert_eq!(stored.stock().available().value(), 10);
        assert_eq!(stored.stock().reservation_count(), 0);

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type, "StockReleased");
        assert_eq!(published[0].payload["reason"], json!("EXPIRED"));
        assert_eq!(published[0].correlation_id.as_deref(), Some("ORD-1"));
    }

    #[tokio::test]
    async fn test_sweep_leaves_live_reservations_alone() {
        let (repo, _lock, bus, uc) = use_case();
        let now = Utc::now();
        let product_id = seed_with_reservation(&repo, 60, now);

        let report = uc.execute_at(now + Duration::minutes(6)).await.unwrap();

        assert_eq!(report.products_scanned, 1);
        assert_eq!(report.products_swept, 0);
        assert!(bus.published().is_empty());
        assert_eq!(repo.get(product_id).unwrap().stock().reserved().value(), 3);
    }

    #[tokio::test]
    async fn test_sweep_pages_through_many_products() {
        let (repo, _lock, bus, uc) = use_case();
        let now = Utc::now();
        for _ in 0..5 {
            seed_with_reservation(&repo, 5, now);
        }

        let report = uc.execute_at(now + Duration::minutes(6)).await.unwrap();

        assert_eq!(report.products_scanned, 5);
        assert_eq!(report.products_swept, 5);
        assert_eq!(report.reservations_released, 5);
        assert_eq!(bus.published_of_type("StockReleased").len(), 5);
    }

    #[tokio::test]
    async fn test_locked_product_is_skipped_not_failed() {
        let (repo, lock, bus, uc) = use_case();
        let now = Utc::now();
        let product_id = seed_with_reservation(&repo, 5, now);

        let _held = lock
            .try_lock(
                &product_lock_key(product_id),
                StdDuration::from_millis(10),
                StdDuration::from_secs(30),
            )
            .await
            .unwrap();

        let report = uc.execute_at(now + Duration::minutes(6)).await.unwrap();

        assert_eq!(report.products_skipped, 1);
        assert_eq!(report.products_swept, 0);
        assert!(report.errors.is_empty());
        assert!(bus.published().is_empty());
        // Still reserved; the next tick will collect it.
        assert_eq!(repo.get(product_id).unwrap().stock().reserved().value(), 3);
    }

    #[tokio::test]
    async fn test_sweep_at_exact_expiry_releases() {
        let (repo, _lock, _bus, uc) = use_case();
        let now = Utc::now();
        let product_id = seed_with_reservation(&repo, 5, now);

        let report = uc.execute_at(now + Duration::minutes(5)).await.unwrap();

        assert_eq!(report.reservations_released, 1);
        assert_eq!(repo.get(product_id).unwrap().stock().available().value(), 10);
    }
}

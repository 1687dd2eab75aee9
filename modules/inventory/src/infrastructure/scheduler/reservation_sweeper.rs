// ReservationSweeper - periodic expired-reservation collection

use std::sync::Arc;
use std::time::Duration;

use events::EventPublisher;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::application::ports::LockManager;
use crate::application::use_cases::ExpireReservationsUseCase;
use crate::domain::repositories::ProductRepository;

/// Runs the expiry sweep on an interval, starting with an immediate pass
/// at startup so holds left over from a previous run are collected right
/// away.
pub struct ReservationSweeper<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    use_case: Arc<ExpireReservationsUseCase<R, L, P>>,
    interval: Duration,
}

impl<R, L, P> ReservationSweeper<R, L, P>
where
    R: ProductRepository + 'static,
    L: LockManager + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(use_case: Arc<ExpireReservationsUseCase<R, L, P>>, interval: Duration) -> Self {
        Self { use_case, interval }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.use_case.execute().await {
                    Ok(report) => info!(
                        scanned = report.products_scanned,
                        swept = report.products_swept,
                        skipped = report.products_skipped,
                        released = report.reservations_released,
                        errors = report.errors.len(),
                        "reservation sweep complete"
                    ),
                    Err(err) => error!(error = %err, "reservation sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use events::InMemoryEventBus;

    use crate::domain::entities::Product;
    use crate::domain::value_objects::StockQuantity;
    use crate::infrastructure::locking::InMemoryLockManager;
    use crate::infrastructure::persistence::InMemoryProductRepository;
    use crate::InventoryConfig;

    #[tokio::test]
    async fn test_sweeper_ticks_and_releases() {
        let repo = Arc::new(InMemoryProductRepository::new());
        let lock = Arc::new(InMemoryLockManager::new());
        let bus = Arc::new(InMemoryEventBus::new());

        let now = Utc::now();
        let mut product = Product::create(
            "Sample Roast",
            StockQuantity::of(10),
            StockQuantity::ZERO,
            now - chrono::Duration::hours(1),
        )
        .unwrap();
        product
            .reserve(
                StockQuantity::of(3),
                "ORD-1",
                chrono::Duration::minutes(5),
                now - chrono::Duration::hours(1),
            )
            .unwrap();
        let product_id = product.id();
        repo.seed(product);

        let use_case = Arc::new(ExpireReservationsUseCase::new(
            repo.clone(),
            lock,
            bus.clone(),
            InventoryConfig::default(),
        ));
        let handle = ReservationSweeper::new(use_case, Duration::from_millis(10)).spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(repo.get(product_id).unwrap().stock().available().value(), 10);
        assert_eq!(bus.published_of_type("StockReleased").len(), 1);
    }
}

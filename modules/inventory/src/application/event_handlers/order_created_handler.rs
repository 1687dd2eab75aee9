// OrderCreatedHandler - reserve stock for a newly placed order

use std::sync::Arc;

use events::{
    EventPublisher, OrderCreatedEvent, ProcessedEventStore, ORDER_CREATED_CHANNEL,
};
use tracing::{debug, info, warn};

use crate::application::dtos::commands::{BatchReserveCommand, BatchReserveItem};
use crate::application::event_handlers::InboundOutcome;
use crate::application::ports::LockManager;
use crate::application::use_cases::BatchReserveUseCase;
use crate::domain::repositories::ProductRepository;
use crate::domain::value_objects::{ProductId, StockQuantity};
use crate::InventoryError;

/// Handles `OrderCreated`: one atomic batch reservation per order.
///
/// Delivery is at-least-once, so the handler keeps a processed-set keyed
/// by `(channel, event_id)`. The set is written only after the
/// reservation outcome is committed and published; a crash in between
/// redelivers the event, and the idempotency of the use cases absorbs it.
pub struct OrderCreatedHandler<R, L, P, S>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
    S: ProcessedEventStore,
{
    batch_reserve: Arc<BatchReserveUseCase<R, L, P>>,
    processed: Arc<S>,
}

impl<R, L, P, S> OrderCreatedHandler<R, L, P, S>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
    S: ProcessedEventStore,
{
    pub fn new(batch_reserve: Arc<BatchReserveUseCase<R, L, P>>, processed: Arc<S>) -> Self {
        Self {
            batch_reserve,
            processed,
        }
    }

    /// # Errors
    /// Retriable infrastructure errors only; the caller nacks and the
    /// transport redelivers. Domain rejections resolve to
    /// [`InboundOutcome::Rejected`].
    pub async fn handle(&self, event: &OrderCreatedEvent) -> Result<InboundOutcome, InventoryError> {
        if self
            .processed
            .is_processed(ORDER_CREATED_CHANNEL, &event.event_id)
            .await?
        {
            debug!(
                event_id = %event.event_id,
                order_id = %event.order_id,
                "duplicate OrderCreated delivery skipped"
            );
            return Ok(InboundOutcome::Duplicate);
        }

        let items: Vec<BatchReserveItem> = event
            .items
            .iter()
            .map(|item| BatchReserveItem {
                product_id: ProductId::from_uuid(item.product_id),
                quantity: StockQuantity::of(item.quantity),
            })
            .collect();

        let command = BatchReserveCommand {
            order_id: event.order_id.clone(),
            items,
            atomic: true,
        };

        let outcome = match self.batch_reserve.execute(command).await {
            Ok(_) => {
                info!(order_id = %event.order_id, "order stock reserved");
                InboundOutcome::Processed
            }
            Err(err) if err.is_retriable() => return Err(err),
            Err(err) => {
                // The rejection event is already on the stream.
                warn!(order_id = %event.order_id, error = %err, "order rejected");
                InboundOutcome::Rejected
            }
        };

        self.processed
            .mark_processed(ORDER_CREATED_CHANNEL, &event.event_id)
            .await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use chrono::Utc;
    use events::{InMemoryEventBus, InMemoryProcessedEventStore, OrderItem};

    use crate::application::use_cases::{ReleaseReservationUseCase, ReserveStockUseCase};
    use crate::domain::entities::Product;
    use crate::infrastructure::locking::InMemoryLockManager;
    use crate::infrastructure::persistence::InMemoryProductRepository;
    use crate::InventoryConfig;

    type Handler = OrderCreatedHandler<
        InMemoryProductRepository,
        InMemoryLockManager,
        InMemoryEventBus,
        InMemoryProcessedEventStore,
    >;

    fn test_config() -> InventoryConfig {
        let mut config = InventoryConfig::default();
        config.lock.wait_timeout = StdDuration::from_millis(100);
        config.retry.backoff_base = StdDuration::from_millis(1);
        config
    }

    fn handler() -> (Arc<InMemoryProductRepository>, Arc<InMemoryEventBus>, Handler) {
        let repo = Arc::new(InMemoryProductRepository::new());
        let lock = Arc::new(InMemoryLockManager::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let reserve = Arc::new(ReserveStockUseCase::new(
            repo.clone(),
            lock.clone(),
            bus.clone(),
            test_config(),
        ));
        let release = Arc::new(ReleaseReservationUseCase::new(
            repo.clone(),
            lock,
            bus.clone(),
            test_config(),
        ));
        let batch = Arc::new(BatchReserveUseCase::new(reserve, release));
        let handler = OrderCreatedHandler::new(batch, Arc::new(InMemoryProcessedEventStore::new()));
        (repo, bus, handler)
    }

    fn seed_product(repo: &InMemoryProductRepository, total: u32) -> ProductId {
        let product = Product::create(
            "Aero Filter Cap",
            StockQuantity::of(total),
            StockQuantity::ZERO,
            Utc::now(),
        )
        .unwrap();
        let id = product.id();
        repo.seed(product);
        id
    }

    fn order_created(event_id: &str, order_id: &str, items: Vec<(ProductId, u32)>) -> OrderCreatedEvent {
        OrderCreatedEvent {
            event_id: event_id.to_string(),
            event_type: "OrderCreated".to_string(),
            order_id: order_id.to_string(),
            customer_id: Some("CUST-1".to_string()),
            items: items
                .into_iter()
                .map(|(product_id, quantity)| OrderItem {
                    product_id: product_id.into_uuid(),
                    quantity,
                })
                .collect(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_order_created_reserves_stock() {
        let (repo, bus, handler) = handler();
        let product_id = seed_product(&repo, 10);

        let outcome = handler
            .handle(&order_created("evt-1", "ORD-1", vec![(product_id, 3)]))
            .await
            .unwrap();

        assert_eq!(outcome, InboundOutcome::Processed);
        assert_eq!(repo.get(product_id).unwrap().stock().available().value(), 7);
        assert_eq!(bus.published_of_type("StockReserved").len(), 1);
    }

    #[tokio::test]
    async fn test_double_delivery_mutates_once() {
        let (repo, bus, handler) = handler();
        let product_id = seed_product(&repo, 10);
        let event = order_created("evt-1", "ORD-1", vec![(product_id, 3)]);

        let first = handler.handle(&event).await.unwrap();
        let second = handler.handle(&event).await.unwrap();

        assert_eq!(first, InboundOutcome::Processed);
        assert_eq!(second, InboundOutcome::Duplicate);
        let stored = repo.get(product_id).unwrap();
        assert_eq!(stored.stock().available().value(), 7);
        assert_eq!(stored.stock().reservation_count(), 1);
        assert_eq!(bus.published_of_type("StockReserved").len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_order_is_rejected_not_retried() {
        let (repo, bus, handler) = handler();
        let product_id = seed_product(&repo, 2);

        let outcome = handler
            .handle(&order_created("evt-1", "ORD-1", vec![(product_id, 5)]))
            .await
            .unwrap();

        assert_eq!(outcome, InboundOutcome::Rejected);
        assert_eq!(bus.published_of_type("InsufficientStock").len(), 1);
        assert_eq!(repo.get(product_id).unwrap().stock().available().value(), 2);

        // A redelivery after the rejection is deduplicated.
        let again = handler
            .handle(&order_created("evt-1", "ORD-1", vec![(product_id, 5)]))
            .await
            .unwrap();
        assert_eq!(again, InboundOutcome::Duplicate);
        assert_eq!(bus.published_of_type("InsufficientStock").len(), 1);
    }

    #[tokio::test]
    async fn test_atomic_rollback_spans_products() {
        let (repo, bus, handler) = handler();
        let p1 = seed_product(&repo, 10);
        let p2 = seed_product(&repo, 1);

        let outcome = handler
            .handle(&order_created("evt-9", "ORD-9", vec![(p1, 5), (p2, 2)]))
            .await
            .unwrap();

        assert_eq!(outcome, InboundOutcome::Rejected);
        assert_eq!(repo.get(p1).unwrap().stock().reservation_count(), 0);
        assert_eq!(repo.get(p2).unwrap().stock().reservation_count(), 0);
        assert_eq!(bus.published_of_type("InsufficientStock").len(), 1);
    }

    #[tokio::test]
    async fn test_retriable_failure_leaves_event_unmarked() {
        let (repo, _bus, handler) = handler();
        let product_id = seed_product(&repo, 10);
        repo.fail_next_updates(10);

        let event = order_created("evt-1", "ORD-1", vec![(product_id, 3)]);
        let result = handler.handle(&event).await;
        assert!(result.is_err());

        // After the transient failure clears, the same delivery succeeds.
        let outcome = handler.handle(&event).await.unwrap();
        assert_eq!(outcome, InboundOutcome::Processed);
        assert_eq!(repo.get(product_id).unwrap().stock().available().value(), 7);
    }
}

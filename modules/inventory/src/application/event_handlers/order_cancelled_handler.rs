// OrderCancelledHandler - return a cancelled order's holds to stock

use std::sync::Arc;

use events::{EventPublisher, OrderCancelledEvent};
use tracing::info;

use crate::application::dtos::commands::ReleaseOrderCommand;
use crate::application::event_handlers::InboundOutcome;
use crate::application::ports::LockManager;
use crate::application::use_cases::ReleaseOrderUseCase;
use crate::domain::repositories::ProductRepository;
use crate::domain::value_objects::ReleaseReason;
use crate::InventoryError;

/// Handles `OrderCancelled`: releases every reservation of the order.
///
/// No processed-set is needed — releasing an already-released reservation
/// is a no-op, so the handler is idempotent by construction and safe to
/// redeliver any number of times.
pub struct OrderCancelledHandler<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    release_order: Arc<ReleaseOrderUseCase<R, L, P>>,
}

impl<R, L, P> OrderCancelledHandler<R, L, P>
where
    R: ProductRepository,
    L: LockManager,
    P: EventPublisher,
{
    pub fn new(release_order: Arc<ReleaseOrderUseCase<R, L, P>>) -> Self {
        Self { release_order }
    }

    /// # Errors
    /// Retriable infrastructure errors only; redelivery resumes where the
    /// failed pass stopped.
    pub async fn handle(
        &self,
        event: &OrderCancelledEvent,
    ) -> Result<InboundOutcome, InventoryError> {
        let response = self
            .release_order
            .execute(ReleaseOrderCommand {
                order_id: event.order_id.clone(),
                reason: ReleaseReason::OrderCancelled,
            })
            .await?;

        info!(
            order_id = %event.order_id,
            released = response.released.iter().filter(|r| r.was_released()).count(),
            reason = event.reason.as_deref().unwrap_or("unspecified"),
            "order cancellation handled"
        );
        Ok(InboundOutcome::Processed)
    }
}

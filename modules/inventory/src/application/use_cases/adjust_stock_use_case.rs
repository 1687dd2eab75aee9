// AdjustStockUseCase - stock changes outside the reservation protocol

use std::sync::Arc;

use chrono::Utc;
use events::EventPublisher;
use tracing::info;

use crate::application::dtos::commands::{AdjustStockCommand, StockAdjustment};
use crate::application::dtos::responses::AdjustResponse;
use crate::application::ports::{product_lock_key, with_lock, LockManager};
use crate::application::use_cases::support::{conflict_backoff, publish_events};
use crate::config::InventoryConfig;
use crate::domain::repositories::ProductRepository;
use crate::InventoryError;

/// Use case for receiving goods, writing off losses, and recount
/// corrections. Emits `StockAdjusted` with the signed delta.
pub struct AdjustStockUseCase<R, L, P>
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

impl<R, L, P> AdjustStockUseCase<R, L, P>
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

    /// Executes the use case to adjust a product's stock
    ///
    /// # Errors
    /// * `InventoryError::ProductNotFound` - unknown product id
    /// * `InventoryError::ProductInactive` - write-off on inactive product
    /// * `InventoryError::InsufficientStock` - write-off beyond available
    /// * `InventoryError::AdjustmentTooLow` - recount below reserved
    /// * `InventoryError::Conflict` - version conflicts exhausted retries
    pub async fn execute(&self, command: AdjustStockCommand) -> Result<AdjustResponse, InventoryError> {
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
                || self.adjust_once(&command),
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

    async fn adjust_once(&self, command: &AdjustStockCommand) -> Result<AdjustResponse, InventoryError> {
        let now = Utc::now();
        let mut product = self
            .repo
            .find_by_id(command.product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(
                command.product_id.into_uuid(),
            ))?;

        let expected_version = product.version();
        match &command.adjustment {
            StockAdjustment::Receive(quantity) => {
                product.add_stock(*quantity, &command.reason, now)?;
            }
            StockAdjustment::WriteOff(quantity) => {
                product.deduct_direct(*quantity, &command.reason, now)?;
            }
            StockAdjustment::SetTotal(new_total) => {
                product.adjust_total(*new_total, &command.reason, now)?;
            }
        }

        let response = AdjustResponse {
            product_id: command.product_id,
            available: product.stock().available(),
            new_total: product.stock().total(),
        };

        self.repo
            .update_with_version(&product, expected_version)
            .await?;
        publish_events(self.publisher.as_ref(), product.drain_events()).await;

        info!(
            product_id = %command.product_id,
            reason = %command.reason,
            new_total = %response.new_total,
            "stock adjusted"
        );
        Ok(response)
    }
}

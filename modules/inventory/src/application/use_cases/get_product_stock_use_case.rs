// GetProductStockUseCase - read-side stock lookup

use std::sync::Arc;

use crate::application::dtos::responses::{ReservationSummary, StockResponse};
use crate::domain::entities::Product;
use crate::domain::repositories::ProductRepository;
use crate::domain::value_objects::ProductId;
use crate::InventoryError;

/// Use case for reading a product's stock levels and live reservations.
pub struct GetProductStockUseCase<R>
where
    R: ProductRepository,
{
    repo: Arc<R>,
}

impl<R> GetProductStockUseCase<R>
where
    R: ProductRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// # Errors
    /// * `InventoryError::ProductNotFound` - unknown product id
    pub async fn execute(&self, product_id: ProductId) -> Result<StockResponse, InventoryError> {
        let product = self
            .repo
            .find_by_id(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id.into_uuid()))?;
        Ok(to_response(&product))
    }

    /// Batch lookup; unknown ids are simply absent from the result.
    pub async fn execute_many(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<StockResponse>, InventoryError> {
        let products = self.repo.find_batch(product_ids).await?;
        let mut responses: Vec<StockResponse> = products.values().map(to_response).collect();
        responses.sort_by_key(|r| r.product_id.into_uuid());
        Ok(responses)
    }
}

fn to_response(product: &Product) -> StockResponse {
    let mut reservations: Vec<ReservationSummary> = product
        .stock()
        .reservations()
        .values()
        .map(|r| ReservationSummary {
            reservation_id: r.id(),
            order_id: r.order_id().to_string(),
            quantity: r.quantity(),
            expires_at: r.expires_at(),
        })
        .collect();
    reservations.sort_by_key(|r| r.expires_at);

    StockResponse {
        product_id: product.id(),
        name: product.name().to_string(),
        active: product.is_active(),
        available: product.stock().available(),
        reserved: product.stock().reserved(),
        total: product.stock().total(),
        low_stock_threshold: product.low_stock_threshold(),
        version: product.version(),
        reservations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::domain::value_objects::StockQuantity;
    use crate::infrastructure::persistence::InMemoryProductRepository;

    #[tokio::test]
    async fn test_lookup_includes_live_reservations() {
        let repo = Arc::new(InMemoryProductRepository::new());
        let mut product = Product::create(
            "Drip Scale",
            StockQuantity::of(10),
            StockQuantity::of(2),
            Utc::now(),
        )
        .unwrap();
        let reservation_id = product
            .reserve(StockQuantity::of(4), "ORD-1", Duration::minutes(30), Utc::now())
            .unwrap();
        let product_id = product.id();
        repo.seed(product);

        let uc = GetProductStockUseCase::new(repo);
        let response = uc.execute(product_id).await.unwrap();

        assert_eq!(response.available.value(), 6);
        assert_eq!(response.reserved.value(), 4);
        assert_eq!(response.total.value(), 10);
        assert_eq!(response.reservations.len(), 1);
        assert_eq!(response.reservations[0].reservation_id, reservation_id);
        assert_eq!(response.reservations[0].order_id, "ORD-1");
    }

    #[tokio::test]
    async fn test_unknown_product_errors() {
        let repo = Arc::new(InMemoryProductRepository::new());
        let uc = GetProductStockUseCase::new(repo);

        let result = uc.execute(ProductId::new()).await;
        assert!(matches!(result, Err(InventoryError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_batch_lookup_skips_unknown_ids() {
        let repo = Arc::new(InMemoryProductRepository::new());
        let product = Product::create(
            "Burr Set",
            StockQuantity::of(3),
            StockQuantity::ZERO,
            Utc::now(),
        )
        .unwrap();
        let known = product.id();
        repo.seed(product);

        let uc = GetProductStockUseCase::new(repo);
        let responses = uc.execute_many(&[known, ProductId::new()]).await.unwrap();

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].product_id, known);
    }
}

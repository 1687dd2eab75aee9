// ProductRepository trait - aggregate persistence with optimistic versioning

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::entities::Product;
use crate::domain::value_objects::{ProductId, ReservationId};
use crate::InventoryError;

/// One page of a cursor scan over products.
///
/// Ordering is unspecified but stable within a cursor; `next_cursor` is
/// `None` on the last page.
#[derive(Debug, Clone, Default)]
pub struct ProductPage {
    pub items: Vec<ProductId>,
    pub next_cursor: Option<ProductId>,
}

/// Persistence port for the Product aggregate.
///
/// A save is atomic over the whole aggregate (product row and reservation
/// table together); if it fails, the caller must not publish the events of
/// that mutation.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Persists a brand-new product (seed/import path).
    async fn insert(&self, product: &Product) -> Result<(), InventoryError>;

    /// Loads a product aggregate with all its live reservations.
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, InventoryError>;

    /// Loads several aggregates at once; absent ids are simply missing
    /// from the result map.
    async fn find_batch(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, InventoryError>;

    /// Persists a mutated aggregate.
    ///
    /// # Errors
    /// * `InventoryError::OptimisticConflict` - a concurrent writer
    ///   advanced the version past `expected_version` since load
    async fn update_with_version(
        &self,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), InventoryError>;

    /// Pages through active products that currently hold reservations;
    /// used by the expiry sweeper.
    async fn find_active_with_reservations(
        &self,
        limit: u32,
        cursor: Option<ProductId>,
    ) -> Result<ProductPage, InventoryError>;

    /// The reservation → product index required by deduct and release.
    async fn find_product_by_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<ProductId>, InventoryError>;

    /// Every live reservation backing `order_id`, across products.
    async fn find_reservations_by_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<(ProductId, ReservationId)>, InventoryError>;
}

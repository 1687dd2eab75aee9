// In-memory ProductRepository - single-process binding for tests and local runs

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::Product;
use crate::domain::repositories::{ProductPage, ProductRepository};
use crate::domain::value_objects::{ProductId, ReservationId};
use crate::InventoryError;

// Cursor scans walk the underlying uuid, mirroring the SQL binding's
// ORDER BY on the id column; ProductId itself stays unordered.
fn scan_key(id: ProductId) -> Uuid {
    id.into_uuid()
}

/// Hash-map repository with the same optimistic-version contract as the
/// PostgreSQL binding.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: Mutex<HashMap<ProductId, Product>>,
    injected_conflicts: Mutex<u32>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product directly, bypassing the trait (test setup).
    pub fn seed(&self, product: Product) {
        self.store(product);
    }

    /// Reads a product back without going through the trait (assertions).
    pub fn get(&self, id: ProductId) -> Option<Product> {
        self.products.lock().expect("product table poisoned").get(&id).cloned()
    }

    /// Makes the next `n` versioned updates fail with a conflict.
    pub fn fail_next_updates(&self, n: u32) {
        *self.injected_conflicts.lock().expect("conflict counter poisoned") = n;
    }

    fn store(&self, product: Product) {
        // Pending events are never persisted; drop them from the stored copy.
        let mut stored = product;
        stored.drain_events();
        self.products
            .lock()
            .expect("product table poisoned")
            .insert(stored.id(), stored);
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn insert(&self, product: &Product) -> Result<(), InventoryError> {
        self.store(product.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, InventoryError> {
        Ok(self.get(id))
    }

    async fn find_batch(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, InventoryError> {
        let products = self.products.lock().expect("product table poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn update_with_version(
        &self,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), InventoryError> {
        {
            let mut injected = self.injected_conflicts.lock().expect("conflict counter poisoned");
            if *injected > 0 {
                *injected -= 1;
                return Err(InventoryError::OptimisticConflict);
            }
        }

        let current_version = {
            let products = self.products.lock().expect("product table poisoned");
            let existing = products
                .get(&product.id())
                .ok_or(InventoryError::ProductNotFound(product.id().into_uuid()))?;
            existing.version()
        };

        if current_version != expected_version {
            return Err(InventoryError::OptimisticConflict);
        }

        self.store(product.clone());
        Ok(())
    }

    async fn find_active_with_reservations(
        &self,
        limit: u32,
        cursor: Option<ProductId>,
    ) -> Result<ProductPage, InventoryError> {
        let products = self.products.lock().expect("product table poisoned");
        let mut ids: Vec<ProductId> = products
            .values()
            .filter(|p| p.is_active() && p.stock().reservation_count() > 0)
            .map(Product::id)
            .filter(|id| cursor.is_none_or(|c| scan_key(*id) > scan_key(c)))
            .collect();
        ids.sort_by_key(|id| scan_key(*id));
        ids.truncate(limit as usize);

        let next_cursor = if ids.len() == limit as usize {
            ids.last().copied()
        } else {
            None
        };

        Ok(ProductPage {
            items: ids,
            next_cursor,
        })
    }

    async fn find_product_by_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<ProductId>, InventoryError> {
        let products = self.products.lock().expect("product table poisoned");
        Ok(products
            .values()
            .find(|p| p.stock().reservation(reservation_id).is_some())
            .map(Product::id))
    }

    async fn find_reservations_by_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<(ProductId, ReservationId)>, InventoryError> {
        let products = self.products.lock().expect("product table poisoned");
        let mut pairs: Vec<(ProductId, ReservationId)> = products
            .values()
            .flat_map(|p| {
                p.stock()
                    .reservations()
                    .values()
                    .filter(|r| r.order_id() == order_id)
                    .map(|r| (p.id(), r.id()))
                    .collect::<Vec<_>>()
            })
            .collect();
        pairs.sort_by_key(|(product_id, _)| scan_key(*product_id));
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::StockQuantity;
    use chrono::{Duration, Utc};

    fn product(total: u32) -> Product {
        Product::create(
            "Test Product",
            StockQuantity::of(total),
            StockQuantity::ZERO,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let repo = InMemoryProductRepository::new();
        let mut p = product(10);
        let id = p.id();
        repo.seed(p.clone());

        let stale_version = p.version();
        p.add_stock(StockQuantity::of(1), "restock", Utc::now()).unwrap();
        repo.update_with_version(&p, stale_version).await.unwrap();

        // Second writer still holds the old version.
        let mut stale = repo.get(id).unwrap();
        stale.add_stock(StockQuantity::of(1), "restock", Utc::now()).unwrap();
        let result = repo.update_with_version(&stale, stale_version).await;
        assert!(matches!(result, Err(InventoryError::OptimisticConflict)));
    }

    #[tokio::test]
    async fn test_pending_events_are_not_persisted() {
        let repo = InMemoryProductRepository::new();
        let mut p = product(10);
        p.reserve(StockQuantity::of(1), "ORD-1", Duration::minutes(30), Utc::now())
            .unwrap();
        let id = p.id();
        repo.seed(p);

        assert_eq!(repo.get(id).unwrap().pending_event_count(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_scan_pages_in_stable_order() {
        let repo = InMemoryProductRepository::new();
        let mut seeded = Vec::new();
        for _ in 0..5 {
            let mut p = product(10);
            p.reserve(StockQuantity::of(1), "ORD-1", Duration::minutes(30), Utc::now())
                .unwrap();
            seeded.push(p.id());
            repo.seed(p);
        }
        // One product without reservations must not appear.
        repo.seed(product(10));
        seeded.sort_by_key(|id| scan_key(*id));

        let mut scanned = Vec::new();
        let mut cursor = None;
        loop {
            let page = repo.find_active_with_reservations(2, cursor).await.unwrap();
            scanned.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(scanned, seeded);
    }

    #[tokio::test]
    async fn test_reservation_index_lookups() {
        let repo = InMemoryProductRepository::new();
        let mut p = product(10);
        let rid = p
            .reserve(StockQuantity::of(2), "ORD-7", Duration::minutes(30), Utc::now())
            .unwrap();
        let pid = p.id();
        repo.seed(p);

        assert_eq!(
            repo.find_product_by_reservation(rid).await.unwrap(),
            Some(pid)
        );
        assert_eq!(
            repo.find_reservations_by_order("ORD-7").await.unwrap(),
            vec![(pid, rid)]
        );
        assert!(repo
            .find_reservations_by_order("ORD-other")
            .await
            .unwrap()
            .is_empty());
    }
}

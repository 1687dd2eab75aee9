// PostgreSQL ProductRepository - versioned aggregate persistence

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{Product, Reservation, Stock};
use crate::domain::repositories::{ProductPage, ProductRepository};
use crate::domain::value_objects::{ProductId, ReservationId, StockQuantity};
use crate::InventoryError;

/// PostgreSQL implementation of ProductRepository.
///
/// The aggregate maps to a `products` row plus `stock_reservations` child
/// rows. A versioned save updates the row guarded by `version` and
/// rewrites the child rows in the same transaction; the product lock keeps
/// the rewrite single-writer, the version catches anything that slips by.
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_reservations(
        &self,
        product_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<ReservationRow>>, InventoryError> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, product_id, quantity, order_id, reserved_at, expires_at
            FROM stock_reservations
            WHERE product_id = ANY($1)
            "#,
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_product: HashMap<Uuid, Vec<ReservationRow>> = HashMap::new();
        for row in rows {
            by_product.entry(row.product_id).or_default().push(row);
        }
        Ok(by_product)
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn insert(&self, product: &Product) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, available, reserved, total, version,
                low_stock_threshold, active, event_seq, created_at, last_modified_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id().into_uuid())
        .bind(product.name())
        .bind(product.stock().available().as_i64())
        .bind(product.stock().reserved().as_i64())
        .bind(product.stock().total().as_i64())
        .bind(product.version() as i64)
        .bind(product.low_stock_threshold().as_i64())
        .bind(product.is_active())
        .bind(product.event_seq() as i64)
        .bind(product.created_at())
        .bind(product.last_modified_at())
        .execute(&mut *tx)
        .await?;

        for reservation in product.stock().reservations().values() {
            insert_reservation(&mut tx, product.id(), reservation).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, InventoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, available, reserved, total, version,
                   low_stock_threshold, active, event_seq, created_at, last_modified_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut reservations = self.load_reservations(&[row.id]).await?;
        let rows = reservations.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_product(rows)?))
    }

    async fn find_batch(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, InventoryError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.into_uuid()).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, available, reserved, total, version,
                   low_stock_threshold, active, event_seq, created_at, last_modified_at
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;

        let mut reservations = self.load_reservations(&uuids).await?;
        let mut products = HashMap::with_capacity(rows.len());
        for row in rows {
            let reservation_rows = reservations.remove(&row.id).unwrap_or_default();
            let product = row.into_product(reservation_rows)?;
            products.insert(product.id(), product);
        }
        Ok(products)
    }

    async fn update_with_version(
        &self,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, available = $3, reserved = $4, total = $5, version = $6,
                low_stock_threshold = $7, active = $8, event_seq = $9, last_modified_at = $10
            WHERE id = $1 AND version = $11
            "#,
        )
        .bind(product.id().into_uuid())
        .bind(product.name())
        .bind(product.stock().available().as_i64())
        .bind(product.stock().reserved().as_i64())
        .bind(product.stock().total().as_i64())
        .bind(product.version() as i64)
        .bind(product.low_stock_threshold().as_i64())
        .bind(product.is_active())
        .bind(product.event_seq() as i64)
        .bind(product.last_modified_at())
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InventoryError::OptimisticConflict);
        }

        sqlx::query("DELETE FROM stock_reservations WHERE product_id = $1")
            .bind(product.id().into_uuid())
            .execute(&mut *tx)
            .await?;
        for reservation in product.stock().reservations().values() {
            insert_reservation(&mut tx, product.id(), reservation).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_active_with_reservations(
        &self,
        limit: u32,
        cursor: Option<ProductId>,
    ) -> Result<ProductPage, InventoryError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT p.id
            FROM products p
            WHERE p.active
              AND EXISTS (SELECT 1 FROM stock_reservations r WHERE r.product_id = p.id)
              AND ($1::uuid IS NULL OR p.id > $1)
            ORDER BY p.id
            LIMIT $2
            "#,
        )
        .bind(cursor.map(ProductId::into_uuid))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<ProductId> = ids.into_iter().map(ProductId::from_uuid).collect();
        let next_cursor = if items.len() == limit as usize {
            items.last().copied()
        } else {
            None
        };

        Ok(ProductPage { items, next_cursor })
    }

    async fn find_product_by_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<ProductId>, InventoryError> {
        let product_id: Option<Uuid> =
            sqlx::query_scalar("SELECT product_id FROM stock_reservations WHERE id = $1")
                .bind(reservation_id.into_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(product_id.map(ProductId::from_uuid))
    }

    async fn find_reservations_by_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<(ProductId, ReservationId)>, InventoryError> {
        let pairs: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT product_id, id
            FROM stock_reservations
            WHERE order_id = $1
            ORDER BY product_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pairs
            .into_iter()
            .map(|(product_id, reservation_id)| {
                (
                    ProductId::from_uuid(product_id),
                    ReservationId::from_uuid(reservation_id),
                )
            })
            .collect())
    }
}

async fn insert_reservation(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: ProductId,
    reservation: &Reservation,
) -> Result<(), InventoryError> {
    sqlx::query(
        r#"
        INSERT INTO stock_reservations (id, product_id, quantity, order_id, reserved_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(reservation.id().into_uuid())
    .bind(product_id.into_uuid())
    .bind(reservation.quantity().as_i64())
    .bind(reservation.order_id())
    .bind(reservation.reserved_at())
    .bind(reservation.expires_at())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    available: i64,
    reserved: i64,
    total: i64,
    version: i64,
    low_stock_threshold: i64,
    active: bool,
    event_seq: i64,
    created_at: DateTime<Utc>,
    last_modified_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, reservation_rows: Vec<ReservationRow>) -> Result<Product, InventoryError> {
        let mut reservations = HashMap::with_capacity(reservation_rows.len());
        for row in reservation_rows {
            let reservation = Reservation::reconstitute(
                ReservationId::from_uuid(row.id),
                StockQuantity::from_i64(row.quantity)?,
                row.order_id,
                row.reserved_at,
                row.expires_at,
            );
            reservations.insert(reservation.id(), reservation);
        }

        let stock = Stock::reconstitute(
            StockQuantity::from_i64(self.available)?,
            StockQuantity::from_i64(self.reserved)?,
            StockQuantity::from_i64(self.total)?,
            reservations,
            self.version as u64,
            self.last_modified_at,
        )?;

        Product::reconstitute(
            ProductId::from_uuid(self.id),
            self.name,
            stock,
            StockQuantity::from_i64(self.low_stock_threshold)?,
            self.active,
            self.created_at,
            self.last_modified_at,
            self.event_seq as u64,
        )
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i64,
    order_id: String,
    reserved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

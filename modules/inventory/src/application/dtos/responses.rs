// Response DTOs - outputs of the use cases

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{ProductId, ReservationId, StockQuantity};

/// A successful single-product reservation.
#[derive(Debug, Clone)]
pub struct ReservationResponse {
    pub reservation_id: ReservationId,
    pub product_id: ProductId,
    pub order_id: String,
    pub quantity: StockQuantity,
    pub available_after: StockQuantity,
    pub expires_at: DateTime<Utc>,
}

/// Per-item outcome of a non-atomic batch reservation.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Reserved(ReservationResponse),
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct ItemReserveResult {
    pub product_id: ProductId,
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone)]
pub struct BatchReserveResponse {
    pub order_id: String,
    pub results: Vec<ItemReserveResult>,
}

impl BatchReserveResponse {
    pub fn all_reserved(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.outcome, ItemOutcome::Reserved(_)))
    }

    pub fn reservations(&self) -> impl Iterator<Item = &ReservationResponse> {
        self.results.iter().filter_map(|r| match &r.outcome {
            ItemOutcome::Reserved(response) => Some(response),
            ItemOutcome::Failed { .. } => None,
        })
    }
}

/// Outcome of releasing one reservation.
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    Released {
        product_id: ProductId,
        quantity: StockQuantity,
        available_after: StockQuantity,
    },
    /// The reservation was already gone; releasing twice is a no-op.
    AlreadyReleased,
}

#[derive(Debug, Clone)]
pub struct ReleaseResponse {
    pub reservation_id: ReservationId,
    pub outcome: ReleaseOutcome,
}

impl ReleaseResponse {
    pub fn was_released(&self) -> bool {
        matches!(self.outcome, ReleaseOutcome::Released { .. })
    }
}

/// A non-retriable per-item failure inside a batch release.
#[derive(Debug, Clone)]
pub struct ReleaseFailure {
    pub reservation_id: ReservationId,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ReleaseOrderResponse {
    pub order_id: String,
    pub released: Vec<ReleaseResponse>,
    pub failed: Vec<ReleaseFailure>,
}

/// A consumed reservation.
#[derive(Debug, Clone)]
pub struct DeductResponse {
    pub product_id: ProductId,
    pub reservation_id: ReservationId,
    pub quantity: StockQuantity,
    pub total_after: StockQuantity,
}

#[derive(Debug, Clone)]
pub struct AdjustResponse {
    pub product_id: ProductId,
    pub available: StockQuantity,
    pub new_total: StockQuantity,
}

/// A live reservation as seen through the query side.
#[derive(Debug, Clone)]
pub struct ReservationSummary {
    pub reservation_id: ReservationId,
    pub order_id: String,
    pub quantity: StockQuantity,
    pub expires_at: DateTime<Utc>,
}

/// Read model of one product's stock.
#[derive(Debug, Clone)]
pub struct StockResponse {
    pub product_id: ProductId,
    pub name: String,
    pub active: bool,
    pub available: StockQuantity,
    pub reserved: StockQuantity,
    pub total: StockQuantity,
    pub low_stock_threshold: StockQuantity,
    pub version: u64,
    pub reservations: Vec<ReservationSummary>,
}

/// Tallies of one expired-reservation sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub products_scanned: usize,
    pub products_swept: usize,
    pub products_skipped: usize,
    pub reservations_released: usize,
    pub errors: Vec<String>,
}

// Command DTOs - inputs to the use cases

use chrono::Duration;

use crate::domain::value_objects::{ProductId, ReleaseReason, ReservationId, StockQuantity};

/// Reserve stock on one product for an order.
#[derive(Debug, Clone)]
pub struct ReserveStockCommand {
    pub product_id: ProductId,
    pub quantity: StockQuantity,
    pub order_id: String,
    /// Overrides the configured default reservation TTL when set.
    pub ttl: Option<Duration>,
}

/// One line of a batch reservation.
#[derive(Debug, Clone)]
pub struct BatchReserveItem {
    pub product_id: ProductId,
    pub quantity: StockQuantity,
}

/// Reserve stock across products for one order.
///
/// With `atomic` set, a failing item rolls back every reservation the
/// batch made before it.
#[derive(Debug, Clone)]
pub struct BatchReserveCommand {
    pub order_id: String,
    pub items: Vec<BatchReserveItem>,
    pub atomic: bool,
}

/// Consume a reservation after payment confirmation.
#[derive(Debug, Clone)]
pub struct DeductStockCommand {
    pub reservation_id: ReservationId,
    pub order_id: String,
}

/// Return one reservation to available stock.
#[derive(Debug, Clone)]
pub struct ReleaseReservationCommand {
    pub reservation_id: ReservationId,
    pub order_id: String,
    pub reason: ReleaseReason,
}

/// Release every reservation held for an order.
#[derive(Debug, Clone)]
pub struct ReleaseOrderCommand {
    pub order_id: String,
    pub reason: ReleaseReason,
}

/// What an adjustment does to the stock level.
#[derive(Debug, Clone)]
pub enum StockAdjustment {
    /// Goods received: adds to available and total.
    Receive(StockQuantity),
    /// Damage/shrinkage: removes from available and total.
    WriteOff(StockQuantity),
    /// Recount: sets the absolute total.
    SetTotal(StockQuantity),
}

/// Adjust a product's stock outside the reservation protocol.
#[derive(Debug, Clone)]
pub struct AdjustStockCommand {
    pub product_id: ProductId,
    pub adjustment: StockAdjustment,
    pub reason: String,
}

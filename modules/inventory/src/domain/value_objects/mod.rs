// Domain value objects for the inventory core

// ID value objects
mod product_id;
mod reservation_id;

// Quantity arithmetic
mod stock_quantity;

// Enum value objects
mod insufficient_reason;
mod release_reason;

pub use insufficient_reason::InsufficientReason;
pub use product_id::ProductId;
pub use release_reason::ReleaseReason;
pub use reservation_id::ReservationId;
pub use stock_quantity::StockQuantity;

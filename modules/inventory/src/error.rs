// Inventory module errors

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InventoryError {
    // Value construction errors
    #[error("Illegal quantity: {0}")]
    IllegalQuantity(i64),

    #[error("Product name must not be empty")]
    InvalidProductName,

    #[error("Reservation quantity must be non-zero")]
    EmptyReservation,

    #[error("Reservation TTL must be positive")]
    InvalidTtl,

    // Stock errors
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("Reservation already exists: {0}")]
    DuplicateReservation(Uuid),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(Uuid),

    #[error("Reservation is not valid for deduction: {0}")]
    ReservationInvalid(Uuid),

    #[error("New total {new_total} is below reserved quantity {reserved}")]
    AdjustmentTooLow { new_total: u32, reserved: u32 },

    #[error("Stock invariant violated: available {available} + reserved {reserved} != total {total}")]
    InvariantViolation {
        available: u32,
        reserved: u32,
        total: u32,
    },

    // Product errors
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Product is inactive: {0}")]
    ProductInactive(Uuid),

    // Concurrency errors
    #[error("Optimistic version conflict: product was modified by another process")]
    OptimisticConflict,

    #[error("Version conflict persisted after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("Could not acquire lock '{key}': {reason}")]
    LockAcquisition { key: String, reason: String },

    #[error("Lock backend failure: {0}")]
    LockBackend(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Event publish failed: {0}")]
    EventPublish(#[from] events::PublishError),

    #[error("Processed-event store failure: {0}")]
    Dedup(#[from] events::DedupError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration for {key}: {reason}")]
    Configuration { key: String, reason: String },
}

impl InventoryError {
    /// Whether redelivering the triggering message may succeed.
    ///
    /// Domain rejections (insufficient stock, inactive product, invalid
    /// reservation) are final; infrastructure hiccups are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            InventoryError::OptimisticConflict
            | InventoryError::Conflict { .. }
            | InventoryError::LockAcquisition { .. }
            | InventoryError::LockBackend(_)
            | InventoryError::Database(_)
            | InventoryError::Dedup(_) => true,
            InventoryError::EventPublish(e) => e.is_transient(),
            _ => false,
        }
    }
}

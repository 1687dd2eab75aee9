// InsufficientReason enum - why a reservation request was rejected

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why an `InsufficientStock` event was emitted for an order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsufficientReason {
    /// Requested more than the available quantity.
    Insufficient,
    /// The product exists but is deactivated.
    Inactive,
    /// No product with the requested id.
    ProductNotFound,
}

impl fmt::Display for InsufficientReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsufficientReason::Insufficient => write!(f, "INSUFFICIENT"),
            InsufficientReason::Inactive => write!(f, "INACTIVE"),
            InsufficientReason::ProductNotFound => write!(f, "PRODUCT_NOT_FOUND"),
        }
    }
}

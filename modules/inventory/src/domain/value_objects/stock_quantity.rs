// StockQuantity value object - non-negative quantity arithmetic

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::InventoryError;

/// A non-negative stock quantity.
///
/// Subtraction is checked and returns `None` on underflow, so a quantity
/// can never go negative. Zero is a valid quantity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StockQuantity(u32);

impl StockQuantity {
    pub const ZERO: StockQuantity = StockQuantity(0);

    pub fn of(value: u32) -> Self {
        Self(value)
    }

    /// Builds a quantity from a signed integer, rejecting negatives and
    /// values beyond the 32-bit range.
    pub fn from_i64(value: i64) -> Result<Self, InventoryError> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| InventoryError::IllegalQuantity(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn add(self, other: StockQuantity) -> StockQuantity {
        Self(self.0.saturating_add(other.0))
    }

    /// Checked subtraction; `None` if the result would be negative.
    pub fn checked_sub(self, other: StockQuantity) -> Option<StockQuantity> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for StockQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_of_and_value() {
        assert_eq!(StockQuantity::of(7).value(), 7);
        assert_eq!(StockQuantity::ZERO.value(), 0);
        assert!(StockQuantity::ZERO.is_zero());
        assert!(!StockQuantity::of(1).is_zero());
    }

    #[test]
    fn test_from_i64_rejects_negative() {
        assert!(StockQuantity::from_i64(10).is_ok());
        assert!(StockQuantity::from_i64(0).is_ok());

        let result = StockQuantity::from_i64(-1);
        assert!(matches!(result, Err(InventoryError::IllegalQuantity(-1))));
    }

    #[test]
    fn test_from_i64_rejects_out_of_range() {
        let too_big = i64::from(u32::MAX) + 1;
        assert!(matches!(
            StockQuantity::from_i64(too_big),
            Err(InventoryError::IllegalQuantity(_))
        ));
    }

    #[test]
    fn test_add() {
        let sum = StockQuantity::of(3).add(StockQuantity::of(4));
        assert_eq!(sum, StockQuantity::of(7));
    }

    #[test]
    fn test_checked_sub() {
        let left = StockQuantity::of(5);
        assert_eq!(left.checked_sub(StockQuantity::of(2)), Some(StockQuantity::of(3)));
        assert_eq!(left.checked_sub(StockQuantity::of(5)), Some(StockQuantity::ZERO));
        assert_eq!(left.checked_sub(StockQuantity::of(6)), None);
    }

    #[test]
    fn test_ordering() {
        assert!(StockQuantity::of(2) < StockQuantity::of(3));
        assert!(StockQuantity::of(3) <= StockQuantity::of(3));
    }
}

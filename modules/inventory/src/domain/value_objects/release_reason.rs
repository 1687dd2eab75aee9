// ReleaseReason enum - why a reservation was returned to available stock

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a reservation was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseReason {
    /// The backing order was cancelled.
    OrderCancelled,
    /// The reservation outlived its TTL and was swept.
    Expired,
    /// Operator or compensating action.
    Manual,
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseReason::OrderCancelled => write!(f, "ORDER_CANCELLED"),
            ReleaseReason::Expired => write!(f, "EXPIRED"),
            ReleaseReason::Manual => write!(f, "MANUAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_string(&ReleaseReason::OrderCancelled).unwrap(),
            "\"ORDER_CANCELLED\""
        );
        assert_eq!(serde_json::to_string(&ReleaseReason::Expired).unwrap(), "\"EXPIRED\"");
    }

    #[test]
    fn test_display_matches_wire_format() {
        assert_eq!(ReleaseReason::Manual.to_string(), "MANUAL");
    }
}

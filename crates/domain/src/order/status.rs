//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──► Shipped ──► Delivered
///    │            │             │
///    └────────────┴─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order was placed and is waiting for staff to pick it up.
    #[default]
    Pending,

    /// Staff are preparing the order.
    Processing,

    /// Order has left the warehouse.
    Shipped,

    /// Order reached the customer (terminal state).
    Delivered,

    /// Order was cancelled and its stock restored (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order may move from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Processing | Shipped, Cancelled)
        )
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

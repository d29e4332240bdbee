//! Domain error types.

use common::OrderId;
use thiserror::Error;

use crate::catalog::VariantId;
use crate::order::OrderStatus;

/// Business-rule failures for placing and progressing orders.
///
/// Every variant is safe to show to the caller; none carries storage
/// details.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The request contained no line items.
    #[error("Order has no items")]
    EmptyOrder,

    /// A requested quantity was zero.
    #[error("Invalid quantity {quantity} for variant {variant_id} (must be greater than 0)")]
    InvalidQuantity { variant_id: VariantId, quantity: u32 },

    /// The referenced variant does not exist.
    #[error("Variant not found: {0}")]
    VariantNotFound(VariantId),

    /// The variant exists but is not currently purchasable.
    #[error("Variant {0} is not available for purchase")]
    UnavailableVariant(VariantId),

    /// The requested quantity exceeds live stock.
    #[error(
        "Only {available} items available in stock for variant {variant_id} (requested {requested})"
    )]
    InsufficientStock {
        variant_id: VariantId,
        available: u32,
        requested: u32,
    },

    /// A line subtotal or the order total does not fit the money type.
    #[error("Order total is too large")]
    AmountOverflow,

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested status change is not allowed by the order state machine.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
}

//! Checkout error types.

use domain::OrderError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the checkout services.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The unit of work could not complete (contention, lost connection,
    /// timeout). Nothing was persisted and the request may be retried.
    #[error("Transaction failed, please retry")]
    TransactionFailed { detail: String },

    /// Storage failed in a way a retry will not fix.
    #[error("Internal storage error")]
    Storage(#[source] StoreError),
}

impl CheckoutError {
    /// Returns true if resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::TransactionFailed { .. })
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::Order(err) => match err {
                OrderError::EmptyOrder => "empty_order",
                OrderError::InvalidQuantity { .. } => "invalid_quantity",
                OrderError::VariantNotFound(_) => "variant_not_found",
                OrderError::UnavailableVariant(_) => "unavailable_variant",
                OrderError::InsufficientStock { .. } => "insufficient_stock",
                OrderError::AmountOverflow => "amount_overflow",
                OrderError::OrderNotFound(_) => "order_not_found",
                OrderError::InvalidStatusTransition { .. } => "invalid_status_transition",
            },
            CheckoutError::TransactionFailed { .. } => "transaction_failed",
            CheckoutError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        if err.is_retryable() {
            CheckoutError::TransactionFailed {
                detail: err.to_string(),
            }
        } else {
            CheckoutError::Storage(err)
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

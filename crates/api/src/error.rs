//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::OrderError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// No credential was presented.
    Unauthenticated,
    /// The credential is unknown or lacks the required role.
    Forbidden(String),
    /// Checkout service error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Checkout(err) => return checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> Response {
    let (status, message) = match &err {
        CheckoutError::Order(order_err) => (order_error_status(order_err), err.to_string()),
        CheckoutError::TransactionFailed { detail } => {
            tracing::warn!(%detail, "transaction failed");
            let body = serde_json::json!({ "error": err.to_string(), "retryable": true });
            return (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response();
        }
        CheckoutError::Storage(source) => {
            tracing::error!(error = %source, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };

    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}

fn order_error_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::VariantNotFound(_) | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderError::InsufficientStock { .. } | OrderError::InvalidStatusTransition { .. } => {
            StatusCode::CONFLICT
        }
        OrderError::EmptyOrder
        | OrderError::InvalidQuantity { .. }
        | OrderError::UnavailableVariant(_)
        | OrderError::AmountOverflow => StatusCode::BAD_REQUEST,
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

//! Order placement, read-back and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{
    DeliveryMethod, LineRequest, Order, OrderConfirmation, OrderId, OrderRequest, OrderStatus,
    PaymentMethod,
};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethod>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub variant_id: String,
    pub quantity: u32,
}

impl From<PlaceOrderRequest> for OrderRequest {
    fn from(req: PlaceOrderRequest) -> Self {
        OrderRequest {
            lines: req
                .items
                .into_iter()
                .map(|item| LineRequest::new(item.variant_id, item.quantity))
                .collect(),
            special_instructions: req.special_instructions,
            delivery_method: req.delivery_method,
            payment_method: req.payment_method,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedResponse {
    pub order_id: String,
    pub total_amount: String,
    /// Number of accepted lines.
    pub items: usize,
}

impl From<OrderConfirmation> for OrderPlacedResponse {
    fn from(confirmation: OrderConfirmation) -> Self {
        Self {
            order_id: confirmation.order_id.to_string(),
            total_amount: confirmation.total_amount.to_decimal_string(),
            items: confirmation.line_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub principal_id: String,
    pub status: OrderStatus,
    pub total_amount: String,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderLineResponse>,
    pub delivery: Option<DeliveryResponse>,
    pub payment: Option<PaymentResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub variant_id: String,
    pub quantity: u32,
    pub unit_price: String,
    pub sub_total: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub method: &'static str,
    pub status: &'static str,
    pub estimated_days: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub method: &'static str,
    pub status: &'static str,
    pub amount: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let header = order.header;
        Self {
            id: header.id.to_string(),
            principal_id: header.principal_id.to_string(),
            status: header.status,
            total_amount: header.total_amount.to_decimal_string(),
            special_instructions: header.special_instructions,
            created_at: header.created_at,
            items: order
                .lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    variant_id: line.variant_id.to_string(),
                    quantity: line.quantity,
                    unit_price: line.unit_price.to_decimal_string(),
                    sub_total: line.subtotal.to_decimal_string(),
                })
                .collect(),
            delivery: order.delivery.map(|d| DeliveryResponse {
                method: d.method.as_str(),
                status: d.status.as_str(),
                estimated_days: d.estimated_days,
            }),
            payment: order.payment.map(|p| PaymentResponse {
                method: p.method.as_str(),
                status: p.status.as_str(),
                amount: p.amount.to_decimal_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatedResponse {
    pub order_id: String,
    pub status: OrderStatus,
}

// -- Handlers --

/// POST /orders: place an order for the authenticated customer.
#[tracing::instrument(skip(state, auth, body))]
pub async fn place<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: Authenticated,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let principal = auth.require_customer()?;
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let confirmation = state
        .placement
        .place_order(principal.id, req.into())
        .await?;

    Ok((StatusCode::CREATED, Json(confirmation.into())))
}

/// GET /orders/{id}: read an order back; owners and staff only.
#[tracing::instrument(skip(state, auth))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.lifecycle.get_order(order_id).await?;

    if !auth.0.can_view_order_of(order.header.principal_id) {
        return Err(ApiError::Forbidden(
            "Not allowed to view this order".to_string(),
        ));
    }

    Ok(Json(order.into()))
}

/// PUT /orders/{id}/status: move an order through its lifecycle.
#[tracing::instrument(skip(state, auth, body))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: Authenticated,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusUpdatedResponse>, ApiError> {
    let staff = auth.require_staff()?;
    let order_id = parse_order_id(&id)?;
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let header = state.lifecycle.update_status(order_id, req.status).await?;
    tracing::info!(%order_id, staff_id = %staff.id, status = %header.status, "status changed");

    Ok(Json(StatusUpdatedResponse {
        order_id: header.id.to_string(),
        status: header.status,
    }))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}

//! Cart endpoints for the authenticated customer.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use domain::{Cart, DeliveryMethod, OrderRequest, PaymentMethod, VariantId};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::routes::orders::OrderPlacedResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub variant_id: String,
    pub quantity: u32,
}

/// Order options for checking out the cart; the lines come from the cart.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCheckoutRequest {
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethod>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub cart_id: Option<String>,
    pub items: Vec<CartItemResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub variant_id: String,
    pub quantity: u32,
}

impl From<Option<Cart>> for CartResponse {
    fn from(cart: Option<Cart>) -> Self {
        match cart {
            Some(cart) => Self {
                cart_id: Some(cart.id.to_string()),
                items: cart
                    .lines
                    .into_iter()
                    .map(|line| CartItemResponse {
                        variant_id: line.variant_id.to_string(),
                        quantity: line.quantity,
                    })
                    .collect(),
            },
            None => Self {
                cart_id: None,
                items: Vec::new(),
            },
        }
    }
}

/// GET /cart: the authenticated customer's active cart.
#[tracing::instrument(skip(state, auth))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: Authenticated,
) -> Result<Json<CartResponse>, ApiError> {
    let principal = auth.require_customer()?;
    let cart = state.carts.cart_for(principal.id).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/items: add a variant to the active cart.
#[tracing::instrument(skip(state, auth, body))]
pub async fn add_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: Authenticated,
    body: Result<Json<AddCartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let principal = auth.require_customer()?;
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let cart = state
        .carts
        .add_to_cart(principal.id, VariantId::new(req.variant_id), req.quantity)
        .await?;
    Ok(Json(Some(cart).into()))
}

/// POST /cart/checkout: place an order for everything in the active cart.
#[tracing::instrument(skip(state, auth, body))]
pub async fn checkout<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: Authenticated,
    body: Result<Json<CartCheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let principal = auth.require_customer()?;
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let options = OrderRequest {
        lines: Vec::new(),
        special_instructions: req.special_instructions,
        delivery_method: req.delivery_method,
        payment_method: req.payment_method,
    };
    let confirmation = state
        .placement
        .place_cart_order(principal.id, options)
        .await?;

    Ok((StatusCode::CREATED, Json(confirmation.into())))
}

//! HTTP API server with observability for the storefront.
//!
//! Provides REST endpoints for placing and reading orders, progressing
//! their status and managing carts, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{CartService, OrderLifecycleService, OrderPlacementService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::{Authenticator, StaticTokenAuthenticator};
use config::Config;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route("/cart/checkout", post(routes::cart::checkout::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state for `store` with the given authenticator.
pub fn create_state<S: Store + Clone + 'static>(
    store: S,
    authenticator: Arc<dyn Authenticator>,
    config: &Config,
) -> Arc<AppState<S>> {
    let mut placement = OrderPlacementService::new(store.clone());
    if let Some(timeout) = config.placement_timeout {
        placement = placement.with_timeout(timeout);
    }

    Arc::new(AppState {
        placement,
        lifecycle: OrderLifecycleService::new(store.clone()),
        carts: CartService::new(store),
        authenticator,
    })
}

/// Creates the application state using the tokens listed in `config`.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let authenticator = StaticTokenAuthenticator::new(config.api_tokens.iter().cloned());
    if authenticator.is_empty() {
        tracing::warn!("no API tokens configured; every authenticated route will reject requests");
    }
    create_state(store, Arc::new(authenticator), config)
}

//! Shared application state.

use std::sync::Arc;

use checkout::{CartService, OrderLifecycleService, OrderPlacementService};
use store::Store;

use crate::auth::Authenticator;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub placement: OrderPlacementService<S>,
    pub lifecycle: OrderLifecycleService<S>,
    pub carts: CartService<S>,
    pub authenticator: Arc<dyn Authenticator>,
}

//! Checkout services for the storefront.
//!
//! This crate turns validated requests into storage changes:
//! - [`OrderPlacementService`] places an order atomically, reserving stock
//! - [`OrderLifecycleService`] reads orders back and moves them through
//!   their status state machine, restoring stock on cancellation
//! - [`CartService`] fills and reads principals' active carts
//!
//! Every operation that writes runs in one unit of work and either commits
//! as a whole or leaves storage untouched.

pub mod cart;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod placement;
pub mod writer;

pub use cart::CartService;
pub use error::{CheckoutError, Result};
pub use lifecycle::OrderLifecycleService;
pub use placement::OrderPlacementService;

//! Domain layer for the storefront.
//!
//! This crate provides the storage-independent core of order placement:
//! - Money in integer minor units
//! - Catalog variants with price, stock and availability
//! - Order model with its status state machine
//! - Request validation and the pricing calculator
//! - Carts and authenticated principals

pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod order;
pub mod pricing;
pub mod principal;

pub use cart::{Cart, CartLine};
pub use catalog::{Availability, ProductId, Variant, VariantId};
pub use common::{CartId, OrderId, PrincipalId};
pub use error::OrderError;
pub use money::Money;
pub use order::{
    Delivery, DeliveryMethod, DeliveryStatus, LineRequest, Order, OrderConfirmation, OrderHeader,
    OrderLine, OrderRequest, OrderStatus, Payment, PaymentMethod, PaymentStatus,
    ValidatedOrderRequest,
};
pub use pricing::{PricedOrder, PricingCalculator, price_order};
pub use principal::{Principal, Role};

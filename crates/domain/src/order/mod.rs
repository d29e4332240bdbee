//! Order model, status machine and placement requests.

mod model;
mod request;
mod status;

pub use model::{
    Delivery, DeliveryMethod, DeliveryStatus, Order, OrderConfirmation, OrderHeader, OrderLine,
    Payment, PaymentMethod, PaymentStatus,
};
pub use request::{LineRequest, OrderRequest, ValidatedOrderRequest};
pub use status::OrderStatus;

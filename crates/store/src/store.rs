use async_trait::async_trait;
use common::{CartId, OrderId, PrincipalId};
use domain::{
    Cart, CartLine, Delivery, Order, OrderHeader, OrderLine, OrderStatus, Payment, Variant, VariantId,
};

use crate::{Result, StoreError};

/// Core trait for storage backends.
///
/// Reads on the store itself see committed data only. Every write that
/// must be atomic with other writes goes through a [`UnitOfWork`] obtained
/// from [`Store::begin`]. All implementations must be thread-safe
/// (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// The unit of work type produced by this store.
    type UnitOfWork: UnitOfWork;

    /// Opens a new unit of work.
    ///
    /// Nothing staged in it is visible to other readers until
    /// [`UnitOfWork::commit`] succeeds.
    async fn begin(&self) -> Result<Self::UnitOfWork>;

    /// Reads a variant without locking it.
    async fn get_variant(&self, id: &VariantId) -> Result<Option<Variant>>;

    /// Inserts a variant or replaces its price, stock and availability.
    ///
    /// This is the administrative restocking and repricing path; orders
    /// already placed keep their snapshotted prices.
    async fn upsert_variant(&self, variant: &Variant) -> Result<()>;

    /// Loads an order with its lines, delivery and payment.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads the active cart of a principal, if there is one.
    async fn get_active_cart(&self, principal_id: PrincipalId) -> Result<Option<Cart>>;

    /// Adds `quantity` units of a variant to the principal's active cart.
    ///
    /// Creates the cart on first use. A variant already in the cart has its
    /// quantity increased. Fails with `NotFound` if the variant does not
    /// exist.
    async fn add_to_cart(
        &self,
        principal_id: PrincipalId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<Cart>;
}

/// A scoped, all-or-nothing group of reads and writes.
///
/// Reads taken through a unit of work lock the rows they return until the
/// unit of work ends, so a read-check-write sequence cannot lose updates to
/// a concurrent unit of work. Dropping a unit of work without calling
/// [`commit`](UnitOfWork::commit) rolls it back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Reads a variant and locks its row for the rest of the unit of work.
    async fn lock_variant(&mut self, id: &VariantId) -> Result<Option<Variant>>;

    /// Decrements stock if at least `quantity` units are left.
    ///
    /// Fails with `StockConflict` otherwise; stock never goes negative.
    async fn decrement_stock(&mut self, id: &VariantId, quantity: u32) -> Result<()>;

    /// Returns `quantity` units to stock.
    async fn increment_stock(&mut self, id: &VariantId, quantity: u32) -> Result<()>;

    /// Inserts an order header.
    async fn insert_order(&mut self, header: &OrderHeader) -> Result<()>;

    /// Inserts one line of an order.
    async fn insert_order_line(&mut self, order_id: OrderId, line: &OrderLine) -> Result<()>;

    /// Inserts the delivery record of an order.
    async fn insert_delivery(&mut self, order_id: OrderId, delivery: &Delivery) -> Result<()>;

    /// Inserts the payment record of an order.
    async fn insert_payment(&mut self, order_id: OrderId, payment: &Payment) -> Result<()>;

    /// Reads an order header and locks it for the rest of the unit of work.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderHeader>>;

    /// Reads the lines of an order, in insertion order.
    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>>;

    /// Overwrites the status of an order.
    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()>;

    /// Finds the principal's active cart and locks it for the rest of the
    /// unit of work.
    ///
    /// Additions to a locked cart wait until the unit of work ends.
    async fn active_cart_id(&mut self, principal_id: PrincipalId) -> Result<Option<CartId>>;

    /// Reads the lines of a cart, oldest first.
    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>>;

    /// Deletes every line of a cart, returning how many were removed.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64>;

    /// Makes every staged change durable and visible.
    async fn commit(self) -> Result<()>;

    /// Discards every staged change.
    async fn rollback(self) -> Result<()>;
}

/// Rejects variants no backend may hold.
pub(crate) fn check_variant(variant: &Variant) -> Result<()> {
    if variant.unit_price.is_negative() {
        return Err(StoreError::InvalidValue(format!(
            "negative unit price {} for variant {}",
            variant.unit_price, variant.id
        )));
    }
    Ok(())
}

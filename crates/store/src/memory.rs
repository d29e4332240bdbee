use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{CartId, OrderId, PrincipalId};
use domain::{
    Cart, CartLine, Delivery, Order, OrderHeader, OrderLine, OrderStatus, Payment, Variant,
    VariantId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{Store, UnitOfWork, check_variant},
};

/// Points at which the in-memory store can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    LockVariant,
    DecrementStock,
    IncrementStock,
    InsertOrder,
    InsertOrderLine,
    InsertDelivery,
    InsertPayment,
    UpdateOrderStatus,
    ClearCart,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    variants: HashMap<VariantId, Variant>,
    orders: HashMap<OrderId, OrderHeader>,
    order_lines: HashMap<OrderId, Vec<OrderLine>>,
    deliveries: HashMap<OrderId, Delivery>,
    payments: HashMap<OrderId, Payment>,
    /// Active carts keyed by owner.
    carts: HashMap<PrincipalId, Cart>,
}

impl StoreState {
    fn order(&self, id: OrderId) -> Option<Order> {
        let header = self.orders.get(&id)?.clone();
        Some(Order {
            header,
            lines: self.order_lines.get(&id).cloned().unwrap_or_default(),
            delivery: self.deliveries.get(&id).cloned(),
            payment: self.payments.get(&id).cloned(),
        })
    }

    fn require_order(&self, id: OrderId) -> Result<()> {
        if self.orders.contains_key(&id) {
            Ok(())
        } else {
            Err(not_found("Order", id))
        }
    }
}

/// Number of rows per order table, for asserting on side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub orders: usize,
    pub order_lines: usize,
    pub deliveries: usize,
    pub payments: usize,
}

/// In-memory store implementation for testing and local runs.
///
/// Units of work are fully serialized: each one holds the store's lock
/// from `begin` until it is committed, rolled back or dropped, and works on
/// a private copy of the data that replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    faults: Arc<StdMutex<HashSet<FailPoint>>>,
    commit_delay: Arc<StdMutex<Option<Duration>>>,
    units_begun: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose catalog holds `variants`.
    pub fn with_variants(variants: impl IntoIterator<Item = Variant>) -> Self {
        let state = StoreState {
            variants: variants.into_iter().map(|v| (v.id.clone(), v)).collect(),
            ..StoreState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        }
    }

    /// Configures the store to fail the next time `point` is reached.
    ///
    /// The failure is reported as a retryable outage and fires once.
    pub fn fail_once(&self, point: FailPoint) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    /// Makes every later commit wait `delay` before applying its changes.
    pub fn delay_commits(&self, delay: Duration) {
        *self
            .commit_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Returns how many units of work have been opened.
    pub fn units_of_work_begun(&self) -> usize {
        self.units_begun.load(Ordering::SeqCst)
    }

    /// Returns the committed stock of a variant.
    pub async fn stock_of(&self, id: &VariantId) -> Option<u32> {
        self.state
            .lock()
            .await
            .variants
            .get(id)
            .map(|v| v.stock_quantity)
    }

    /// Returns committed row counts of the order tables.
    pub async fn row_counts(&self) -> RowCounts {
        let state = self.state.lock().await;
        RowCounts {
            orders: state.orders.len(),
            order_lines: state.order_lines.values().map(Vec::len).sum(),
            deliveries: state.deliveries.len(),
            payments: state.payments.len(),
        }
    }
}

fn trip(faults: &StdMutex<HashSet<FailPoint>>, point: FailPoint) -> Result<()> {
    let mut armed = faults.lock().unwrap_or_else(PoisonError::into_inner);
    if armed.remove(&point) {
        tracing::debug!(?point, "injected store failure");
        return Err(StoreError::Unavailable(format!(
            "injected failure at {point:?}"
        )));
    }
    Ok(())
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork> {
        self.units_begun.fetch_add(1, Ordering::SeqCst);
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        let commit_delay = *self
            .commit_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(InMemoryUnitOfWork {
            guard,
            staged,
            faults: self.faults.clone(),
            commit_delay,
        })
    }

    async fn get_variant(&self, id: &VariantId) -> Result<Option<Variant>> {
        Ok(self.state.lock().await.variants.get(id).cloned())
    }

    async fn upsert_variant(&self, variant: &Variant) -> Result<()> {
        check_variant(variant)?;
        self.state
            .lock()
            .await
            .variants
            .insert(variant.id.clone(), variant.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().await.order(id))
    }

    async fn get_active_cart(&self, principal_id: PrincipalId) -> Result<Option<Cart>> {
        Ok(self.state.lock().await.carts.get(&principal_id).cloned())
    }

    async fn add_to_cart(
        &self,
        principal_id: PrincipalId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut state = self.state.lock().await;
        if !state.variants.contains_key(variant_id) {
            return Err(not_found("Variant", variant_id));
        }

        let cart = state.carts.entry(principal_id).or_insert_with(|| Cart {
            id: CartId::new(),
            principal_id,
            lines: Vec::new(),
        });

        match cart.lines.iter_mut().find(|l| &l.variant_id == variant_id) {
            Some(line) => {
                line.quantity = line.quantity.checked_add(quantity).ok_or_else(|| {
                    StoreError::InvalidValue(format!("cart quantity overflow for {variant_id}"))
                })?;
            }
            None => cart.lines.push(CartLine {
                variant_id: variant_id.clone(),
                quantity,
            }),
        }

        Ok(cart.clone())
    }
}

/// Unit of work over an [`InMemoryStore`].
///
/// Holds the store lock for its whole lifetime.
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<StoreState>,
    staged: StoreState,
    faults: Arc<StdMutex<HashSet<FailPoint>>>,
    commit_delay: Option<Duration>,
}

impl InMemoryUnitOfWork {
    fn trip(&self, point: FailPoint) -> Result<()> {
        trip(&self.faults, point)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_variant(&mut self, id: &VariantId) -> Result<Option<Variant>> {
        self.trip(FailPoint::LockVariant)?;
        Ok(self.staged.variants.get(id).cloned())
    }

    async fn decrement_stock(&mut self, id: &VariantId, quantity: u32) -> Result<()> {
        self.trip(FailPoint::DecrementStock)?;
        let variant = self
            .staged
            .variants
            .get_mut(id)
            .ok_or_else(|| not_found("Variant", id))?;

        if variant.stock_quantity < quantity {
            return Err(StoreError::StockConflict {
                variant_id: id.clone(),
                requested: quantity,
            });
        }
        variant.stock_quantity -= quantity;
        Ok(())
    }

    async fn increment_stock(&mut self, id: &VariantId, quantity: u32) -> Result<()> {
        self.trip(FailPoint::IncrementStock)?;
        let variant = self
            .staged
            .variants
            .get_mut(id)
            .ok_or_else(|| not_found("Variant", id))?;

        variant.stock_quantity = variant.stock_quantity.checked_add(quantity).ok_or_else(|| {
            StoreError::InvalidValue(format!("stock overflow for variant {id}"))
        })?;
        Ok(())
    }

    async fn insert_order(&mut self, header: &OrderHeader) -> Result<()> {
        self.trip(FailPoint::InsertOrder)?;
        if self.staged.orders.contains_key(&header.id) {
            return Err(StoreError::InvalidValue(format!(
                "order {} already exists",
                header.id
            )));
        }
        self.staged.orders.insert(header.id, header.clone());
        Ok(())
    }

    async fn insert_order_line(&mut self, order_id: OrderId, line: &OrderLine) -> Result<()> {
        self.trip(FailPoint::InsertOrderLine)?;
        self.staged.require_order(order_id)?;
        self.staged
            .order_lines
            .entry(order_id)
            .or_default()
            .push(line.clone());
        Ok(())
    }

    async fn insert_delivery(&mut self, order_id: OrderId, delivery: &Delivery) -> Result<()> {
        self.trip(FailPoint::InsertDelivery)?;
        self.staged.require_order(order_id)?;
        if self.staged.deliveries.contains_key(&order_id) {
            return Err(StoreError::InvalidValue(format!(
                "order {order_id} already has a delivery"
            )));
        }
        self.staged.deliveries.insert(order_id, delivery.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, order_id: OrderId, payment: &Payment) -> Result<()> {
        self.trip(FailPoint::InsertPayment)?;
        self.staged.require_order(order_id)?;
        if self.staged.payments.contains_key(&order_id) {
            return Err(StoreError::InvalidValue(format!(
                "order {order_id} already has a payment"
            )));
        }
        self.staged.payments.insert(order_id, payment.clone());
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderHeader>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self.staged.order_lines.get(&id).cloned().unwrap_or_default())
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        self.trip(FailPoint::UpdateOrderStatus)?;
        let header = self
            .staged
            .orders
            .get_mut(&id)
            .ok_or_else(|| not_found("Order", id))?;
        header.status = status;
        Ok(())
    }

    async fn active_cart_id(&mut self, principal_id: PrincipalId) -> Result<Option<CartId>> {
        Ok(self.staged.carts.get(&principal_id).map(|c| c.id))
    }

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>> {
        self.staged
            .carts
            .values()
            .find(|c| c.id == cart_id)
            .map(|c| c.lines.clone())
            .ok_or_else(|| not_found("Cart", cart_id))
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        self.trip(FailPoint::ClearCart)?;
        let cart = self
            .staged
            .carts
            .values_mut()
            .find(|c| c.id == cart_id)
            .ok_or_else(|| not_found("Cart", cart_id))?;

        let removed = cart.lines.len() as u64;
        cart.lines.clear();
        Ok(removed)
    }

    async fn commit(self) -> Result<()> {
        if let Some(delay) = self.commit_delay {
            tokio::time::sleep(delay).await;
        }
        trip(&self.faults, FailPoint::Commit)?;
        let InMemoryUnitOfWork {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        metrics::counter!("store_units_of_work_total", "outcome" => "committed").increment(1);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        metrics::counter!("store_units_of_work_total", "outcome" => "rolled_back").increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use domain::{DeliveryMethod, Money};

    use super::*;

    fn store_with_v1(stock: u32) -> InMemoryStore {
        InMemoryStore::with_variants([Variant::new("V1", "P1", Money::from_cents(99_900), stock)])
    }

    fn header(principal_id: PrincipalId) -> OrderHeader {
        OrderHeader {
            id: OrderId::new(),
            principal_id,
            status: OrderStatus::Pending,
            total_amount: Money::from_cents(1_000),
            special_instructions: None,
            created_at: Utc::now(),
        }
    }

    fn v1() -> VariantId {
        VariantId::new("V1")
    }

    #[tokio::test]
    async fn commit_makes_changes_visible() {
        let store = store_with_v1(5);

        let mut uow = store.begin().await.unwrap();
        uow.decrement_stock(&v1(), 2).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.stock_of(&v1()).await, Some(3));
    }

    #[tokio::test]
    async fn rollback_and_drop_discard_changes() {
        let store = store_with_v1(5);

        let mut uow = store.begin().await.unwrap();
        uow.decrement_stock(&v1(), 2).await.unwrap();
        uow.rollback().await.unwrap();
        assert_eq!(store.stock_of(&v1()).await, Some(5));

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_order(&header(PrincipalId::new())).await.unwrap();
        }
        assert_eq!(store.row_counts().await, RowCounts::default());
    }

    #[tokio::test]
    async fn decrement_never_goes_negative() {
        let store = store_with_v1(1);
        let mut uow = store.begin().await.unwrap();

        let err = uow.decrement_stock(&v1(), 2).await.unwrap_err();
        assert!(matches!(err, StoreError::StockConflict { requested: 2, .. }));
        assert!(err.is_retryable());
        assert_eq!(uow.lock_variant(&v1()).await.unwrap().unwrap().stock_quantity, 1);
    }

    #[tokio::test]
    async fn increment_restores_stock() {
        let store = store_with_v1(3);
        let mut uow = store.begin().await.unwrap();
        uow.increment_stock(&v1(), 2).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.stock_of(&v1()).await, Some(5));
    }

    #[tokio::test]
    async fn units_of_work_are_serialized() {
        let store = store_with_v1(5);
        let first = store.begin().await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(50), store.begin()).await;
        assert!(second.is_err(), "second unit of work must wait for the first");

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(50), store.begin()).await;
        assert!(second.is_ok());
        assert_eq!(store.units_of_work_begun(), 3);
    }

    #[tokio::test]
    async fn fail_points_fire_once() {
        let store = store_with_v1(5);
        store.fail_once(FailPoint::Commit);

        let mut uow = store.begin().await.unwrap();
        uow.decrement_stock(&v1(), 1).await.unwrap();
        let err = uow.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.stock_of(&v1()).await, Some(5));

        let mut uow = store.begin().await.unwrap();
        uow.decrement_stock(&v1(), 1).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.stock_of(&v1()).await, Some(4));
    }

    #[tokio::test]
    async fn order_children_require_the_order() {
        let store = store_with_v1(5);
        let mut uow = store.begin().await.unwrap();

        let err = uow
            .insert_delivery(OrderId::new(), &Delivery::pending(DeliveryMethod::StorePickup))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Order", .. }));
    }

    #[tokio::test]
    async fn order_round_trips_with_children() {
        let store = store_with_v1(5);
        let principal = PrincipalId::new();
        let header = header(principal);
        let line = OrderLine {
            variant_id: v1(),
            quantity: 1,
            unit_price: Money::from_cents(1_000),
            subtotal: Money::from_cents(1_000),
        };

        let mut uow = store.begin().await.unwrap();
        uow.insert_order(&header).await.unwrap();
        uow.insert_order_line(header.id, &line).await.unwrap();
        uow.insert_delivery(header.id, &Delivery::pending(DeliveryMethod::StorePickup))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let order = store.get_order(header.id).await.unwrap().unwrap();
        assert_eq!(order.header, header);
        assert_eq!(order.lines, vec![line]);
        assert_eq!(order.delivery.unwrap().estimated_days, 1);
        assert!(order.payment.is_none());
    }

    #[tokio::test]
    async fn upsert_rejects_negative_price() {
        let store = store_with_v1(5);

        let err = store
            .upsert_variant(&Variant::new("V1", "P1", Money::from_cents(-1), 5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue(_)));
        assert!(!err.is_retryable());

        let variant = store.get_variant(&v1()).await.unwrap().unwrap();
        assert_eq!(variant.unit_price, Money::from_cents(99_900));

        store
            .upsert_variant(&Variant::new("V2", "P1", Money::zero(), 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_to_cart_creates_cart_and_accumulates() {
        let store = store_with_v1(5);
        let principal = PrincipalId::new();

        let first = store.add_to_cart(principal, &v1(), 1).await.unwrap();
        let second = store.add_to_cart(principal, &v1(), 2).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.lines.len(), 1);
        assert_eq!(second.lines[0].quantity, 3);
    }

    #[tokio::test]
    async fn add_to_cart_rejects_unknown_variant() {
        let store = store_with_v1(5);
        let err = store
            .add_to_cart(PrincipalId::new(), &VariantId::new("X999"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Variant", .. }));
    }

    #[tokio::test]
    async fn clear_cart_empties_lines_but_keeps_cart() {
        let store = store_with_v1(5);
        let principal = PrincipalId::new();
        store.add_to_cart(principal, &v1(), 2).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let cart_id = uow.active_cart_id(principal).await.unwrap().unwrap();
        assert_eq!(
            uow.cart_lines(cart_id).await.unwrap(),
            vec![CartLine {
                variant_id: v1(),
                quantity: 2
            }]
        );
        assert_eq!(uow.clear_cart(cart_id).await.unwrap(), 1);
        assert!(uow.cart_lines(cart_id).await.unwrap().is_empty());
        uow.commit().await.unwrap();

        let cart = store.get_active_cart(principal).await.unwrap().unwrap();
        assert_eq!(cart.id, cart_id);
        assert!(cart.is_empty());
    }
}

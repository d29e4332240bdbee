//! Order read-back and status changes after placement.

use domain::{Order, OrderError, OrderHeader, OrderId, OrderStatus};
use store::{Store, UnitOfWork};

use crate::error::Result;
use crate::inventory;

/// Moves placed orders through their status state machine.
///
/// Cancelling an order returns every line's quantity to stock in the same
/// unit of work that records the new status.
pub struct OrderLifecycleService<S: Store> {
    store: S,
}

impl<S: Store> OrderLifecycleService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads an order with its lines, delivery and payment.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id).into())
    }

    /// Applies a status transition, returning the updated header.
    #[tracing::instrument(skip(self), fields(%order_id, to = %new_status))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<OrderHeader> {
        let mut uow = self.store.begin().await?;
        let (header, restored) = match transition(&mut uow, order_id, new_status).await {
            Ok(applied) => applied,
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
        };
        uow.commit().await?;

        metrics::counter!("order_status_transitions_total", "to" => new_status.as_str())
            .increment(1);
        if restored > 0 {
            metrics::counter!("stock_restored_units_total").increment(restored);
        }
        tracing::info!(status = %header.status, restored, "order status updated");

        Ok(header)
    }
}

async fn transition<U: UnitOfWork>(
    uow: &mut U,
    order_id: OrderId,
    new_status: OrderStatus,
) -> Result<(OrderHeader, u64)> {
    let mut header = uow
        .lock_order(order_id)
        .await?
        .ok_or(OrderError::OrderNotFound(order_id))?;

    let from = header.status;
    if !from.can_transition_to(new_status) {
        return Err(OrderError::InvalidStatusTransition {
            from,
            to: new_status,
        }
        .into());
    }

    uow.update_order_status(order_id, new_status).await?;

    let mut restored = 0u64;
    if new_status == OrderStatus::Cancelled {
        for line in uow.order_lines(order_id).await? {
            inventory::increment_stock(uow, &line.variant_id, line.quantity).await?;
            restored += u64::from(line.quantity);
        }
    }

    header.status = new_status;
    Ok((header, restored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckoutError;
    use crate::placement::OrderPlacementService;
    use domain::{LineRequest, Money, OrderRequest, PrincipalId, Variant, VariantId};
    use store::{FailPoint, InMemoryStore};

    async fn placed_order() -> (InMemoryStore, OrderLifecycleService<InMemoryStore>, OrderId) {
        let store =
            InMemoryStore::with_variants([Variant::new("V1", "P1", Money::from_cents(250), 10)]);
        let confirmation = OrderPlacementService::new(store.clone())
            .place_order(
                PrincipalId::new(),
                OrderRequest::new(vec![LineRequest::new("V1", 3), LineRequest::new("V1", 1)]),
            )
            .await
            .unwrap();
        let service = OrderLifecycleService::new(store.clone());
        (store, service, confirmation.order_id)
    }

    #[tokio::test]
    async fn happy_path_walks_to_delivered() {
        let (_, service, order_id) = placed_order().await;

        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let header = service.update_status(order_id, status).await.unwrap();
            assert_eq!(header.status, status);
        }

        let order = service.get_order(order_id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn cancellation_restores_every_line() {
        let (store, service, order_id) = placed_order().await;
        let v1 = VariantId::new("V1");
        assert_eq!(store.stock_of(&v1).await, Some(6));

        service
            .update_status(order_id, OrderStatus::Processing)
            .await
            .unwrap();
        service
            .update_status(order_id, OrderStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(store.stock_of(&v1).await, Some(10));
    }

    #[tokio::test]
    async fn terminal_orders_reject_changes() {
        let (store, service, order_id) = placed_order().await;
        service
            .update_status(order_id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let err = service
            .update_status(order_id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Order(OrderError::InvalidStatusTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Cancelled,
            })
        ));
        assert_eq!(store.stock_of(&VariantId::new("V1")).await, Some(10));
    }

    #[tokio::test]
    async fn skipping_a_step_is_rejected() {
        let (_, service, order_id) = placed_order().await;

        let err = service
            .update_status(order_id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Order(OrderError::InvalidStatusTransition { .. })
        ));
        assert_eq!(
            service.get_order(order_id).await.unwrap().status(),
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (_, service, _) = placed_order().await;
        let missing = OrderId::new();

        assert!(matches!(
            service.update_status(missing, OrderStatus::Processing).await,
            Err(CheckoutError::Order(OrderError::OrderNotFound(id))) if id == missing
        ));
        assert!(matches!(
            service.get_order(missing).await,
            Err(CheckoutError::Order(OrderError::OrderNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn failed_restock_keeps_the_order_open() {
        let (store, service, order_id) = placed_order().await;
        store.fail_once(FailPoint::IncrementStock);

        let err = service
            .update_status(order_id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            service.get_order(order_id).await.unwrap().status(),
            OrderStatus::Pending
        );
        assert_eq!(store.stock_of(&VariantId::new("V1")).await, Some(6));
    }
}

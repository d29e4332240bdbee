//! Writes a priced order and everything it owns.

use chrono::Utc;
use domain::{
    Delivery, OrderHeader, OrderId, OrderStatus, Payment, PricedOrder, PrincipalId,
    ValidatedOrderRequest,
};
use store::UnitOfWork;

use crate::error::Result;

/// Stages the order header, its lines, and the optional delivery and
/// payment records.
///
/// The header starts out `pending` and carries the priced total. Every
/// line keeps the unit price it was priced at. A payment, when requested,
/// is for exactly the order total.
pub async fn write_order<U: UnitOfWork>(
    uow: &mut U,
    principal_id: PrincipalId,
    request: &ValidatedOrderRequest,
    priced: &PricedOrder,
) -> Result<OrderHeader> {
    let header = OrderHeader {
        id: OrderId::new(),
        principal_id,
        status: OrderStatus::Pending,
        total_amount: priced.total,
        special_instructions: request.special_instructions().map(str::to_owned),
        created_at: Utc::now(),
    };

    uow.insert_order(&header).await?;
    for line in &priced.lines {
        uow.insert_order_line(header.id, line).await?;
    }

    if let Some(method) = request.delivery_method() {
        uow.insert_delivery(header.id, &Delivery::pending(method))
            .await?;
    }
    if let Some(method) = request.payment_method() {
        uow.insert_payment(header.id, &Payment::pending(method, priced.total))
            .await?;
    }

    tracing::debug!(order_id = %header.id, lines = priced.lines.len(), "order staged");
    Ok(header)
}

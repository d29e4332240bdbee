//! Order placement: one unit of work from validation to commit.

use std::time::{Duration, Instant};

use domain::{
    LineRequest, OrderConfirmation, OrderRequest, PricingCalculator, PrincipalId,
    ValidatedOrderRequest,
};
use store::{Store, UnitOfWork};

use crate::cart::clear_active_cart;
use crate::error::{CheckoutError, Result};
use crate::inventory;
use crate::writer::write_order;

/// Places orders atomically.
///
/// For a valid request the service, inside a single unit of work:
/// 1. Locks and prices every requested variant, in submitted order
/// 2. Writes the order header, lines, delivery and payment
/// 3. Decrements stock for every line
/// 4. Clears the principal's active cart
///
/// and commits. Any failure rolls everything back, so a rejected or failed
/// placement leaves no trace and can simply be resubmitted.
pub struct OrderPlacementService<S: Store> {
    store: S,
    timeout: Option<Duration>,
}

/// Where the lines of an order come from.
enum OrderSource {
    Submitted(ValidatedOrderRequest),
    /// The active cart, read inside the unit of work. Lines on the request
    /// are ignored.
    Cart(OrderRequest),
}

impl<S: Store> OrderPlacementService<S> {
    /// Creates a placement service without a time limit.
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bounds the staging part of each placement to `timeout`.
    ///
    /// A placement still staging when the limit expires is abandoned and
    /// its unit of work rolled back. Commit itself is never cut short, so a
    /// timed out placement is known not to have happened.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Places an order for `principal_id`.
    #[tracing::instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn place_order(
        &self,
        principal_id: PrincipalId,
        request: OrderRequest,
    ) -> Result<OrderConfirmation> {
        let started = Instant::now();
        let result = match request.validate() {
            Ok(request) => self.place(principal_id, OrderSource::Submitted(request)).await,
            Err(err) => Err(err.into()),
        };
        record_outcome(started, &result);
        result
    }

    /// Places an order for everything in the principal's active cart.
    ///
    /// The cart is read and cleared in the same unit of work, so the order
    /// holds exactly the lines that were removed from the cart. Items added
    /// while the placement runs wait for it and stay in the cart. Only the
    /// order options of `options` are used.
    #[tracing::instrument(skip(self, options))]
    pub async fn place_cart_order(
        &self,
        principal_id: PrincipalId,
        options: OrderRequest,
    ) -> Result<OrderConfirmation> {
        let started = Instant::now();
        let result = self.place(principal_id, OrderSource::Cart(options)).await;
        record_outcome(started, &result);
        result
    }

    async fn place(
        &self,
        principal_id: PrincipalId,
        source: OrderSource,
    ) -> Result<OrderConfirmation> {
        let staged = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.stage(principal_id, source))
                .await
                .unwrap_or_else(|_| {
                    Err(CheckoutError::TransactionFailed {
                        detail: format!("placement timed out after {} ms", limit.as_millis()),
                    })
                }),
            None => self.stage(principal_id, source).await,
        };

        let (uow, confirmation) = staged?;
        uow.commit().await?;
        Ok(confirmation)
    }

    /// Opens a unit of work and stages the order in it, leaving it ready to
    /// commit. On failure the unit of work is rolled back.
    async fn stage(
        &self,
        principal_id: PrincipalId,
        source: OrderSource,
    ) -> Result<(S::UnitOfWork, OrderConfirmation)> {
        let mut uow = self.store.begin().await?;

        let staged = match source {
            OrderSource::Submitted(request) => stage_order(&mut uow, principal_id, &request).await,
            OrderSource::Cart(options) => stage_cart_order(&mut uow, principal_id, options).await,
        };

        match staged {
            Ok(confirmation) => Ok((uow, confirmation)),
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

fn record_outcome(started: Instant, result: &Result<OrderConfirmation>) {
    metrics::histogram!("order_placement_duration_seconds")
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(confirmation) => {
            metrics::counter!("orders_placed_total").increment(1);
            tracing::info!(
                order_id = %confirmation.order_id,
                total = %confirmation.total_amount,
                lines = confirmation.line_count,
                "order placed"
            );
        }
        Err(err) => {
            metrics::counter!("order_placement_failures_total", "reason" => err.reason())
                .increment(1);
            match err {
                CheckoutError::Order(_) => {
                    tracing::info!(reason = err.reason(), error = %err, "order rejected")
                }
                CheckoutError::TransactionFailed { detail } => {
                    tracing::warn!(%detail, "order placement failed")
                }
                CheckoutError::Storage(source) => {
                    tracing::error!(error = %source, "order placement failed")
                }
            }
        }
    }
}

async fn stage_cart_order<U: UnitOfWork>(
    uow: &mut U,
    principal_id: PrincipalId,
    options: OrderRequest,
) -> Result<OrderConfirmation> {
    let lines = match uow.active_cart_id(principal_id).await? {
        Some(cart_id) => uow.cart_lines(cart_id).await?,
        None => Vec::new(),
    };

    let request = OrderRequest {
        lines: lines
            .into_iter()
            .map(|line| LineRequest::new(line.variant_id, line.quantity))
            .collect(),
        ..options
    }
    .validate()?;

    stage_order(uow, principal_id, &request).await
}

async fn stage_order<U: UnitOfWork>(
    uow: &mut U,
    principal_id: PrincipalId,
    request: &ValidatedOrderRequest,
) -> Result<OrderConfirmation> {
    let mut calculator = PricingCalculator::new();
    for line in request.lines() {
        let variant = inventory::read_for_pricing(uow, &line.variant_id).await?;
        calculator.add_line(&variant, line.quantity)?;
    }
    let priced = calculator.finish();

    let header = write_order(uow, principal_id, request, &priced).await?;

    for line in &priced.lines {
        inventory::decrement_stock(uow, &line.variant_id, line.quantity).await?;
    }

    clear_active_cart(uow, principal_id).await?;

    Ok(OrderConfirmation {
        order_id: header.id,
        total_amount: priced.total,
        line_count: priced.line_count(),
    })
}

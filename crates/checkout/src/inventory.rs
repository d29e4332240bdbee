//! Inventory reads and stock adjustments inside a unit of work.

use domain::{OrderError, Variant, VariantId};
use store::UnitOfWork;

use crate::error::Result;

/// Reads a variant for pricing and keeps it locked until the unit of work
/// ends.
///
/// The returned snapshot is the authoritative price and stock for the
/// order being placed.
pub async fn read_for_pricing<U: UnitOfWork>(
    uow: &mut U,
    variant_id: &VariantId,
) -> Result<Variant> {
    uow.lock_variant(variant_id)
        .await?
        .ok_or_else(|| OrderError::VariantNotFound(variant_id.clone()).into())
}

/// Takes `quantity` units out of stock.
///
/// The decrement is conditional; a variant with fewer units left reports a
/// stock conflict rather than going negative.
pub async fn decrement_stock<U: UnitOfWork>(
    uow: &mut U,
    variant_id: &VariantId,
    quantity: u32,
) -> Result<()> {
    uow.decrement_stock(variant_id, quantity).await?;
    tracing::debug!(%variant_id, quantity, "stock decremented");
    Ok(())
}

/// Puts `quantity` units back into stock.
pub async fn increment_stock<U: UnitOfWork>(
    uow: &mut U,
    variant_id: &VariantId,
    quantity: u32,
) -> Result<()> {
    uow.increment_stock(variant_id, quantity).await?;
    tracing::debug!(%variant_id, quantity, "stock restored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckoutError;
    use domain::Money;
    use store::{InMemoryStore, Store};

    fn store() -> InMemoryStore {
        InMemoryStore::with_variants([Variant::new("V1", "P1", Money::from_cents(500), 2)])
    }

    #[tokio::test]
    async fn missing_variant_is_reported_by_id() {
        let store = store();
        let mut uow = store.begin().await.unwrap();

        let err = read_for_pricing(&mut uow, &VariantId::new("X999"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Order(OrderError::VariantNotFound(ref id)) if id.as_str() == "X999"
        ));
    }

    #[tokio::test]
    async fn oversized_decrement_is_a_retryable_conflict() {
        let store = store();
        let mut uow = store.begin().await.unwrap();

        let err = decrement_stock(&mut uow, &VariantId::new("V1"), 3)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn adjustments_apply_on_commit() {
        let store = store();
        let v1 = VariantId::new("V1");

        let mut uow = store.begin().await.unwrap();
        decrement_stock(&mut uow, &v1, 2).await.unwrap();
        increment_stock(&mut uow, &v1, 5).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.stock_of(&v1).await, Some(5));
    }
}

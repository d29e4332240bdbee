//! Cart clearing during placement, and the cart service.

use domain::{Cart, OrderError, PrincipalId, VariantId};
use store::{Store, StoreError, UnitOfWork};

use crate::error::Result;

/// Deletes every line of the principal's active cart.
///
/// The cart itself is kept. A principal without an active cart is not an
/// error. Returns the number of lines removed.
pub async fn clear_active_cart<U: UnitOfWork>(
    uow: &mut U,
    principal_id: PrincipalId,
) -> Result<u64> {
    let Some(cart_id) = uow.active_cart_id(principal_id).await? else {
        return Ok(0);
    };

    let removed = uow.clear_cart(cart_id).await?;
    tracing::debug!(%cart_id, removed, "cart cleared");
    Ok(removed)
}

/// Reads and fills principals' active carts.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds `quantity` units of a variant to the principal's active cart,
    /// creating the cart on first use.
    #[tracing::instrument(skip(self), fields(%principal_id, %variant_id))]
    pub async fn add_to_cart(
        &self,
        principal_id: PrincipalId,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                variant_id,
                quantity,
            }
            .into());
        }

        match self
            .store
            .add_to_cart(principal_id, &variant_id, quantity)
            .await
        {
            Ok(cart) => Ok(cart),
            Err(StoreError::NotFound { entity: "Variant", .. }) => {
                Err(OrderError::VariantNotFound(variant_id).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the principal's active cart, if there is one.
    pub async fn cart_for(&self, principal_id: PrincipalId) -> Result<Option<Cart>> {
        Ok(self.store.get_active_cart(principal_id).await?)
    }

}

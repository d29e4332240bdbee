//! Demo catalog for running without a database.

use domain::{Availability, Money, Variant};
use store::InMemoryStore;

/// Variants loaded into the in-memory store when no database is configured.
pub fn demo_catalog() -> Vec<Variant> {
    vec![
        Variant::new("V1", "P-PHONE", Money::from_cents(99_900), 5),
        Variant::new("V2", "P-PHONE", Money::from_cents(109_900), 1),
        Variant::new("V3", "P-CASE", Money::from_cents(1_999), 100),
        Variant::new("V4", "P-CASE", Money::from_cents(2_499), 0),
        Variant::new("V5", "P-CHARGER", Money::from_cents(3_450), 40)
            .with_availability(Availability::Unavailable),
    ]
}

/// Creates an in-memory store holding [`demo_catalog`].
pub fn demo_store() -> InMemoryStore {
    InMemoryStore::with_variants(demo_catalog())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::VariantId;

    #[tokio::test]
    async fn test_demo_store_holds_catalog() {
        let store = demo_store();
        assert_eq!(store.stock_of(&VariantId::new("V1")).await, Some(5));
        assert_eq!(store.stock_of(&VariantId::new("V4")).await, Some(0));
        assert!(
            demo_catalog()
                .iter()
                .any(|v| !v.is_available())
        );
    }
}

//! Catalog value objects: products and their sellable variants.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Identifier of a sellable variant (e.g. `"V1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    /// Creates a new variant ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the variant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VariantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VariantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for VariantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of the product a variant belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Whether a variant may currently be purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Available,
    Unavailable,
}

impl Availability {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Availability::Available),
            "unavailable" => Ok(Availability::Unavailable),
            other => Err(format!("unknown availability: {other}")),
        }
    }
}

/// A sellable unit of a product with its own price and stock counter.
///
/// The values carried here are a snapshot of the variant row at the time it
/// was read; the stock counter itself is only ever mutated through a unit
/// of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    /// Authoritative unit price.
    pub unit_price: Money,
    pub stock_quantity: u32,
    pub availability: Availability,
}

impl Variant {
    /// Creates an available variant.
    pub fn new(
        id: impl Into<VariantId>,
        product_id: impl Into<ProductId>,
        unit_price: Money,
        stock_quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            unit_price,
            stock_quantity,
            availability: Availability::Available,
        }
    }

    /// Returns the variant with the given availability.
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_id_string_conversion() {
        let id = VariantId::new("V1");
        assert_eq!(id.as_str(), "V1");

        let id2: VariantId = "X999".into();
        assert_eq!(id2.to_string(), "X999");
    }

    #[test]
    fn test_new_variant_is_available() {
        let variant = Variant::new("V1", "P1", Money::from_cents(99_900), 5);
        assert!(variant.is_available());

        let hidden = variant.with_availability(Availability::Unavailable);
        assert!(!hidden.is_available());
    }

    #[test]
    fn test_availability_round_trips_through_str() {
        for availability in [Availability::Available, Availability::Unavailable] {
            assert_eq!(availability.as_str().parse::<Availability>(), Ok(availability));
        }
        assert!("discontinued".parse::<Availability>().is_err());
    }
}

//! Pricing calculator: turns variant snapshots and requested quantities
//! into priced order lines.

use std::collections::HashMap;

use crate::catalog::{Variant, VariantId};
use crate::error::OrderError;
use crate::money::Money;
use crate::order::OrderLine;

/// Lines priced from authoritative unit prices, plus their total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<OrderLine>,
    pub total: Money,
}

impl PricedOrder {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Prices lines one at a time, in submitted order.
///
/// The calculator remembers how much of each variant earlier lines already
/// claimed, so a variant requested on two lines is checked against its
/// stock cumulatively.
#[derive(Debug, Default)]
pub struct PricingCalculator {
    lines: Vec<OrderLine>,
    claimed: HashMap<VariantId, u32>,
    total: Money,
}

impl PricingCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and prices one line against a freshly read variant.
    pub fn add_line(&mut self, variant: &Variant, quantity: u32) -> Result<&OrderLine, OrderError> {
        if !variant.is_available() {
            return Err(OrderError::UnavailableVariant(variant.id.clone()));
        }

        let claimed = self.claimed.get(&variant.id).copied().unwrap_or(0);
        let available = variant.stock_quantity.saturating_sub(claimed);
        if available < quantity {
            return Err(OrderError::InsufficientStock {
                variant_id: variant.id.clone(),
                available,
                requested: quantity,
            });
        }

        let subtotal = variant
            .unit_price
            .checked_multiply(quantity)
            .ok_or(OrderError::AmountOverflow)?;
        self.total = self
            .total
            .checked_add(subtotal)
            .ok_or(OrderError::AmountOverflow)?;
        *self.claimed.entry(variant.id.clone()).or_insert(0) += quantity;

        self.lines.push(OrderLine {
            variant_id: variant.id.clone(),
            quantity,
            unit_price: variant.unit_price,
            subtotal,
        });
        Ok(&self.lines[self.lines.len() - 1])
    }

    pub fn finish(self) -> PricedOrder {
        PricedOrder {
            lines: self.lines,
            total: self.total,
        }
    }
}

/// Prices a complete set of `(variant, quantity)` pairs.
///
/// Stops at the first failing line.
pub fn price_order<'a>(
    lines: impl IntoIterator<Item = (&'a Variant, u32)>,
) -> Result<PricedOrder, OrderError> {
    let mut calculator = PricingCalculator::new();
    for (variant, quantity) in lines {
        calculator.add_line(variant, quantity)?;
    }
    Ok(calculator.finish())
}

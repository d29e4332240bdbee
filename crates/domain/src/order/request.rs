//! Order placement requests.

use crate::catalog::VariantId;
use crate::error::OrderError;

use super::{DeliveryMethod, PaymentMethod};

/// One requested line: a variant and how many of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(variant_id: impl Into<VariantId>, quantity: u32) -> Self {
        Self {
            variant_id: variant_id.into(),
            quantity,
        }
    }
}

/// A checkout request as submitted by the customer.
///
/// Carries no prices: unit prices are always read from inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderRequest {
    pub lines: Vec<LineRequest>,
    pub special_instructions: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
    pub payment_method: Option<PaymentMethod>,
}

impl OrderRequest {
    /// Creates a request for the given lines with no options selected.
    pub fn new(lines: Vec<LineRequest>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.special_instructions = Some(instructions.into());
        self
    }

    pub fn with_delivery(mut self, method: DeliveryMethod) -> Self {
        self.delivery_method = Some(method);
        self
    }

    pub fn with_payment(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    /// Checks the shape of the request before any inventory is consulted.
    ///
    /// Blank instructions are normalized to `None`.
    pub fn validate(self) -> Result<ValidatedOrderRequest, OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        if let Some(line) = self.lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                variant_id: line.variant_id.clone(),
                quantity: line.quantity,
            });
        }

        let special_instructions = self
            .special_instructions
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(ValidatedOrderRequest {
            lines: self.lines,
            special_instructions,
            delivery_method: self.delivery_method,
            payment_method: self.payment_method,
        })
    }
}

/// An [`OrderRequest`] that passed shape validation: at least one line and
/// every quantity positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrderRequest {
    lines: Vec<LineRequest>,
    special_instructions: Option<String>,
    delivery_method: Option<DeliveryMethod>,
    payment_method: Option<PaymentMethod>,
}

impl ValidatedOrderRequest {
    /// Lines in submitted order.
    pub fn lines(&self) -> &[LineRequest] {
        &self.lines
    }

    pub fn special_instructions(&self) -> Option<&str> {
        self.special_instructions.as_deref()
    }

    pub fn delivery_method(&self) -> Option<DeliveryMethod> {
        self.delivery_method
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }
}

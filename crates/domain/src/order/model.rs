//! Persistent order aggregate: header, lines, delivery and payment.

use chrono::{DateTime, Utc};
use common::{OrderId, PrincipalId};
use serde::{Deserialize, Serialize};

use crate::catalog::VariantId;
use crate::money::Money;

use super::OrderStatus;

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    StandardDelivery,
    StorePickup,
}

impl DeliveryMethod {
    /// Estimated lead time in days for this method.
    pub fn estimated_days(&self) -> u32 {
        match self {
            DeliveryMethod::StorePickup => 1,
            DeliveryMethod::StandardDelivery => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::StandardDelivery => "standard_delivery",
            DeliveryMethod::StorePickup => "store_pickup",
        }
    }
}

impl std::str::FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard_delivery" => Ok(DeliveryMethod::StandardDelivery),
            "store_pickup" => Ok(DeliveryMethod::StorePickup),
            other => Err(format!("unknown delivery method: {other}")),
        }
    }
}

/// How the customer pays for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CardPayment,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CardPayment => "card_payment",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card_payment" => Ok(PaymentMethod::CardPayment),
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Status of a delivery record.
///
/// Placement always creates deliveries as `Pending`, and nothing in the
/// order lifecycle moves them on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

/// Status of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// The order row itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub id: OrderId,
    pub principal_id: PrincipalId,
    pub status: OrderStatus,
    /// Sum of all line subtotals.
    pub total_amount: Money,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A line of a placed order.
///
/// `unit_price` is the price snapshot taken when the order was validated and
/// is never re-read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Delivery record attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub method: DeliveryMethod,
    pub status: DeliveryStatus,
    pub estimated_days: u32,
}

impl Delivery {
    /// Creates a pending delivery whose lead time follows from `method`.
    pub fn pending(method: DeliveryMethod) -> Self {
        Self {
            method,
            status: DeliveryStatus::Pending,
            estimated_days: method.estimated_days(),
        }
    }
}

/// Payment record attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Mirrors the order total.
    pub amount: Money,
}

impl Payment {
    /// Creates a pending payment for `amount`.
    pub fn pending(method: PaymentMethod, amount: Money) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            amount,
        }
    }
}

/// A placed order with everything it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub header: OrderHeader,
    pub lines: Vec<OrderLine>,
    pub delivery: Option<Delivery>,
    pub payment: Option<Payment>,
}

impl Order {
    pub fn id(&self) -> OrderId {
        self.header.id
    }

    pub fn status(&self) -> OrderStatus {
        self.header.status
    }
}

/// Result of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub total_amount: Money,
    /// Number of accepted lines.
    pub line_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_days_follow_method() {
        assert_eq!(Delivery::pending(DeliveryMethod::StorePickup).estimated_days, 1);
        assert_eq!(
            Delivery::pending(DeliveryMethod::StandardDelivery).estimated_days,
            5
        );
    }

    #[test]
    fn test_new_records_start_pending() {
        assert_eq!(
            Delivery::pending(DeliveryMethod::StorePickup).status,
            DeliveryStatus::Pending
        );
        let payment = Payment::pending(PaymentMethod::CardPayment, Money::from_cents(199_800));
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount.cents(), 199_800);
    }

    #[test]
    fn test_methods_deserialize_from_wire_names() {
        let method: DeliveryMethod = serde_json::from_str("\"store_pickup\"").unwrap();
        assert_eq!(method, DeliveryMethod::StorePickup);

        let method: PaymentMethod = serde_json::from_str("\"cash_on_delivery\"").unwrap();
        assert_eq!(method, PaymentMethod::CashOnDelivery);

        assert!(serde_json::from_str::<PaymentMethod>("\"bitcoin\"").is_err());
    }

    #[test]
    fn test_method_strings_round_trip() {
        for method in [DeliveryMethod::StandardDelivery, DeliveryMethod::StorePickup] {
            assert_eq!(method.as_str().parse::<DeliveryMethod>(), Ok(method));
        }
        for method in [PaymentMethod::CardPayment, PaymentMethod::CashOnDelivery] {
            assert_eq!(method.as_str().parse::<PaymentMethod>(), Ok(method));
        }
    }
}

//! Order domain types and pricing math.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souq_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

/// A shipping or billing address.
///
/// Addresses are opaque to the workflow: clients send whatever shape
/// their checkout collects and get it back unchanged. The only rule is
/// that a shipping address must be a non-empty JSON object.
pub type Address = serde_json::Value;

/// An order line item: an immutable snapshot of the product at
/// placement time. Later product edits do not touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    /// Primary image URL at placement time, or empty.
    pub image: String,
    pub variant: Option<String>,
}

impl OrderItem {
    /// Line total (price x quantity).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Order pricing breakdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pricing {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl Pricing {
    /// Compute the full breakdown from its parts.
    ///
    /// `total = max(0, subtotal + shipping + tax - discount)`. The server
    /// always computes this itself; client-sent subtotals and totals are
    /// ignored.
    #[must_use]
    pub fn compute(subtotal: Decimal, shipping: Decimal, tax: Decimal, discount: Decimal) -> Self {
        let total = (subtotal + shipping + tax - discount).max(Decimal::ZERO);
        Self {
            subtotal,
            shipping,
            tax,
            discount,
            total,
        }
    }
}

/// Payment details attached to an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// Fulfilment tracking sub-record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Set once, on the first transition to `shipped`.
    pub shipped_at: Option<DateTime<Utc>>,
    /// Set once, on the first transition to `delivered`.
    pub delivered_at: Option<DateTime<Utc>>,
}

/// A customer order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable order number, assigned before persistence and
    /// immutable afterwards.
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub pricing: Pricing,
    pub payment: Payment,
    pub status: OrderStatus,
    pub shipping: ShippingInfo,
    /// Set once, on the first transition to `cancelled`.
    pub cancelled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether this order contains the given product.
    #[must_use]
    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }
}

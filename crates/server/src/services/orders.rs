//! Order placement and lifecycle.
//!
//! Placement is server-authoritative: unit prices, names, and images
//! on the order lines come from the catalog at placement time, never
//! from the client. Stock reservation and the order insert commit as
//! one unit through [`crate::store::OrderStore::insert_order`].

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use souq_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

use crate::models::{Address, Order, OrderItem, Payment, Pricing, ShippingInfo};
use crate::store::{Store, StoreError, StockAdjustment};

use super::{base36, random_base36};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order must contain at least one item")]
    EmptyCart,

    #[error("item quantity must be at least 1")]
    InvalidQuantity,

    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("insufficient stock for product {product_id} (available: {available})")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
    },

    #[error("order not found")]
    NotFound,

    #[error("order cannot be cancelled while {0}")]
    NotCancellable(OrderStatus),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
pub struct OrderLineInput {
    pub product_id: ProductId,
    pub quantity: u32,
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrder {
    pub items: Vec<OrderLineInput>,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Shipping, tax, and discount are accepted as charges; the
    /// subtotal and total are always recomputed server-side.
    #[serde(default)]
    pub shipping: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<chrono::DateTime<Utc>>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
}

impl OrderService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate the cart, price it from the catalog, and commit the
    /// order together with its stock reservations.
    pub async fn place_order(
        &self,
        user_id: UserId,
        input: PlaceOrder,
    ) -> Result<Order, OrderError> {
        if input.items.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if !input
            .shipping_address
            .as_object()
            .is_some_and(|fields| !fields.is_empty())
        {
            return Err(OrderError::Validation(
                "shipping address is required".to_owned(),
            ));
        }
        if input.shipping < Decimal::ZERO
            || input.tax < Decimal::ZERO
            || input.discount < Decimal::ZERO
        {
            return Err(OrderError::Validation(
                "charges cannot be negative".to_owned(),
            ));
        }

        let mut items = Vec::with_capacity(input.items.len());
        let mut reservations = Vec::with_capacity(input.items.len());
        let mut subtotal = Decimal::ZERO;
        for line in &input.items {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity);
            }
            let product = self
                .store
                .product(line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or(OrderError::ProductUnavailable(line.product_id))?;
            let line_revenue = product.price * Decimal::from(line.quantity);
            subtotal += line_revenue;
            items.push(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                quantity: line.quantity,
                image: product.primary_image_url().to_owned(),
                variant: line.variant.clone(),
            });
            reservations.push(StockAdjustment {
                product_id: product.id,
                quantity: i64::from(line.quantity),
                revenue: line_revenue,
            });
        }

        let pricing = Pricing::compute(subtotal, input.shipping, input.tax, input.discount);
        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            order_number: generate_order_number(),
            user_id,
            items,
            billing_address: input
                .billing_address
                .unwrap_or_else(|| input.shipping_address.clone()),
            shipping_address: input.shipping_address,
            pricing,
            payment: Payment {
                method: input.payment_method,
                status: PaymentStatus::Pending,
                transaction_id: None,
            },
            status: OrderStatus::Pending,
            shipping: ShippingInfo::default(),
            cancelled_at: None,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert_order(order, &reservations)
            .await
            .map_err(|e| match e {
                StoreError::InsufficientStock {
                    product_id,
                    available,
                } => OrderError::InsufficientStock {
                    product_id,
                    available,
                },
                other => OrderError::Store(other),
            })
    }

    pub async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
        self.store.order(id).await?.ok_or(OrderError::NotFound)
    }

    /// Admin-driven status transition. Lifecycle timestamps are set
    /// the first time their status is reached and never overwritten;
    /// moving to cancelled restores stock exactly once.
    pub async fn update_status(
        &self,
        id: OrderId,
        update: StatusUpdate,
    ) -> Result<Order, OrderError> {
        let mut order = self.get(id).await?;
        let now = Utc::now();

        if let Some(tracking) = update.tracking_number {
            order.shipping.tracking_number = Some(tracking);
        }
        if let Some(eta) = update.estimated_delivery {
            order.shipping.estimated_delivery = Some(eta);
        }

        let mut restock = Vec::new();
        match update.status {
            OrderStatus::Shipped => {
                order.shipping.shipped_at.get_or_insert(now);
            }
            OrderStatus::Delivered => {
                order.shipping.delivered_at.get_or_insert(now);
            }
            // The reversal runs only on the first cancellation ever,
            // keyed on cancelled_at. An order that was cancelled,
            // revived, and cancelled again must not restock twice.
            OrderStatus::Cancelled => {
                if order.cancelled_at.is_none() {
                    order.cancelled_at = Some(now);
                    restock = reversal_of(&order);
                }
            }
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing => {}
        }
        order.status = update.status;
        order.updated_at = now;

        Ok(self.store.update_order(order, &restock).await?)
    }

    /// Customer-initiated cancellation, allowed while the order has
    /// not started fulfilment.
    pub async fn cancel(&self, id: OrderId, user_id: UserId) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        if order.user_id != user_id {
            return Err(OrderError::NotFound);
        }
        match order.status {
            OrderStatus::Pending | OrderStatus::Confirmed => {
                self.update_status(
                    id,
                    StatusUpdate {
                        status: OrderStatus::Cancelled,
                        ..Default::default()
                    },
                )
                .await
            }
            OrderStatus::Cancelled => Ok(order),
            other => Err(OrderError::NotCancellable(other)),
        }
    }
}

/// The stock adjustments that undo an order's reservations.
fn reversal_of(order: &Order) -> Vec<StockAdjustment> {
    order
        .items
        .iter()
        .map(|item| StockAdjustment {
            product_id: item.product_id,
            quantity: i64::from(item.quantity),
            revenue: item.line_total(),
        })
        .collect()
}

/// `ORD-YYYYMMDD-<base36 millis>-<random>`, uppercased.
fn generate_order_number() -> String {
    let now = Utc::now();
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    format!(
        "ORD-{}-{}-{}",
        now.format("%Y%m%d"),
        base36(millis),
        random_base36(6)
    )
    .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn order_numbers_have_expected_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[3].len(), 6);
        assert_eq!(number, number.to_uppercase());
    }

    #[test]
    fn order_numbers_do_not_collide() {
        let numbers: HashSet<String> = (0..10_000).map(|_| generate_order_number()).collect();
        assert_eq!(numbers.len(), 10_000);
    }
}

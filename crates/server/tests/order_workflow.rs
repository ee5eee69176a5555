//! Order placement and lifecycle, exercised through the services over
//! the in-memory store.

#![allow(clippy::unwrap_used)]

mod common;

use rust_decimal::Decimal;
use serde_json::json;

use souq_core::{OrderStatus, PaymentStatus};
use souq_server::services::OrderError;
use souq_server::services::orders::{OrderLineInput, PlaceOrder, StatusUpdate};
use souq_server::store::Page;

fn cart(product_id: souq_core::ProductId, quantity: u32) -> PlaceOrder {
    PlaceOrder {
        items: vec![OrderLineInput {
            product_id,
            quantity,
            variant: None,
        }],
        shipping_address: json!({ "city": "Cairo", "street": "1 Main St" }),
        billing_address: None,
        payment_method: souq_core::PaymentMethod::Cash,
        shipping: Decimal::ZERO,
        tax: Decimal::ZERO,
        discount: Decimal::ZERO,
        notes: None,
    }
}

#[tokio::test]
async fn placement_reserves_stock_and_updates_sales() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let order = state
        .orders()
        .place_order(user_id, cart(product.id, 2))
        .await
        .unwrap();

    assert_eq!(order.pricing.subtotal, Decimal::new(2000, 2));
    assert_eq!(order.pricing.total, Decimal::new(2000, 2));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].price, Decimal::new(1000, 2));

    let product = state.store().product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock.quantity, 3);
    assert_eq!(product.sales.count, 2);
    assert_eq!(product.sales.revenue, Decimal::new(2000, 2));
}

#[tokio::test]
async fn insufficient_stock_persists_nothing() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Dates", "5.00", 5).await;

    let err = state
        .orders()
        .place_order(user_id, cart(product.id, 10))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InsufficientStock { available: 5, .. }
    ));

    let product = state.store().product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock.quantity, 5);
    assert_eq!(product.sales.count, 0);

    let (orders, total) = state
        .store()
        .orders(Some(user_id), Page::clamped(None, None, 10))
        .await
        .unwrap();
    assert!(orders.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn multi_line_failure_rolls_back_earlier_lines() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let plenty = common::seed_product(&state, "Tea", "4.00", 50).await;
    let scarce = common::seed_product(&state, "Saffron", "90.00", 1).await;

    let mut input = cart(plenty.id, 3);
    input.items.push(OrderLineInput {
        product_id: scarce.id,
        quantity: 2,
        variant: None,
    });

    let err = state.orders().place_order(user_id, input).await.unwrap_err();
    assert!(matches!(err, OrderError::InsufficientStock { .. }));

    let plenty = state.store().product(plenty.id).await.unwrap().unwrap();
    assert_eq!(plenty.stock.quantity, 50);
    assert_eq!(plenty.sales.count, 0);
}

#[tokio::test]
async fn cancellation_restores_stock_exactly_once() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let order = state
        .orders()
        .place_order(user_id, cart(product.id, 2))
        .await
        .unwrap();

    let cancelled = state.orders().cancel(order.id, user_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    let restored = state.store().product(product.id).await.unwrap().unwrap();
    assert_eq!(restored.stock.quantity, 5);
    assert_eq!(restored.sales.count, 0);
    assert_eq!(restored.sales.revenue, Decimal::ZERO);

    // Cancelling again is a no-op, not a second restock.
    let again = state.orders().cancel(order.id, user_id).await.unwrap();
    assert_eq!(again.status, OrderStatus::Cancelled);
    let product = state.store().product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock.quantity, 5);
}

#[tokio::test]
async fn recancelling_a_revived_order_does_not_restock_again() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let order = state
        .orders()
        .place_order(user_id, cart(product.id, 2))
        .await
        .unwrap();
    state.orders().cancel(order.id, user_id).await.unwrap();

    // An admin can revive a cancelled order and cancel it again; the
    // stock reversal must still happen only once.
    for status in [OrderStatus::Pending, OrderStatus::Cancelled] {
        state
            .orders()
            .update_status(
                order.id,
                StatusUpdate {
                    status,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let product = state.store().product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock.quantity, 5);
    assert_eq!(product.sales.count, 0);
    assert_eq!(product.sales.revenue, Decimal::ZERO);
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled_by_customer() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;
    let order = state
        .orders()
        .place_order(user_id, cart(product.id, 1))
        .await
        .unwrap();

    state
        .orders()
        .update_status(
            order.id,
            StatusUpdate {
                status: OrderStatus::Shipped,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = state.orders().cancel(order.id, user_id).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::NotCancellable(OrderStatus::Shipped)
    ));
}

#[tokio::test]
async fn lifecycle_timestamps_are_set_once() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;
    let order = state
        .orders()
        .place_order(user_id, cart(product.id, 1))
        .await
        .unwrap();

    let delivered = state
        .orders()
        .update_status(
            order.id,
            StatusUpdate {
                status: OrderStatus::Delivered,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let first_stamp = delivered.shipping.delivered_at.unwrap();
    // Delivery does not touch the payment record.
    assert_eq!(delivered.payment.status, PaymentStatus::Pending);

    let repeated = state
        .orders()
        .update_status(
            order.id,
            StatusUpdate {
                status: OrderStatus::Delivered,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(repeated.shipping.delivered_at.unwrap(), first_stamp);
}

#[tokio::test]
async fn empty_cart_and_zero_quantity_are_rejected() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let mut empty = cart(product.id, 1);
    empty.items.clear();
    assert!(matches!(
        state.orders().place_order(user_id, empty).await.unwrap_err(),
        OrderError::EmptyCart
    ));

    assert!(matches!(
        state
            .orders()
            .place_order(user_id, cart(product.id, 0))
            .await
            .unwrap_err(),
        OrderError::InvalidQuantity
    ));
}

#[tokio::test]
async fn shipping_address_must_be_a_non_empty_object() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let mut input = cart(product.id, 1);
    input.shipping_address = json!({});
    assert!(matches!(
        state.orders().place_order(user_id, input).await.unwrap_err(),
        OrderError::Validation(_)
    ));

    let mut input = cart(product.id, 1);
    input.shipping_address = serde_json::Value::Null;
    assert!(matches!(
        state.orders().place_order(user_id, input).await.unwrap_err(),
        OrderError::Validation(_)
    ));

    // Nothing was reserved by the rejected attempts.
    let product = state.store().product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock.quantity, 5);
}

#[tokio::test]
async fn discount_cannot_push_total_below_zero() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let mut input = cart(product.id, 1);
    input.discount = Decimal::new(9999, 2);
    let order = state.orders().place_order(user_id, input).await.unwrap();
    assert_eq!(order.pricing.total, Decimal::ZERO);
    assert_eq!(order.pricing.subtotal, Decimal::new(1000, 2));
}

#[tokio::test]
async fn inactive_products_cannot_be_ordered() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    state
        .catalog()
        .update_product(
            product.id,
            souq_server::services::catalog::ProductPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = state
        .orders()
        .place_order(user_id, cart(product.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ProductUnavailable(id) if id == product.id));
}

//! Review creation, moderation, and the product rating aggregate.

#![allow(clippy::unwrap_used)]

mod common;

use serde_json::json;

use souq_core::OrderStatus;
use souq_server::services::ReviewError;
use souq_server::services::orders::{OrderLineInput, PlaceOrder, StatusUpdate};
use souq_server::services::reviews::ReviewInput;

fn review(product_id: souq_core::ProductId, rating: u8) -> ReviewInput {
    ReviewInput {
        product_id,
        order_id: None,
        rating,
        title: String::new(),
        comment: format!("{rating} stars"),
        images: Vec::new(),
    }
}

#[tokio::test]
async fn aggregate_is_mean_of_approved_ratings() {
    let state = common::test_state();
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    for (i, rating) in [5u8, 3, 4].iter().enumerate() {
        let (user_id, _) =
            common::register_user(&state, "Reviewer", &format!("r{i}@example.com")).await;
        state
            .reviews()
            .create(user_id, review(product.id, *rating))
            .await
            .unwrap();
    }

    let product = state.store().product(product.id).await.unwrap().unwrap();
    assert!((product.rating.average - 4.0).abs() < f64::EPSILON);
    assert_eq!(product.rating.count, 3);
}

#[tokio::test]
async fn one_review_per_user_and_product() {
    let state = common::test_state();
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;
    let (user_id, _) = common::register_user(&state, "Reviewer", "r@example.com").await;

    state
        .reviews()
        .create(user_id, review(product.id, 5))
        .await
        .unwrap();
    let err = state
        .reviews()
        .create(user_id, review(product.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::AlreadyReviewed));

    let product = state.store().product(product.id).await.unwrap().unwrap();
    assert_eq!(product.rating.count, 1);
}

#[tokio::test]
async fn unapproving_recomputes_the_aggregate() {
    let state = common::test_state();
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let mut ids = Vec::new();
    for (i, rating) in [5u8, 3].iter().enumerate() {
        let (user_id, _) =
            common::register_user(&state, "Reviewer", &format!("r{i}@example.com")).await;
        let created = state
            .reviews()
            .create(user_id, review(product.id, *rating))
            .await
            .unwrap();
        ids.push(created.id);
    }

    state.reviews().set_approval(ids[1], false).await.unwrap();

    let product = state.store().product(product.id).await.unwrap().unwrap();
    assert!((product.rating.average - 5.0).abs() < f64::EPSILON);
    assert_eq!(product.rating.count, 1);
}

#[tokio::test]
async fn delivered_order_marks_review_verified() {
    let state = common::test_state();
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;

    let order = state
        .orders()
        .place_order(
            user_id,
            PlaceOrder {
                items: vec![OrderLineInput {
                    product_id: product.id,
                    quantity: 1,
                    variant: None,
                }],
                shipping_address: json!({ "city": "Cairo" }),
                billing_address: None,
                payment_method: souq_core::PaymentMethod::Cash,
                shipping: rust_decimal::Decimal::ZERO,
                tax: rust_decimal::Decimal::ZERO,
                discount: rust_decimal::Decimal::ZERO,
                notes: None,
            },
        )
        .await
        .unwrap();
    state
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

    let mut input = review(product.id, 5);
    input.order_id = Some(order.id);
    let created = state.reviews().create(user_id, input).await.unwrap();
    assert!(created.is_verified);

    // An undelivered order does not verify.
    let (other_id, _) = common::register_user(&state, "Other", "other@example.com").await;
    let mut input = review(product.id, 4);
    input.order_id = Some(order.id);
    let created = state.reviews().create(other_id, input).await.unwrap();
    assert!(!created.is_verified);
}

#[tokio::test]
async fn helpful_vote_toggles() {
    let state = common::test_state();
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;
    let (author, _) = common::register_user(&state, "Author", "author@example.com").await;
    let (voter, _) = common::register_user(&state, "Voter", "voter@example.com").await;

    let created = state
        .reviews()
        .create(author, review(product.id, 5))
        .await
        .unwrap();

    let (_, set) = state.reviews().toggle_helpful(created.id, voter).await.unwrap();
    assert!(set);
    let (updated, set) = state.reviews().toggle_helpful(created.id, voter).await.unwrap();
    assert!(!set);
    assert_eq!(updated.helpful_count(), 0);
}

#[tokio::test]
async fn out_of_range_ratings_are_rejected() {
    let state = common::test_state();
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;
    let (user_id, _) = common::register_user(&state, "Reviewer", "r@example.com").await;

    for rating in [0u8, 6] {
        let err = state
            .reviews()
            .create(user_id, review(product.id, rating))
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidRating));
    }
}

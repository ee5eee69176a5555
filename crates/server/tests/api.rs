//! End-to-end HTTP tests through the router with the in-memory store.

#![allow(clippy::unwrap_used)]

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use souq_server::state::AppState;

fn app(state: &AppState) -> Router {
    souq_server::app(state.clone())
}

async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_check() {
    let state = common::test_state();
    let (status, body) = send(&state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_and_me() {
    let state = common::test_state();

    let (status, body) = send(
        &state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "Test", "email": "T@Example.com", "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    // Emails normalize to lowercase.
    assert_eq!(body["user"]["email"], "t@example.com");

    let (status, body) = send(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "t@example.com", "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_owned();

    let (status, body) = send(&state, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Test");
    // The password hash never leaves the server.
    assert!(body["user"].get("password_hash").is_none());

    let (status, _) = send(&state, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let state = common::test_state();
    common::register_user(&state, "First", "dup@example.com").await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "Second", "email": "dup@example.com", "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let state = common::test_state();
    let (_, token) = common::register_user(&state, "Test", "t@example.com").await;

    let (status, _) = send(&state, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&state, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_are_gated() {
    let state = common::test_state();
    let (_, user_token) = common::register_user(&state, "User", "u@example.com").await;

    let input = json!({
        "name": "Hidden",
        "description": "nope",
        "price": "1.00",
        "category_id": souq_core::CategoryId::generate(),
    });
    let (status, _) = send(
        &state,
        "POST",
        "/api/products",
        Some(&user_token),
        Some(input.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&state, "POST", "/api/products", None, Some(input)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&state, "GET", "/api/dashboard/stats", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn product_crud_and_listing() {
    let state = common::test_state();
    let (_, admin_token) = common::register_admin(&state, "admin@example.com").await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/categories",
        Some(&admin_token),
        Some(json!({ "name": "Sweeteners" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["category"]["slug"], "sweeteners");
    let category_id = body["category"]["id"].as_str().unwrap().to_owned();

    let (status, body) = send(
        &state,
        "POST",
        "/api/products",
        Some(&admin_token),
        Some(json!({
            "name": "Mountain Honey",
            "description": "Raw honey",
            "price": "25.50",
            "category_id": category_id,
            "stock": { "quantity": 8, "track_inventory": true, "low_stock_threshold": 3 },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["product"]["slug"], "mountain-honey");
    let product_id = body["product"]["id"].as_str().unwrap().to_owned();

    let (status, body) = send(&state, "GET", "/api/products?search=honey", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["total"], 1);
    assert_eq!(body["products"][0]["id"].as_str().unwrap(), product_id);

    // Deactivate it; the public listing and detail stop showing it.
    let (status, _) = send(
        &state,
        "PUT",
        &format!("/api/products/{product_id}"),
        Some(&admin_token),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&state, "GET", "/api/products", None, None).await;
    assert_eq!(body["count"], 0);
    let (status, _) = send(&state, "GET", &format!("/api/products/{product_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Admins still see it.
    let (status, _) = send(
        &state,
        "GET",
        &format!("/api/products/{product_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn featured_flag_toggles_and_filters() {
    let state = common::test_state();
    let (_, admin_token) = common::register_admin(&state, "admin@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let (_, body) = send(&state, "GET", "/api/products/featured", None, None).await;
    assert_eq!(body["count"], 0);

    let (status, body) = send(
        &state,
        "PUT",
        &format!("/api/products/{}/featured", product.id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_featured"], true);

    let (_, body) = send(&state, "GET", "/api/products/featured", None, None).await;
    assert_eq!(body["count"], 1);

    let (_, body) = send(
        &state,
        "PUT",
        &format!("/api/products/{}/featured", product.id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(body["is_featured"], false);
}

#[tokio::test]
async fn product_detail_carries_recent_reviews() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    state
        .reviews()
        .create(
            user_id,
            souq_server::services::reviews::ReviewInput {
                product_id: product.id,
                order_id: None,
                rating: 5,
                title: "Great".to_owned(),
                comment: "Would buy again".to_owned(),
                images: Vec::new(),
            },
        )
        .await
        .unwrap();

    let (status, body) = send(&state, "GET", &format!("/api/products/{}", product.id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reviews"][0]["rating"], 5);
    assert_eq!(body["product"]["rating"]["average"], 5.0);

    let (status, body) = send(
        &state,
        "GET",
        &format!("/api/reviews?product_id={}", product.id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn category_with_products_cannot_be_deleted() {
    let state = common::test_state();
    let (_, admin_token) = common::register_admin(&state, "admin@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let (status, _) = send(
        &state,
        "DELETE",
        &format!("/api/categories/{}", product.category_id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_placement_over_http() {
    let state = common::test_state();
    let (_, token) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/orders",
        Some(&token),
        Some(json!({
            "items": [{ "product_id": product.id, "quantity": 2 }],
            "shipping_address": { "city": "Cairo" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["pricing"]["total"], "20.00");
    assert!(
        body["order"]["order_number"]
            .as_str()
            .unwrap()
            .starts_with("ORD-")
    );

    // Over-ordering the remaining stock fails with a client error.
    let (status, body) = send(
        &state,
        "POST",
        "/api/orders",
        Some(&token),
        Some(json!({
            "items": [{ "product_id": product.id, "quantity": 4 }],
            "shipping_address": { "city": "Cairo" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(&state, "GET", "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn other_users_orders_are_forbidden() {
    let state = common::test_state();
    let (buyer_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let (_, other_token) = common::register_user(&state, "Other", "other@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let order = state
        .orders()
        .place_order(
            buyer_id,
            souq_server::services::orders::PlaceOrder {
                items: vec![souq_server::services::orders::OrderLineInput {
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

    let (status, _) = send(
        &state,
        "GET",
        &format!("/api/orders/{}", order.id),
        Some(&other_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wishlist_round_trip() {
    let state = common::test_state();
    let (_, token) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 5).await;

    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/wishlist/{}", product.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    // Adding twice does not duplicate.
    let (_, body) = send(
        &state,
        "POST",
        &format!("/api/wishlist/{}", product.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["count"], 1);

    let (_, body) = send(&state, "GET", "/api/wishlist", Some(&token), None).await;
    assert_eq!(body["products"][0]["name"], "Honey");

    let (_, body) = send(
        &state,
        "DELETE",
        &format!("/api/wishlist/{}", product.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn newsletter_subscribe_and_resubscribe() {
    let state = common::test_state();

    let (status, _) = send(
        &state,
        "POST",
        "/api/newsletter/subscribe",
        None,
        Some(json!({ "email": "fan@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Subscribing again succeeds quietly.
    let (status, _) = send(
        &state,
        "POST",
        "/api/newsletter/subscribe",
        None,
        Some(json!({ "email": "fan@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        "POST",
        "/api/newsletter/unsubscribe",
        None,
        Some(json!({ "email": "fan@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Resubscribing reactivates instead of conflicting.
    let (status, _) = send(
        &state,
        "POST",
        "/api/newsletter/subscribe",
        None,
        Some(json!({ "email": "fan@example.com", "source": "popup" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, admin_token) = common::register_admin(&state, "admin@example.com").await;
    let (status, body) = send(
        &state,
        "GET",
        "/api/newsletter/subscribers?status=active",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["subscribers"][0]["source"], "popup");

    // Admins can flip the status directly.
    let id = body["subscribers"][0]["id"].as_str().unwrap().to_owned();
    let (status, body) = send(
        &state,
        "PUT",
        &format!("/api/newsletter/subscribers/{id}/status"),
        Some(&admin_token),
        Some(json!({ "status": "unsubscribed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscriber"]["status"], "unsubscribed");
}

#[tokio::test]
async fn contact_form_validation_and_triage() {
    let state = common::test_state();

    let (status, _) = send(
        &state,
        "POST",
        "/api/contact",
        None,
        Some(json!({ "name": "Visitor", "email": "not-an-email", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        "POST",
        "/api/contact",
        None,
        Some(json!({ "name": "Visitor", "email": "v@example.com", "message": "Hello there" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, admin_token) = common::register_admin(&state, "admin@example.com").await;
    let (status, body) = send(&state, "GET", "/api/contact", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let id = body["messages"][0]["id"].as_str().unwrap().to_owned();
    assert_eq!(body["messages"][0]["is_read"], false);

    // Reading marks the message read.
    let (_, body) = send(
        &state,
        "GET",
        &format!("/api/contact/{id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(body["contact"]["is_read"], true);
    assert_eq!(body["contact"]["status"], "read");
}

#[tokio::test]
async fn public_stats_exclude_cancelled_orders() {
    let state = common::test_state();
    let (user_id, _) = common::register_user(&state, "Buyer", "buyer@example.com").await;
    let product = common::seed_product(&state, "Honey", "10.00", 10).await;

    for _ in 0..2 {
        state
            .orders()
            .place_order(
                user_id,
                souq_server::services::orders::PlaceOrder {
                    items: vec![souq_server::services::orders::OrderLineInput {
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
    }
    let (orders, _) = state
        .store()
        .orders(Some(user_id), souq_server::store::Page::clamped(None, None, 10))
        .await
        .unwrap();
    state.orders().cancel(orders[0].id, user_id).await.unwrap();

    let (status, body) = send(&state, "GET", "/api/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["orders"], 1);
    assert_eq!(body["stats"]["products"], 1);

    let (_, admin_token) = common::register_admin(&state, "admin@example.com").await;
    let (status, body) = send(&state, "GET", "/api/dashboard/stats", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    // Cancelled revenue is excluded from the headline number.
    assert_eq!(body["stats"]["revenue"], "10.00");
    assert_eq!(body["stats"]["orders"], 2);
}

//! Shared helpers for integration tests. Everything runs against the
//! in-memory store backend.

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;

use souq_core::Role;
use souq_server::config::AppConfig;
use souq_server::models::Product;
use souq_server::services::catalog::{CategoryInput, ProductInput};
use souq_server::state::AppState;
use souq_server::store::MemoryStore;

pub fn test_state() -> AppState {
    let config = AppConfig {
        database_url: SecretString::from("postgres://unused"),
        host: "127.0.0.1".parse().expect("valid ip"),
        port: 0,
        session_ttl_days: 30,
        sentry_dsn: None,
    };
    AppState::new(config, Arc::new(MemoryStore::new()))
}

/// Register a user and return (user id, bearer token).
pub async fn register_user(
    state: &AppState,
    name: &str,
    email: &str,
) -> (souq_core::UserId, String) {
    let session = state
        .auth()
        .register(name, email, "password1")
        .await
        .expect("register");
    (session.user.id, session.token)
}

/// Register a user and promote it to admin.
pub async fn register_admin(state: &AppState, email: &str) -> (souq_core::UserId, String) {
    let (user_id, token) = register_user(state, "Admin", email).await;
    let mut user = state
        .store()
        .user(user_id)
        .await
        .expect("store")
        .expect("user exists");
    user.role = Role::Admin;
    state.store().update_user(user).await.expect("update");
    (user_id, token)
}

/// Seed a category and an active product with the given price and
/// tracked stock quantity.
pub async fn seed_product(state: &AppState, name: &str, price: &str, stock: i64) -> Product {
    let category = state
        .catalog()
        .create_category(CategoryInput {
            name: format!("{name} category"),
            slug: None,
            description: None,
            image: String::new(),
            parent_id: None,
            sort_order: 0,
            is_active: None,
        })
        .await
        .expect("category");

    state
        .catalog()
        .create_product(ProductInput {
            name: name.to_owned(),
            slug: None,
            description: format!("{name} description"),
            short_description: None,
            price: price.parse::<Decimal>().expect("decimal"),
            compare_price: None,
            sku: None,
            category_id: category.id,
            images: Vec::new(),
            stock: souq_server::models::Stock {
                quantity: stock,
                track_inventory: true,
                low_stock_threshold: 10,
            },
            tags: Vec::new(),
            is_active: None,
            is_featured: None,
        })
        .await
        .expect("product")
}

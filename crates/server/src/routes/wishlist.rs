//! Wishlist route handlers.
//!
//! The wishlist is an ordered, deduplicated list of product IDs on the
//! user record; listing resolves them against the catalog and silently
//! drops products that no longer exist.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde_json::json;
use tracing::instrument;

use souq_core::ProductId;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>> {
    let mut products = Vec::with_capacity(user.wishlist.len());
    for product_id in &user.wishlist {
        if let Some(product) = state.store().product(*product_id).await? {
            products.push(product);
        }
    }
    Ok(Json(json!({
        "success": true,
        "count": products.len(),
        "products": products,
    })))
}

#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn add(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<serde_json::Value>> {
    state
        .store()
        .product(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("product".to_owned()))?;

    if !user.wishlist.contains(&product_id) {
        user.wishlist.push(product_id);
        user.updated_at = Utc::now();
        user = state.store().update_user(user).await?;
    }
    Ok(Json(json!({
        "success": true,
        "count": user.wishlist.len(),
        "wishlist": user.wishlist,
    })))
}

#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<serde_json::Value>> {
    if user.wishlist.contains(&product_id) {
        user.wishlist.retain(|id| *id != product_id);
        user.updated_at = Utc::now();
        user = state.store().update_user(user).await?;
    }
    Ok(Json(json!({
        "success": true,
        "count": user.wishlist.len(),
        "wishlist": user.wishlist,
    })))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
) -> Result<Json<serde_json::Value>> {
    if !user.wishlist.is_empty() {
        user.wishlist.clear();
        user.updated_at = Utc::now();
        state.store().update_user(user).await?;
    }
    Ok(Json(json!({ "success": true, "count": 0, "wishlist": [] })))
}

//! Order route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::json;
use tracing::instrument;

use souq_core::OrderId;

use crate::error::{AppError, Result};
use crate::middleware::{CurrentUser, RequireAdmin};
use crate::services::orders::{PlaceOrder, StatusUpdate};
use crate::state::AppState;

use super::PageQuery;

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let order = state.orders().place_order(user.id, input).await?;
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.pricing.total,
        "order placed"
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "order": order })),
    ))
}

/// The caller's own orders, newest first.
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = query.to_page();
    let (orders, total) = state.store().orders(Some(user.id), page).await?;
    Ok(Json(json!({
        "success": true,
        "count": orders.len(),
        "total": total,
        "page": page.page,
        "pages": page.pages(total),
        "orders": orders,
    })))
}

/// Every order in the store, admin only.
pub async fn all(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = query.to_page();
    let (orders, total) = state.store().orders(None, page).await?;
    Ok(Json(json!({
        "success": true,
        "count": orders.len(),
        "total": total,
        "page": page.page,
        "pages": page.pages(total),
        "orders": orders,
    })))
}

/// Order detail, visible to its owner and to admins.
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<OrderId>,
) -> Result<Json<serde_json::Value>> {
    let order = state.orders().get(id).await?;
    if order.user_id != user.id && !user.role.is_admin() {
        return Err(AppError::Forbidden("not your order".to_owned()));
    }
    Ok(Json(json!({ "success": true, "order": order })))
}

#[instrument(skip_all, fields(order_id = %id, status = %update.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<serde_json::Value>> {
    let order = state.orders().update_status(id, update).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

#[instrument(skip_all, fields(order_id = %id, user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<OrderId>,
) -> Result<Json<serde_json::Value>> {
    let order = state.orders().cancel(id, user.id).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

//! Category route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use souq_core::CategoryId;

use crate::error::{AppError, Result};
use crate::middleware::{OptionalUser, RequireAdmin};
use crate::services::catalog::CategoryInput;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Category listing. Inactive categories only show up for admins who
/// ask for them.
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<serde_json::Value>> {
    let is_admin = user.is_some_and(|u| u.role.is_admin());
    let only_active = !(query.include_inactive && is_admin);
    let categories = state.store().categories(only_active).await?;
    Ok(Json(json!({
        "success": true,
        "count": categories.len(),
        "categories": categories,
    })))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<serde_json::Value>> {
    let category = state
        .store()
        .category(id)
        .await?
        .ok_or_else(|| AppError::NotFound("category".to_owned()))?;
    Ok(Json(json!({ "success": true, "category": category })))
}

#[instrument(skip_all, fields(name = %input.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let category = state.catalog().create_category(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "category": category })),
    ))
}

#[instrument(skip_all, fields(category_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<serde_json::Value>> {
    let category = state.catalog().update_category(id, input).await?;
    Ok(Json(json!({ "success": true, "category": category })))
}

#[instrument(skip_all, fields(category_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<Json<serde_json::Value>> {
    state.catalog().delete_category(id).await?;
    Ok(Json(
        json!({ "success": true, "message": "category deleted" }),
    ))
}

//! Review route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use souq_core::{ProductId, ReviewId};

use crate::error::Result;
use crate::middleware::{CurrentUser, OptionalUser, RequireAdmin};
use crate::services::reviews::ReviewInput;
use crate::state::AppState;

use super::PageQuery;

#[instrument(skip_all, fields(user_id = %user.id, product_id = %input.product_id))]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let review = state.reviews().create(user.id, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "review": review })),
    ))
}

async fn listing(
    state: &AppState,
    user: Option<&crate::models::User>,
    product_id: ProductId,
    query: &PageQuery,
) -> Result<Json<serde_json::Value>> {
    let approved_only = !user.is_some_and(|u| u.role.is_admin());
    let page = query.to_page();
    let (reviews, total) = state
        .store()
        .reviews_for_product(product_id, approved_only, page)
        .await?;
    Ok(Json(json!({
        "success": true,
        "count": reviews.len(),
        "total": total,
        "page": page.page,
        "pages": page.pages(total),
        "reviews": reviews,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub product_id: ProductId,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Reviews filtered by product id. Admins also see unapproved ones.
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    listing(&state, user.as_ref(), query.product_id, &page).await
}

/// Reviews for a product, addressed by path.
pub async fn list_for_product(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(product_id): Path<ProductId>,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>> {
    listing(&state, user.as_ref(), product_id, &query).await
}

#[instrument(skip_all, fields(review_id = %id, user_id = %user.id))]
pub async fn toggle_helpful(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<ReviewId>,
) -> Result<Json<serde_json::Value>> {
    let (review, now_set) = state.reviews().toggle_helpful(id, user.id).await?;
    Ok(Json(json!({
        "success": true,
        "helpful": now_set,
        "helpful_count": review.helpful_count(),
        "review": review,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalForm {
    pub approved: bool,
}

#[instrument(skip_all, fields(review_id = %id, approved = form.approved))]
pub async fn set_approval(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ReviewId>,
    Json(form): Json<ApprovalForm>,
) -> Result<Json<serde_json::Value>> {
    let review = state.reviews().set_approval(id, form.approved).await?;
    Ok(Json(json!({ "success": true, "review": review })))
}

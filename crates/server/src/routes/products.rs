//! Product route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use souq_core::{CategoryId, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::{OptionalUser, RequireAdmin};
use crate::services::catalog::{ProductInput, ProductPatch};
use crate::state::AppState;
use crate::store::{Page, ProductFilter, ProductSort};

use super::PageQuery;

/// How many approved reviews ride along on the product detail.
const RECENT_REVIEWS: u32 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<CategoryId>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    pub sort: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

fn parse_sort(raw: Option<&str>) -> ProductSort {
    match raw {
        Some("price_asc") => ProductSort::PriceAsc,
        Some("price_desc") => ProductSort::PriceDesc,
        Some("rating") => ProductSort::Rating,
        Some("popular") => ProductSort::Popular,
        _ => ProductSort::Newest,
    }
}

/// Product listing with filter, sort, and pagination.
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<ProductQuery>,
) -> Result<Json<serde_json::Value>> {
    let is_admin = user.is_some_and(|u| u.role.is_admin());
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .to_page();
    let filter = ProductFilter {
        category: query.category,
        featured: query.featured,
        min_price: query.min_price,
        max_price: query.max_price,
        search: query.search,
        sort: parse_sort(query.sort.as_deref()),
        include_inactive: query.include_inactive && is_admin,
    };
    let (products, total) = state.store().products(&filter, page).await?;
    Ok(Json(json!({
        "success": true,
        "count": products.len(),
        "total": total,
        "page": page.page,
        "pages": page.pages(total),
        "products": products,
    })))
}

/// Active featured products, newest first.
pub async fn featured(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = query.to_page();
    let filter = ProductFilter {
        featured: Some(true),
        ..ProductFilter::default()
    };
    let (products, total) = state.store().products(&filter, page).await?;
    Ok(Json(json!({
        "success": true,
        "count": products.len(),
        "total": total,
        "page": page.page,
        "pages": page.pages(total),
        "products": products,
    })))
}

/// Product detail with its most recent approved reviews.
pub async fn show(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<ProductId>,
) -> Result<Json<serde_json::Value>> {
    let is_admin = user.is_some_and(|u| u.role.is_admin());
    let product = state
        .store()
        .product(id)
        .await?
        .filter(|p| p.is_active || is_admin)
        .ok_or_else(|| AppError::NotFound("product".to_owned()))?;
    let (reviews, _) = state
        .store()
        .reviews_for_product(id, true, Page::clamped(None, Some(RECENT_REVIEWS), RECENT_REVIEWS))
        .await?;
    Ok(Json(json!({
        "success": true,
        "product": product,
        "reviews": reviews,
    })))
}

#[instrument(skip_all, fields(name = %input.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let product = state.catalog().create_product(input).await?;
    tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "product": product })),
    ))
}

#[instrument(skip_all, fields(product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<serde_json::Value>> {
    let product = state.catalog().update_product(id, patch).await?;
    Ok(Json(json!({ "success": true, "product": product })))
}

/// Flip the featured flag.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn toggle_featured(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<serde_json::Value>> {
    let product = state.catalog().toggle_featured(id).await?;
    Ok(Json(json!({
        "success": true,
        "is_featured": product.is_featured,
        "product": product,
    })))
}

#[instrument(skip_all, fields(product_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<serde_json::Value>> {
    state.catalog().delete_product(id).await?;
    Ok(Json(
        json!({ "success": true, "message": "product deleted" }),
    ))
}

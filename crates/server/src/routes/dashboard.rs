//! Store statistics: a small public counter set and the admin
//! dashboard aggregate.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use souq_core::OrderStatus;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;
use crate::store::DateRange;

/// Public storefront counters. Cancelled orders do not count.
pub async fn public_stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let store = state.store();
    let (products, categories, orders) = tokio::try_join!(
        store.count_products(true),
        store.count_categories(),
        store.count_orders(DateRange::default(), None, true),
    )?;
    Ok(Json(json!({
        "success": true,
        "stats": {
            "products": products,
            "categories": categories,
            "orders": orders,
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Trailing window in days (default 30).
    pub days: Option<u32>,
}

/// Admin dashboard aggregate. The independent queries are fanned out
/// concurrently.
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<serde_json::Value>> {
    let days = query.days.unwrap_or(30).clamp(1, 365);
    let since = Utc::now() - Duration::days(i64::from(days));
    let range = DateRange {
        start: Some(since),
        end: None,
    };
    let all_time = DateRange::default();
    let store = state.store();

    let (
        revenue,
        orders,
        pending_orders,
        total_products,
        featured_products,
        categories,
        low_stock,
        total_users,
        new_users,
        by_status,
        top_products,
        recent_orders,
        daily_revenue,
    ) = tokio::try_join!(
        store.total_revenue(range),
        store.count_orders(range, None, false),
        store.count_orders(all_time, Some(OrderStatus::Pending), false),
        store.count_products(false),
        store.count_featured_products(),
        store.count_categories(),
        store.count_low_stock(),
        store.count_users(None),
        store.count_users(Some(since)),
        store.revenue_by_status(range),
        store.top_products(5),
        store.recent_orders(range, 10),
        store.daily_revenue(days),
    )?;

    Ok(Json(json!({
        "success": true,
        "period_days": days,
        "stats": {
            "revenue": revenue,
            "orders": orders,
            "pending_orders": pending_orders,
            "products": total_products,
            "featured_products": featured_products,
            "categories": categories,
            "low_stock_products": low_stock,
            "users": total_users,
            "new_users": new_users,
        },
        "revenue_by_status": by_status,
        "top_products": top_products,
        "recent_orders": recent_orders,
        "daily_revenue": daily_revenue,
    })))
}

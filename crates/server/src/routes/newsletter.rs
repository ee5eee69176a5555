//! Newsletter subscription route handlers.
//!
//! Subscribing an address that previously unsubscribed reactivates it;
//! subscribing an already-active address succeeds without change.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use souq_core::{Email, SubscriberId, SubscriberSource, SubscriberStatus};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Subscriber;
use crate::state::AppState;

use super::PageQuery;

#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    pub email: String,
    #[serde(default)]
    pub source: SubscriberSource,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeForm {
    pub email: String,
}

#[instrument(skip_all)]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(form): Json<SubscribeForm>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let email = Email::parse(&form.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    if let Some(mut existing) = state.store().subscriber_by_email(&email).await? {
        if existing.status == SubscriberStatus::Unsubscribed {
            existing.status = SubscriberStatus::Active;
            existing.source = form.source;
            existing.subscribed_at = Utc::now();
            existing.unsubscribed_at = None;
            state.store().update_subscriber(existing).await?;
        }
        return Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "message": "subscribed" })),
        ));
    }

    let subscriber = Subscriber {
        id: SubscriberId::generate(),
        email,
        status: SubscriberStatus::Active,
        source: form.source,
        subscribed_at: Utc::now(),
        unsubscribed_at: None,
    };
    state.store().insert_subscriber(subscriber).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "subscribed" })),
    ))
}

#[instrument(skip_all)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(form): Json<UnsubscribeForm>,
) -> Result<Json<serde_json::Value>> {
    let email = Email::parse(&form.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;
    let Some(mut subscriber) = state.store().subscriber_by_email(&email).await? else {
        return Err(AppError::NotFound("subscriber".to_owned()));
    };
    if subscriber.status == SubscriberStatus::Active {
        subscriber.status = SubscriberStatus::Unsubscribed;
        subscriber.unsubscribed_at = Some(Utc::now());
        state.store().update_subscriber(subscriber).await?;
    }
    Ok(Json(json!({ "success": true, "message": "unsubscribed" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<SubscriberStatus>,
}

pub async fn subscribers(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<SubscriberQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .to_page();
    let (subscribers, total) = state.store().subscribers(query.status, page).await?;
    Ok(Json(json!({
        "success": true,
        "count": subscribers.len(),
        "total": total,
        "page": page.page,
        "pages": page.pages(total),
        "subscribers": subscribers,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: SubscriberStatus,
}

#[instrument(skip_all, fields(subscriber_id = %id))]
pub async fn update_subscriber_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<SubscriberId>,
    Json(form): Json<StatusForm>,
) -> Result<Json<serde_json::Value>> {
    let Some(mut subscriber) = state.store().subscriber(id).await? else {
        return Err(AppError::NotFound("subscriber".to_owned()));
    };
    if subscriber.status != form.status {
        subscriber.status = form.status;
        match form.status {
            SubscriberStatus::Active => {
                subscriber.subscribed_at = Utc::now();
                subscriber.unsubscribed_at = None;
            }
            SubscriberStatus::Unsubscribed => {
                subscriber.unsubscribed_at = Some(Utc::now());
            }
        }
        subscriber = state.store().update_subscriber(subscriber).await?;
    }
    Ok(Json(json!({ "success": true, "subscriber": subscriber })))
}

#[instrument(skip_all, fields(subscriber_id = %id))]
pub async fn remove_subscriber(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<SubscriberId>,
) -> Result<Json<serde_json::Value>> {
    if !state.store().delete_subscriber(id).await? {
        return Err(AppError::NotFound("subscriber".to_owned()));
    }
    Ok(Json(
        json!({ "success": true, "message": "subscriber deleted" }),
    ))
}

//! Contact form route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use souq_core::{ContactMessageId, ContactStatus, Email};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::ContactMessage;
use crate::state::AppState;

use super::PageQuery;

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let name = form.name.trim().to_owned();
    let message = form.message.trim().to_owned();
    if name.is_empty() || message.is_empty() {
        return Err(AppError::BadRequest(
            "name and message are required".to_owned(),
        ));
    }
    let email = Email::parse(&form.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let now = Utc::now();
    let entry = ContactMessage {
        id: ContactMessageId::generate(),
        name,
        email,
        phone: form.phone,
        message,
        status: ContactStatus::New,
        is_read: false,
        created_at: now,
        updated_at: now,
    };
    state.store().insert_contact(entry).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "message received" })),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<ContactStatus>,
}

pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ContactQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .to_page();
    let (messages, total) = state.store().contacts(query.status, page).await?;
    Ok(Json(json!({
        "success": true,
        "count": messages.len(),
        "total": total,
        "page": page.page,
        "pages": page.pages(total),
        "messages": messages,
    })))
}

/// Fetching a message marks it read.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ContactMessageId>,
) -> Result<Json<serde_json::Value>> {
    let mut message = state
        .store()
        .contact(id)
        .await?
        .ok_or_else(|| AppError::NotFound("contact message".to_owned()))?;
    if !message.is_read {
        message.is_read = true;
        if message.status == ContactStatus::New {
            message.status = ContactStatus::Read;
        }
        message.updated_at = Utc::now();
        message = state.store().update_contact(message).await?;
    }
    Ok(Json(json!({ "success": true, "contact": message })))
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: ContactStatus,
}

#[instrument(skip_all, fields(contact_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ContactMessageId>,
    Json(form): Json<StatusForm>,
) -> Result<Json<serde_json::Value>> {
    let mut message = state
        .store()
        .contact(id)
        .await?
        .ok_or_else(|| AppError::NotFound("contact message".to_owned()))?;
    message.status = form.status;
    if form.status.implies_read() {
        message.is_read = true;
    }
    message.updated_at = Utc::now();
    let message = state.store().update_contact(message).await?;
    Ok(Json(json!({ "success": true, "contact": message })))
}

#[instrument(skip_all, fields(contact_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ContactMessageId>,
) -> Result<Json<serde_json::Value>> {
    if !state.store().delete_contact(id).await? {
        return Err(AppError::NotFound("contact message".to_owned()));
    }
    Ok(Json(
        json!({ "success": true, "message": "message deleted" }),
    ))
}

//! Account and session route handlers.

use axum::{Json, extract::State, http::StatusCode};
use axum::http::{HeaderMap, header};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::services::auth::ProfileUpdate;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
}

#[instrument(skip_all, fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let session = state
        .auth()
        .register(&form.name, &form.email, &form.password)
        .await?;
    tracing::info!(user_id = %session.user.id, "account created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": session.token,
            "user": session.user.summary(),
        })),
    ))
}

#[instrument(skip_all, fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> Result<Json<serde_json::Value>> {
    let session = state.auth().login(&form.email, &form.password).await?;
    Ok(Json(json!({
        "success": true,
        "token": session.token,
        "user": session.user.summary(),
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.auth().logout(token).await?;
    }
    Ok(Json(json!({ "success": true, "message": "logged out" })))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "user": user }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<serde_json::Value>> {
    let user = state.auth().update_profile(user, update).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(form): Json<PasswordForm>,
) -> Result<Json<serde_json::Value>> {
    state
        .auth()
        .change_password(user, &form.current_password, &form.new_password)
        .await?;
    Ok(Json(
        json!({ "success": true, "message": "password updated" }),
    ))
}

use axum::{
    extract::{Json, State},
    http::HeaderMap,
    Extension,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use shared_models::auth::{LoginRequest, LoginResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::extract_bearer_token;
use shared_utils::jwt::{issue_session_token, validate_token};
use token_queue_cell::{handlers::queue_error, QueueState};

/// Resolve a user for the phone and role and issue a session token
pub async fn login(
    State(state): State<QueueState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let phone = request.phone.trim();
    if phone.is_empty() {
        return Err(AppError::BadRequest("Phone number is required".to_string()));
    }

    info!("Login attempt as {:?}", request.role);

    let user = state
        .engine
        .login(phone, request.role, request.name)
        .await
        .map_err(queue_error)?;

    let (token, expires_at) = issue_session_token(
        &user,
        &state.config.session_secret,
        Utc::now(),
        state.config.session_ttl_hours,
    )
    .map_err(|e| {
        error!("Failed to issue session token: {}", e);
        AppError::Internal("Could not issue session token".to_string())
    })?;

    Ok(Json(LoginResponse {
        token,
        expires_at,
        user,
    }))
}

pub async fn logout(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
) -> Json<Value> {
    info!("Logout for user: {}", user.id);
    state.engine.logout(&user).await;

    Json(json!({
        "success": true,
        "message": "Logged out"
    }))
}

pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    debug!("Session lookup for user: {}", user.id);
    Json(user)
}

pub async fn verify_token(
    State(state): State<QueueState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;

    match validate_token(&token, &state.config.session_secret) {
        Ok(_) => Ok(Json(json!({ "valid": true }))),
        Err(_) => Ok(Json(json!({ "valid": false }))),
    }
}

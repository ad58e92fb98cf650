use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    match auth_value.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(AppError::Auth("Invalid authorization header format".to_string())),
    }
}

// Resolves the session user and stores it in the request extensions
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;

    let user = validate_token(&token, &config.session_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn require_patient(user: &User) -> Result<(), AppError> {
    if user.is_patient() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only patients can perform this action".to_string()))
    }
}

/// A doctor may only drive their own queue.
pub fn require_doctor(user: &User, doctor_id: &str) -> Result<(), AppError> {
    if user.is_doctor() && user.id == doctor_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Only doctor {} can manage this queue",
            doctor_id
        )))
    }
}

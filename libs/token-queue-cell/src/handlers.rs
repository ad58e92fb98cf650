use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    Extension,
};
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::{Doctor, UpdateAvgTimeRequest, UpdateOpdStatusRequest};
use shared_models::{auth::User, error::AppError};
use shared_utils::extractor::{require_doctor, require_patient};

use crate::{
    DoctorQueueView, PatientStatus, QueueError, QueueState, QueueStats, Token, TokenEtaResponse,
};

pub fn queue_error(err: QueueError) -> AppError {
    match err {
        QueueError::DoctorNotFound(_) | QueueError::TokenNotFound(_) => {
            AppError::NotFound(err.to_string())
        }
        QueueError::DuplicateActiveBooking { .. } | QueueError::InvalidStatusTransition { .. } => {
            AppError::Conflict(err.to_string())
        }
        QueueError::InvalidAverageTime(_) => AppError::ValidationError(err.to_string()),
    }
}

/// List every doctor with current OPD status
pub async fn list_doctors(State(state): State<QueueState>) -> Json<Vec<Doctor>> {
    Json(state.engine.doctors().await)
}

/// Doctor profile with live queue
pub async fn get_doctor_queue(
    State(state): State<QueueState>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DoctorQueueView>, AppError> {
    let view = state.engine.doctor_queue(&doctor_id).await.map_err(queue_error)?;
    Ok(Json(view))
}

pub async fn list_tokens(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
) -> Json<Vec<Token>> {
    debug!("Token list request from user: {}", user.id);
    Json(state.engine.tokens().await)
}

/// Book the next token with a doctor
pub async fn book_token(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    info!("Booking request for doctor {} from user: {}", doctor_id, user.id);
    require_patient(&user)?;

    let token = state
        .engine
        .book_token(&doctor_id, &user.id)
        .await
        .map_err(queue_error)?;
    let eta = state.engine.get_eta(&token).await;

    Ok(Json(json!({
        "success": true,
        "token": token,
        "eta": eta,
        "eta_minutes": eta.minutes()
    })))
}

/// Call the next patient
pub async fn advance_queue(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user, &doctor_id)?;

    let outcome = state
        .engine
        .advance_queue(&doctor_id)
        .await
        .map_err(queue_error)?;

    Ok(Json(json!({
        "success": true,
        "completed": outcome.completed,
        "called": outcome.called
    })))
}

pub async fn update_opd_status(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<UpdateOpdStatusRequest>,
) -> Result<Json<Doctor>, AppError> {
    require_doctor(&user, &doctor_id)?;

    let doctor = state
        .engine
        .update_doctor_opd(&doctor_id, request.status, request.broadcast_message)
        .await
        .map_err(queue_error)?;

    Ok(Json(doctor))
}

pub async fn set_avg_time(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<UpdateAvgTimeRequest>,
) -> Result<Json<Doctor>, AppError> {
    require_doctor(&user, &doctor_id)?;

    let doctor = state
        .engine
        .set_avg_time(&doctor_id, request.minutes)
        .await
        .map_err(queue_error)?;

    Ok(Json(doctor))
}

/// Dashboard counters
pub async fn get_queue_stats(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<QueueStats>, AppError> {
    require_doctor(&user, &doctor_id)?;

    let stats = state.engine.queue_stats(&doctor_id).await.map_err(queue_error)?;
    Ok(Json(stats))
}

pub async fn skip_token(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(token_id): Path<Uuid>,
) -> Result<Json<Token>, AppError> {
    let token = state.engine.token(token_id).await.map_err(queue_error)?;
    require_doctor(&user, &token.doctor_id)?;

    let token = state.engine.skip_token(token_id).await.map_err(queue_error)?;
    Ok(Json(token))
}

pub async fn hold_token(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(token_id): Path<Uuid>,
) -> Result<Json<Token>, AppError> {
    let token = state.engine.token(token_id).await.map_err(queue_error)?;
    require_doctor(&user, &token.doctor_id)?;

    let token = state.engine.hold_token(token_id).await.map_err(queue_error)?;
    Ok(Json(token))
}

/// ETA for a token; patients see their own, doctors their own queue's
pub async fn get_token_eta(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(token_id): Path<Uuid>,
) -> Result<Json<TokenEtaResponse>, AppError> {
    let response = state
        .engine
        .eta_for_token(token_id)
        .await
        .map_err(queue_error)?;

    let allowed = if user.is_doctor() {
        response.token.doctor_id == user.id
    } else {
        response.token.patient_id == user.id
    };
    if !allowed {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    Ok(Json(response))
}

/// Live tracker for the signed-in patient
pub async fn get_my_status(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
) -> Result<Json<PatientStatus>, AppError> {
    require_patient(&user)?;

    state
        .engine
        .patient_status(&user.id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No active token".to_string()))
}

/// Server-sent queue updates for one doctor
pub async fn queue_events(
    State(state): State<QueueState>,
    Path(doctor_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state.engine.doctor(&doctor_id).await.map_err(queue_error)?;

    let receiver = state.engine.notifications().subscribe(&doctor_id).await;
    info!("Queue event stream opened for doctor {}", doctor_id);

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(update) => {
                    let event = Event::default()
                        .event("queue_update")
                        .json_data(&update)
                        .unwrap_or_else(|_| Event::default().comment("unserializable update"));
                    return Some((Ok::<Event, Infallible>(event), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Queue event stream lagged, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

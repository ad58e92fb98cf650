use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{
    advance_queue, book_token, get_doctor_queue, get_my_status, get_queue_stats, get_token_eta,
    hold_token, list_doctors, list_tokens, queue_events, set_avg_time, skip_token,
    update_opd_status,
};
use crate::QueueEngine;

#[derive(Clone)]
pub struct QueueState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<QueueEngine>,
}

impl QueueState {
    pub fn new(config: Arc<AppConfig>, engine: Arc<QueueEngine>) -> Self {
        Self { config, engine }
    }
}

pub fn create_doctor_router(state: QueueState) -> Router {
    Router::new()
        .route("/", get(list_doctors))
        .route("/{doctor_id}", get(get_doctor_queue))
        .with_state(state)
}

pub fn create_token_queue_router(state: QueueState) -> Router {
    let public_routes = Router::new()
        .route("/doctors/{doctor_id}/events", get(queue_events));

    let protected_routes = Router::new()
        .route("/tokens", get(list_tokens))
        .route("/doctors/{doctor_id}/tokens", post(book_token))
        .route("/doctors/{doctor_id}/advance", post(advance_queue))
        .route("/doctors/{doctor_id}/opd", put(update_opd_status))
        .route("/doctors/{doctor_id}/avg-time", put(set_avg_time))
        .route("/doctors/{doctor_id}/stats", get(get_queue_stats))
        .route("/tokens/{token_id}/skip", post(skip_token))
        .route("/tokens/{token_id}/hold", post(hold_token))
        .route("/tokens/{token_id}/eta", get(get_token_eta))
        .route("/me", get(get_my_status))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

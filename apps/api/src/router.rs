use axum::{routing::get, Router};

use auth_cell::router::auth_routes;
use token_queue_cell::{create_doctor_router, create_token_queue_router, QueueState};

pub fn create_router(state: QueueState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic token queue API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", create_doctor_router(state.clone()))
        .nest("/queue", create_token_queue_router(state))
}

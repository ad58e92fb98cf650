use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use token_queue_cell::QueueState;

use crate::handlers;

pub fn auth_routes(state: QueueState) -> Router {
    let public_routes = Router::new()
        .route("/login", post(handlers::login))
        .route("/verify", post(handlers::verify_token));

    let protected_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

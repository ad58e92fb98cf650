use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use auth_cell::auth_routes;
use doctor_cell::DoctorRegistry;
use shared_utils::test_utils::{TestConfig, TestUser};
use shared_utils::SystemClock;
use token_queue_cell::{QueueEngine, QueueState};

fn create_test_app() -> (Router, String) {
    let config = TestConfig::default();
    let secret = config.session_secret.clone();
    let engine = QueueEngine::new(DoctorRegistry::seeded(), Arc::new(SystemClock));
    let state = QueueState::new(config.to_arc(), Arc::new(engine));
    (auth_routes(state), secret)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_login_then_me_round_trip() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "phone": "9999999992", "role": "DOCTOR" }).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let login = body_json(response).await;
    assert_eq!(login["user"]["id"], "doc2");
    assert_eq!(login["user"]["role"], "DOCTOR");
    let token = login["token"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("GET")
        .uri("/me")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let me = body_json(response).await;
    assert_eq!(me["id"], "doc2");
    assert_eq!(me["phone"], "9999999992");
}

#[tokio::test]
async fn test_login_with_unknown_doctor_phone() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "phone": "0000000000", "role": "DOCTOR" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("0000000000"));
}

#[tokio::test]
async fn test_patient_login_uses_given_name() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "phone": "5551234", "role": "PATIENT", "name": "Asha" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["user"]["name"], "Asha");
    assert_eq!(body["user"]["role"], "PATIENT");
    assert!(body["expires_at"].is_string());
}

#[tokio::test]
async fn test_me_requires_authorization() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .method("GET")
        .uri("/me")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_rejects_token_signed_with_other_secret() {
    let (app, _) = create_test_app();
    let user = TestUser::patient("5550009");

    let request = Request::builder()
        .method("GET")
        .uri("/me")
        .header("Authorization", user.bearer("some-other-secret"))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_with_valid_session() {
    let (app, secret) = create_test_app();
    let user = TestUser::patient("5550010");

    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .header("Authorization", user.bearer(&secret))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

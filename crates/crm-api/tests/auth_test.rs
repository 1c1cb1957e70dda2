//! Authentication through the assembled router: bearer token failures,
//! and the signup → login → reset-password flow with a recording mailer.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use zeroize::Zeroizing;

use crm_api::auth::AuthConfig;
use crm_api::config::AppConfig;
use crm_api::mailer::{MailError, Mailer, OutgoingMail};
use crm_api::AppState;
use crm_blob::InMemoryBlobStore;

const SECRET: &str = "integration-test-secret";

#[derive(Debug, Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().push(mail);
        Ok(())
    }
}

fn config() -> AppConfig {
    AppConfig {
        jwt_secret: Some(Zeroizing::new(SECRET.to_string())),
        frontend_url: "https://crm.example.test/".into(),
        ..AppConfig::default()
    }
}

fn state_with(mailer: Arc<RecordingMailer>) -> AppState {
    AppState::with_services(config(), Arc::new(InMemoryBlobStore::new()), mailer, None)
}

async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = crm_api::app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn signup_and_login(state: &AppState, password: &str) -> String {
    let (status, _) = send(
        state,
        "POST",
        "/auth/signup",
        None,
        Some(json!({"name": "Dana", "email": "dana@example.com", "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(
        state,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "dana@example.com", "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

// -- Token failures -------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_rejected() {
    let state = state_with(Arc::default());
    let (status, body) = send(&state, "GET", "/contacts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "TOKEN_MISSING");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let state = state_with(Arc::default());
    let (status, body) = send(&state, "GET", "/contacts", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let state = state_with(Arc::default());
    let auth = AuthConfig::new(&state.config, state.users.clone());
    let token = auth
        .issue_token(Uuid::new_v4(), Utc::now() - Duration::hours(2))
        .unwrap();
    let (status, body) = send(&state, "GET", "/contacts", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn token_for_unknown_user_is_rejected() {
    let state = state_with(Arc::default());
    let auth = AuthConfig::new(&state.config, state.users.clone());
    let token = auth.issue_token(Uuid::new_v4(), Utc::now()).unwrap();
    let (status, body) = send(&state, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn health_probes_skip_auth() {
    let state = state_with(Arc::default());
    let response = crm_api::app(state)
        .oneshot(Request::builder().uri("/health/liveness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// -- Account flow -----------------------------------------------------------------

#[tokio::test]
async fn authenticated_writes_are_attributed_to_the_user() {
    let state = state_with(Arc::default());
    let token = signup_and_login(&state, "hunter22").await;

    let (status, me) = send(&state, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Dana");
    assert_eq!(me["email"], "dana@example.com");
    assert!(me.get("passwordHash").is_none());

    let (status, created) = send(
        &state,
        "POST",
        "/chargeables",
        Some(&token),
        Some(json!({
            "quoteSendDate": "2025-02-01",
            "customerName": "Acme",
            "chargeableType": "Consulting",
            "amount": 1200
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["createdBy"], me["id"]);

    let user_id = me["id"].as_str().unwrap();
    let (status, page) = send(
        &state,
        "GET",
        &format!("/chargeables/audit/user/{user_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let logs = page["auditLogs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["actorName"], "Dana");
}

#[tokio::test]
async fn password_reset_flow() {
    let mailer = Arc::new(RecordingMailer::default());
    let state = state_with(mailer.clone());
    signup_and_login(&state, "hunter22").await;

    let (status, body) = send(
        &state,
        "POST",
        "/auth/forgot-password",
        None,
        Some(json!({"email": "DANA@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password reset link sent");

    let mail = mailer.sent.lock().pop().unwrap();
    assert_eq!(mail.to, "dana@example.com");
    let marker = "https://crm.example.test/reset-password/";
    let start = mail.html.find(marker).unwrap() + marker.len();
    let token: String = mail.html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    assert!(!token.is_empty());

    let (status, body) = send(
        &state,
        "POST",
        "/auth/reset-password",
        None,
        Some(json!({"token": token, "newPassword": "brand-new"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password updated successfully");

    // Single use.
    let (status, _) = send(
        &state,
        "POST",
        "/auth/reset-password",
        None,
        Some(json!({"token": token, "newPassword": "another-one"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &state,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "dana@example.com", "password": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");

    let (status, body) = send(
        &state,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "dana@example.com", "password": "brand-new"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

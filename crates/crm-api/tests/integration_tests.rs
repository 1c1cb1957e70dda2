//! # Integration Tests for crm-api
//!
//! Drives the fully assembled router (auth disabled, in-memory stores):
//! health probes, entity CRUD with audit trails, the task reminder
//! lifecycle, chargeable audit search and the OpenAPI document.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crm_api::AppState;

/// Helper: build the test app with auth disabled.
fn test_app(state: &AppState) -> axum::Router {
    crm_api::app(state.clone())
}

/// Helper: send a request and decode the JSON body (`Null` when empty).
async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = test_app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let response = test_app(&AppState::default())
        .oneshot(Request::builder().uri("/health/liveness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let response = test_app(&AppState::default())
        .oneshot(Request::builder().uri("/health/readiness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

// -- Contacts -------------------------------------------------------------------

#[tokio::test]
async fn test_contact_lifecycle_is_audited() {
    let state = AppState::default();
    let (status, created) = send(
        &state,
        "POST",
        "/contacts",
        Some(json!({
            "companyName": "Acme",
            "companyEmail": "Hello@Acme.test",
            "phoneNumber": "+61 2 5550 1234",
            "contactType": "customer"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &state,
        "PUT",
        &format!("/contacts/{id}"),
        Some(json!({"phoneNumber": "+61 2 5550 9999"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["phoneNumber"], "+61 2 5550 9999");

    // Same value again: no audit entry.
    send(
        &state,
        "PUT",
        &format!("/contacts/{id}"),
        Some(json!({"phoneNumber": "+61 2 5550 9999"})),
    )
    .await;

    let (status, trail) = send(&state, "GET", &format!("/contacts/audit/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trail["pagination"]["total"], 2);
    let logs = trail["auditLogs"].as_array().unwrap();
    assert_eq!(logs[0]["action"], "update");
    assert_eq!(logs[0]["actorName"], "System User");
    assert_eq!(logs[0]["changes"][0]["field"], "phoneNumber");
    assert_eq!(logs[0]["changes"][0]["oldValue"], "+61 2 5550 1234");
    assert_eq!(logs[1]["action"], "create");

    let (status, body) = send(&state, "DELETE", &format!("/contacts/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Contact deleted successfully");

    let (status, _) = send(&state, "GET", &format!("/contacts/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(state.audit.len(), 3);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let state = AppState::default();
    let request = Request::builder()
        .method("POST")
        .uri("/contacts")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = test_app(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.contacts.is_empty());
}

// -- Tasks, Reminders & Notifications -------------------------------------------

#[tokio::test]
async fn test_task_reminder_becomes_notification_until_processed() {
    let state = AppState::default();
    let (status, task) = send(
        &state,
        "POST",
        "/tasks",
        Some(json!({
            "title": "Renew Acme contract",
            "assignedTo": "System User",
            "dueDate": "2025-01-12",
            "reminderDate": "2025-01-10",
            "reminderTime": "09:00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = task["id"].as_str().unwrap().to_string();

    let (_, reminders) = send(&state, "GET", "/tasks/reminders", None).await;
    let reminders = reminders.as_array().unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0]["taskId"], task_id.as_str());
    let reminder_id = reminders[0]["id"].as_str().unwrap().to_string();

    let (_, due) = send(&state, "GET", "/tasks/reminders/pending", None).await;
    assert_eq!(due.as_array().unwrap().len(), 1);

    let (status, pending) = send(&state, "GET", "/tasks/notifications/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["title"], "Reminder: Renew Acme contract");
    assert_eq!(pending[0]["taskId"], task_id.as_str());

    let (status, body) = send(
        &state,
        "PUT",
        &format!("/tasks/notifications/{reminder_id}/processed"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Notification marked as processed");

    let (_, pending) = send(&state, "GET", "/tasks/notifications/pending", None).await;
    assert!(pending.as_array().unwrap().is_empty());

    let (status, _) = send(&state, "DELETE", &format!("/tasks/{task_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.reminders.is_empty());
}

#[tokio::test]
async fn test_notifications_are_scoped_to_the_assignee() {
    let state = AppState::default();
    send(
        &state,
        "POST",
        "/tasks",
        Some(json!({
            "title": "Someone else's call",
            "assignedTo": "Dana",
            "dueDate": "2025-01-12",
            "reminderDate": "2025-01-10",
            "reminderTime": "09:00"
        })),
    )
    .await;
    assert_eq!(state.reminders.len(), 1);
    let reminder_id = state.reminders.list()[0].id;

    let (_, pending) = send(&state, "GET", "/tasks/notifications/pending", None).await;
    assert!(pending.as_array().unwrap().is_empty());

    let (status, _) = send(
        &state,
        "PUT",
        &format!("/tasks/notifications/{reminder_id}/processed"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Chargeables & Audit Search ---------------------------------------------------

#[tokio::test]
async fn test_chargeable_audit_search_by_action() {
    let state = AppState::default();
    let (status, created) = send(
        &state,
        "POST",
        "/chargeables",
        Some(json!({
            "quoteSendDate": "2025-02-01",
            "customerName": "Acme",
            "chargeableType": "Consulting",
            "amount": 1200
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    send(
        &state,
        "PUT",
        &format!("/chargeables/{id}"),
        Some(json!({"poReceived": "yes"})),
    )
    .await;

    let (status, page) = send(&state, "GET", "/chargeables/audit/search?action=update", None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = page["auditLogs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["changes"][0]["field"], "poReceived");

    let (status, _) = send(&state, "GET", "/chargeables/audit/search?action=archive", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = send(&state, "GET", "/chargeables/audit?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 2);
    assert_eq!(page["auditLogs"].as_array().unwrap().len(), 1);
}

// -- OpenAPI --------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (status, doc) = send(&AppState::default(), "GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["info"]["title"], "CRM API");
    assert!(doc["paths"]["/chargeables/search"].is_object());
    assert!(doc["components"]["schemas"]["AuditEntry"].is_object());
}

//! Reminder listing and acknowledgement, plus the caller-scoped
//! notification endpoints. All of them live under `/tasks`.

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use crm_core::{Notification, Reminder};
use uuid::Uuid;

use super::MessageResponse;
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;
use crate::{notifications, reminders};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks/reminders", get(list_reminders))
        .route("/tasks/reminders/pending", get(list_due_reminders))
        .route("/tasks/reminders/:id/sent", put(mark_reminder_sent))
        .route("/tasks/notifications/pending", get(list_notifications))
        .route(
            "/tasks/notifications/:reminder_id/processed",
            put(mark_notification_processed),
        )
}

/// GET /tasks/reminders: Every reminder, earliest first.
#[utoipa::path(
    get,
    path = "/tasks/reminders",
    responses((status = 200, description = "Reminders", body = Vec<Reminder>)),
    tag = "reminders"
)]
async fn list_reminders(State(state): State<AppState>) -> Json<Vec<Reminder>> {
    Json(reminders::all(&state.reminders))
}

/// GET /tasks/reminders/pending: Pending reminders that are due now.
#[utoipa::path(
    get,
    path = "/tasks/reminders/pending",
    responses((status = 200, description = "Due reminders, earliest first", body = Vec<Reminder>)),
    tag = "reminders"
)]
async fn list_due_reminders(State(state): State<AppState>) -> Json<Vec<Reminder>> {
    Json(reminders::due(&state.reminders, Utc::now()))
}

/// PUT /tasks/reminders/:id/sent: Acknowledge a reminder.
#[utoipa::path(
    put,
    path = "/tasks/reminders/{id}/sent",
    params(("id" = Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Reminder marked sent", body = Reminder),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "reminders"
)]
async fn mark_reminder_sent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reminder>, AppError> {
    reminders::acknowledge(&state, id).await.map(Json)
}

/// GET /tasks/notifications/pending: Due reminders assigned to the caller.
#[utoipa::path(
    get,
    path = "/tasks/notifications/pending",
    responses(
        (status = 200, description = "Notifications", body = Vec<Notification>),
        (status = 401, description = "Caller has no display name", body = crate::error::ErrorBody),
    ),
    tag = "reminders"
)]
async fn list_notifications(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<Notification>>, AppError> {
    notifications::pending_for(&state, &caller).map(Json)
}

/// PUT /tasks/notifications/:reminder_id/processed: Acknowledge one of the
/// caller's notifications.
#[utoipa::path(
    put,
    path = "/tasks/notifications/{reminder_id}/processed",
    params(("reminder_id" = Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Processed", body = MessageResponse),
        (status = 404, description = "No such reminder for this caller", body = crate::error::ErrorBody),
    ),
    tag = "reminders"
)]
async fn mark_notification_processed(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = notifications::acknowledge(&state, &caller, reminder_id).await?;
    Ok(Json(MessageResponse::new(message)))
}

//! # Task API
//!
//! Task CRUD and the form dropdowns. Task writes drive the reminder
//! engine: `reminderDate`/`reminderTime` in the body are never stored on
//! the task; they upsert or delete the task's reminder after the task
//! write has succeeded.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use crm_core::contact::company_names;
use crm_core::{Attachable, Choice, Task, TaskInput};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{ListWindow, MessageResponse};
use crate::auth::CallerIdentity;
use crate::directory::UserView;
use crate::entities;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::reminders;
use crate::state::AppState;

/// Task list filters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TaskFilter {
    /// `Not Started`, `In Progress` or `Completed`.
    pub status: Option<String>,
    /// Assignee display name.
    pub assigned_to: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/dropdown/users", get(list_assignable_users))
        .route("/tasks/dropdown/companies", get(list_companies))
        .route("/tasks/:id", get(get_task).put(update_task).delete(delete_task))
}

/// GET /tasks: List tasks, newest first.
#[utoipa::path(
    get,
    path = "/tasks",
    params(TaskFilter, ListWindow),
    responses((status = 200, description = "Tasks", body = Vec<Task>)),
    tag = "tasks"
)]
async fn list_tasks(
    State(state): State<AppState>,
    filter: Result<Query<TaskFilter>, QueryRejection>,
    window: Result<Query<ListWindow>, QueryRejection>,
) -> Result<Json<Vec<Task>>, AppError> {
    let filter = extract_query(filter)?;
    let window = extract_query(window)?;
    let status = filter.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let assignee = filter.assigned_to.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let tasks = state.tasks.filter(|t| {
        status.map_or(true, |s| t.status.label() == s)
            && assignee.map_or(true, |a| t.assigned_to == a)
    });
    Ok(Json(window.apply(tasks, |t| t.created_at)))
}

/// POST /tasks: Create a task and, when both reminder fields are given, its
/// reminder.
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = TaskInput,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
async fn create_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<TaskInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let input = extract_json(body)?;
    let task = Task::create(&input, caller.actor_id(), Utc::now())?;
    let task = entities::create(&state, &caller, task).await?;
    reminders::sync_with_task(&state, &input.reminder_directive(), &task, caller.actor_id()).await;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks/dropdown/users: Registered actors for the assignee picker.
#[utoipa::path(
    get,
    path = "/tasks/dropdown/users",
    responses((status = 200, description = "Actors sorted by name", body = Vec<UserView>)),
    tag = "tasks"
)]
async fn list_assignable_users(State(state): State<AppState>) -> Json<Vec<UserView>> {
    Json(state.users.views())
}

/// GET /tasks/dropdown/companies: Contact company names for `relatedTo`.
#[utoipa::path(
    get,
    path = "/tasks/dropdown/companies",
    responses((status = 200, description = "Company names, sorted", body = Vec<String>)),
    tag = "tasks"
)]
async fn list_companies(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(company_names(state.contacts.list().iter()))
}

/// GET /tasks/:id: Get one task.
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = Task),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    entities::fetch::<Task>(&state, id).map(Json)
}

/// PUT /tasks/:id: Partially update a task and reconcile its reminder.
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = TaskInput,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
async fn update_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<TaskInput>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    let input = extract_json(body)?;
    let now = Utc::now();
    let task = entities::update::<Task, _>(&state, &caller, id, |t| Ok(t.patched(&input, now)?)).await?;
    reminders::sync_with_task(&state, &input.reminder_directive(), &task, caller.actor_id()).await;
    Ok(Json(task))
}

/// DELETE /tasks/:id: Delete a task, its attachments and its reminder.
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task deleted", body = MessageResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
async fn delete_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    entities::delete::<Task>(&state, &caller, id, <Task as Attachable>::storage_ids).await?;
    reminders::remove_for_task(&state, id).await;
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use crm_core::{ActorRef, ReminderStatus};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let app = router()
            .layer(axum::Extension(CallerIdentity {
                actor: ActorRef {
                    id: None,
                    name: Some("Dana".into()),
                },
            }))
            .with_state(state.clone());
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn new_task() -> Value {
        json!({
            "title": "Call Acme",
            "assignedTo": "Dana",
            "dueDate": "2025-01-12",
            "reminderDate": "2025-01-10",
            "reminderTime": "09:00"
        })
    }

    #[tokio::test]
    async fn create_schedules_reminder_without_storing_fields() {
        let state = AppState::default();
        let (status, body) = send(&state, "POST", "/tasks", Some(new_task())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.get("reminderDate").is_none());

        let reminders = state.reminders.list();
        assert_eq!(reminders.len(), 1);
        assert_eq!(
            reminders[0].reminder_date_time,
            Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()
        );
        assert_eq!(reminders[0].status, ReminderStatus::Pending);
        assert_eq!(reminders[0].task_name, "Call Acme");
    }

    #[tokio::test]
    async fn clearing_reminder_fields_deletes_reminder() {
        let state = AppState::default();
        let (_, body) = send(&state, "POST", "/tasks", Some(new_task())).await;
        let id = body["id"].as_str().unwrap().to_string();

        // Neither key: reminder untouched.
        send(&state, "PUT", &format!("/tasks/{id}"), Some(json!({"title": "Call Acme again"}))).await;
        assert_eq!(state.reminders.len(), 1);
        assert_eq!(state.reminders.list()[0].task_name, "Call Acme again");

        send(
            &state,
            "PUT",
            &format!("/tasks/{id}"),
            Some(json!({"reminderDate": null, "reminderTime": ""})),
        )
        .await;
        assert!(state.reminders.is_empty());
    }

    #[tokio::test]
    async fn invalid_reminder_still_saves_task() {
        let state = AppState::default();
        let mut body = new_task();
        body["reminderTime"] = json!("25:99");
        let (status, _) = send(&state, "POST", "/tasks", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(state.tasks.len(), 1);
        assert!(state.reminders.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_reminder() {
        let state = AppState::default();
        let (_, body) = send(&state, "POST", "/tasks", Some(new_task())).await;
        let id = body["id"].as_str().unwrap().to_string();
        let (status, body) = send(&state, "DELETE", &format!("/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Task deleted successfully");
        assert!(state.reminders.is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_status_and_assignee() {
        let state = AppState::default();
        send(&state, "POST", "/tasks", Some(new_task())).await;
        let mut other = new_task();
        other["assignedTo"] = json!("Fox");
        other["status"] = json!("Completed");
        send(&state, "POST", "/tasks", Some(other)).await;

        let (_, body) = send(&state, "GET", "/tasks?status=Completed", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        let (_, body) = send(&state, "GET", "/tasks?assignedTo=Dana", None).await;
        assert_eq!(body.as_array().unwrap()[0]["assignedTo"], "Dana");
        let (_, body) = send(&state, "GET", "/tasks?limit=1", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }
}

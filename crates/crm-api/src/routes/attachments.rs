//! Attachment endpoints, mounted once per resource by [`router`].
//!
//! - `POST /{resource}s/:id/attachments`: multipart upload.
//! - `GET /{resource}s/:id/attachments/:attachment_id`: 307 to the blob URL.
//! - `DELETE /{resource}s/:id/attachments/:attachment_id`: detach.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use crm_core::{Attachable, Attachment};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::MessageResponse;
use crate::attachments::{self, UPLOAD_BODY_LIMIT};
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::{AppState, Resource};

/// Response of a successful upload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// The attachments added by this call.
    pub attachments: Vec<Attachment>,
}

pub fn router<R: Resource>() -> Router<AppState> {
    let base = format!("/{}s/:id/attachments", <R as Attachable>::KIND.as_str());
    Router::new()
        .route(
            &base,
            post(upload::<R>).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            &format!("{base}/:attachment_id"),
            get(download::<R>).delete(remove::<R>),
        )
}

async fn upload<R: Resource>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let files = attachments::read_files(multipart).await?;
    let added = attachments::attach::<R>(&state, &caller, id, files).await?;
    Ok(Json(UploadResponse {
        message: "Files uploaded successfully".into(),
        attachments: added,
    }))
}

async fn download<R: Resource>(
    State(state): State<AppState>,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Redirect, AppError> {
    let attachment = attachments::find::<R>(&state, id, attachment_id)?;
    Ok(Redirect::temporary(&attachment.storage_url))
}

async fn remove<R: Resource>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    attachments::detach::<R>(&state, &caller, id, attachment_id).await?;
    Ok(Json(MessageResponse::new("Attachment deleted successfully")))
}

//! # Contact API
//!
//! Contact CRUD, the company-name dropdown and the company logo slot.
//! Responses use [`ContactView`], which adds the legacy flat fields.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use crm_core::contact::company_names;
use crm_core::{Attachment, Choice, Contact, ContactInput, ContactView};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{ListWindow, MessageResponse};
use crate::attachments::{self, UPLOAD_BODY_LIMIT};
use crate::auth::CallerIdentity;
use crate::entities;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::state::AppState;

/// Contact list filters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ContactFilter {
    /// `prospect` or `customer`.
    pub contact_type: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/companies", get(list_companies))
        .route(
            "/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .route(
            "/contacts/:id/logo",
            post(upload_logo)
                .delete(delete_logo)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

/// GET /contacts: List contacts, newest first.
#[utoipa::path(
    get,
    path = "/contacts",
    params(ContactFilter, ListWindow),
    responses(
        (status = 200, description = "Contacts", body = Vec<ContactView>),
        (status = 400, description = "Malformed query", body = crate::error::ErrorBody),
    ),
    tag = "contacts"
)]
async fn list_contacts(
    State(state): State<AppState>,
    filter: Result<Query<ContactFilter>, QueryRejection>,
    window: Result<Query<ListWindow>, QueryRejection>,
) -> Result<Json<Vec<ContactView>>, AppError> {
    let filter = extract_query(filter)?;
    let window = extract_query(window)?;
    let wanted = filter.contact_type.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let contacts = state
        .contacts
        .filter(|c| wanted.map_or(true, |t| c.contact_type.label() == t));
    let page = window.apply(contacts, |c| c.created_at);
    Ok(Json(page.into_iter().map(ContactView::from).collect()))
}

/// POST /contacts: Create a contact.
#[utoipa::path(
    post,
    path = "/contacts",
    request_body = ContactInput,
    responses(
        (status = 201, description = "Contact created", body = ContactView),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "contacts"
)]
async fn create_contact(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ContactInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ContactView>), AppError> {
    let input = extract_json(body)?;
    let contact = Contact::create(input, caller.actor_id(), Utc::now())?;
    let contact = entities::create(&state, &caller, contact).await?;
    Ok((StatusCode::CREATED, Json(ContactView::from(contact))))
}

/// GET /contacts/companies: Distinct company names.
#[utoipa::path(
    get,
    path = "/contacts/companies",
    responses((status = 200, description = "Company names, sorted", body = Vec<String>)),
    tag = "contacts"
)]
async fn list_companies(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(company_names(state.contacts.list().iter()))
}

/// GET /contacts/:id: Get one contact.
#[utoipa::path(
    get,
    path = "/contacts/{id}",
    params(("id" = Uuid, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Contact found", body = ContactView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "contacts"
)]
async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactView>, AppError> {
    let contact = entities::fetch::<Contact>(&state, id)?;
    Ok(Json(ContactView::from(contact)))
}

/// PUT /contacts/:id: Partially update a contact.
#[utoipa::path(
    put,
    path = "/contacts/{id}",
    params(("id" = Uuid, Path, description = "Contact ID")),
    request_body = ContactInput,
    responses(
        (status = 200, description = "Contact updated", body = ContactView),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "contacts"
)]
async fn update_contact(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ContactInput>, JsonRejection>,
) -> Result<Json<ContactView>, AppError> {
    let input = extract_json(body)?;
    let now = Utc::now();
    let contact =
        entities::update::<Contact, _>(&state, &caller, id, |c| Ok(c.patched(input, now)?)).await?;
    Ok(Json(ContactView::from(contact)))
}

/// DELETE /contacts/:id: Delete a contact, its attachments and its logo.
#[utoipa::path(
    delete,
    path = "/contacts/{id}",
    params(("id" = Uuid, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Contact deleted", body = MessageResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "contacts"
)]
async fn delete_contact(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    entities::delete::<Contact>(&state, &caller, id, Contact::all_storage_ids).await?;
    Ok(Json(MessageResponse::new("Contact deleted successfully")))
}

/// POST /contacts/:id/logo: Upload or replace the company logo.
#[utoipa::path(
    post,
    path = "/contacts/{id}/logo",
    params(("id" = Uuid, Path, description = "Contact ID")),
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "One image file"),
    responses(
        (status = 200, description = "Logo stored", body = Attachment),
        (status = 400, description = "Rejected by upload policy", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 500, description = "Blob storage failed", body = crate::error::ErrorBody),
    ),
    tag = "contacts"
)]
async fn upload_logo(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Attachment>, AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let files = attachments::read_files(multipart).await?;
    let logo = attachments::set_logo(&state, &caller, id, files).await?;
    Ok(Json(logo))
}

/// DELETE /contacts/:id/logo: Remove the company logo.
#[utoipa::path(
    delete,
    path = "/contacts/{id}/logo",
    params(("id" = Uuid, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Logo removed", body = MessageResponse),
        (status = 404, description = "No such contact or no logo", body = crate::error::ErrorBody),
    ),
    tag = "contacts"
)]
async fn delete_logo(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    attachments::remove_logo(&state, &caller, id).await?;
    Ok(Json(MessageResponse::new("Company logo deleted successfully")))
}

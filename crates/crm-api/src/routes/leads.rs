//! # Lead API
//!
//! Lead CRUD, the pipeline summary and the contact lookup used by the lead
//! form. Every response carries the derived `contactName`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use crm_core::lead::pipeline_summary;
use crm_core::{Attachable, Choice, Contact, Lead, LeadContactInfo, LeadInput, LeadView, StageSummary};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{ListWindow, MessageResponse};
use crate::auth::CallerIdentity;
use crate::entities;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::state::AppState;

/// Lead list filters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeadFilter {
    /// Stage label, e.g. `Qualified`.
    pub stage: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/leads", get(list_leads).post(create_lead))
        .route("/leads/pipeline/summary", get(get_pipeline_summary))
        .route("/leads/contact/:id", get(get_contact_details))
        .route("/leads/:id", get(get_lead).put(update_lead).delete(delete_lead))
}

/// The contact a write links to. A named contact that does not exist is 404.
fn linked_contact(state: &AppState, id: Option<Uuid>) -> Result<Option<Contact>, AppError> {
    match id {
        None => Ok(None),
        Some(id) => entities::fetch::<Contact>(state, id).map(Some),
    }
}

fn view(state: &AppState, lead: Lead) -> LeadView {
    let linked = lead.contact_person.and_then(|id| state.contacts.get(&id));
    LeadView::new(lead, linked.as_ref())
}

/// GET /leads: List leads, newest first.
#[utoipa::path(
    get,
    path = "/leads",
    params(LeadFilter, ListWindow),
    responses((status = 200, description = "Leads", body = Vec<LeadView>)),
    tag = "leads"
)]
async fn list_leads(
    State(state): State<AppState>,
    filter: Result<Query<LeadFilter>, QueryRejection>,
    window: Result<Query<ListWindow>, QueryRejection>,
) -> Result<Json<Vec<LeadView>>, AppError> {
    let filter = extract_query(filter)?;
    let window = extract_query(window)?;
    let stage = filter.stage.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let leads = state.leads.filter(|l| stage.map_or(true, |s| l.stage.label() == s));
    let page = window.apply(leads, |l| l.created_at);
    Ok(Json(page.into_iter().map(|l| view(&state, l)).collect()))
}

/// POST /leads: Create a lead.
#[utoipa::path(
    post,
    path = "/leads",
    request_body = LeadInput,
    responses(
        (status = 201, description = "Lead created", body = LeadView),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 404, description = "Linked contact not found", body = crate::error::ErrorBody),
    ),
    tag = "leads"
)]
async fn create_lead(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<LeadInput>, JsonRejection>,
) -> Result<(StatusCode, Json<LeadView>), AppError> {
    let input = extract_json(body)?;
    let linked = linked_contact(&state, input.linked_contact())?;
    let lead = Lead::create(input, linked.as_ref(), caller.actor_id(), Utc::now())?;
    let lead = entities::create(&state, &caller, lead).await?;
    Ok((StatusCode::CREATED, Json(LeadView::new(lead, linked.as_ref()))))
}

/// GET /leads/pipeline/summary: Leads grouped by stage.
#[utoipa::path(
    get,
    path = "/leads/pipeline/summary",
    responses((status = 200, description = "One bucket per stage in use", body = Vec<StageSummary>)),
    tag = "leads"
)]
async fn get_pipeline_summary(State(state): State<AppState>) -> Json<Vec<StageSummary>> {
    Json(pipeline_summary(state.leads.list().iter()))
}

/// GET /leads/contact/:id: Contact details for the lead form.
#[utoipa::path(
    get,
    path = "/leads/contact/{id}",
    params(("id" = Uuid, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Contact details", body = LeadContactInfo),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "leads"
)]
async fn get_contact_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadContactInfo>, AppError> {
    let contact = entities::fetch::<Contact>(&state, id)?;
    Ok(Json(LeadContactInfo::from(&contact)))
}

/// GET /leads/:id: Get one lead.
#[utoipa::path(
    get,
    path = "/leads/{id}",
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead found", body = LeadView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "leads"
)]
async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadView>, AppError> {
    let lead = entities::fetch::<Lead>(&state, id)?;
    Ok(Json(view(&state, lead)))
}

/// PUT /leads/:id: Partially update a lead.
#[utoipa::path(
    put,
    path = "/leads/{id}",
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = LeadInput,
    responses(
        (status = 200, description = "Lead updated", body = LeadView),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 404, description = "Lead or linked contact not found", body = crate::error::ErrorBody),
    ),
    tag = "leads"
)]
async fn update_lead(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<LeadInput>, JsonRejection>,
) -> Result<Json<LeadView>, AppError> {
    let input = extract_json(body)?;
    // Only a newly linked contact feeds the company fallback.
    let linked = linked_contact(&state, input.linked_contact())?;
    let now = Utc::now();
    let lead = entities::update::<Lead, _>(&state, &caller, id, |l| {
        Ok(l.patched(input, linked.as_ref(), now)?)
    })
    .await?;
    Ok(Json(view(&state, lead)))
}

/// DELETE /leads/:id: Delete a lead and its attachments.
#[utoipa::path(
    delete,
    path = "/leads/{id}",
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead deleted", body = MessageResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "leads"
)]
async fn delete_lead(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    entities::delete::<Lead>(&state, &caller, id, <Lead as Attachable>::storage_ids).await?;
    Ok(Json(MessageResponse::new("Lead deleted successfully")))
}

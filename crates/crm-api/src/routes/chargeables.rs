//! # Chargeable API
//!
//! Chargeable CRUD plus search, per-customer listing and the customer
//! dropdown. The chargeable audit queries live in [`super::audit`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use crm_core::chargeable::customer_options;
use crm_core::{Attachable, Chargeable, ChargeableInput, Contact, CustomerOption};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{ListWindow, MessageResponse};
use crate::auth::CallerIdentity;
use crate::entities;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::state::AppState;

/// `?term=` for the chargeable search.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Substring of the customer name or chargeable type.
    pub term: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chargeables", get(list_chargeables).post(create_chargeable))
        .route("/chargeables/search", get(search_chargeables))
        .route("/chargeables/customer/:customer_name", get(list_by_customer))
        .route("/chargeables/dropdown/customers", get(list_customer_options))
        .route(
            "/chargeables/:id",
            get(get_chargeable)
                .put(update_chargeable)
                .delete(delete_chargeable),
        )
}

fn ensure_contact(state: &AppState, id: Option<Uuid>) -> Result<(), AppError> {
    match id {
        Some(id) => entities::fetch::<Contact>(state, id).map(|_| ()),
        None => Ok(()),
    }
}

/// GET /chargeables: List chargeables, newest first.
#[utoipa::path(
    get,
    path = "/chargeables",
    params(ListWindow),
    responses((status = 200, description = "Chargeables", body = Vec<Chargeable>)),
    tag = "chargeables"
)]
async fn list_chargeables(
    State(state): State<AppState>,
    window: Result<Query<ListWindow>, QueryRejection>,
) -> Result<Json<Vec<Chargeable>>, AppError> {
    let window = extract_query(window)?;
    Ok(Json(window.apply(state.chargeables.list(), |c| c.created_at)))
}

/// POST /chargeables: Create a chargeable.
#[utoipa::path(
    post,
    path = "/chargeables",
    request_body = ChargeableInput,
    responses(
        (status = 201, description = "Chargeable created", body = Chargeable),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 404, description = "Linked contact not found", body = crate::error::ErrorBody),
    ),
    tag = "chargeables"
)]
async fn create_chargeable(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ChargeableInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Chargeable>), AppError> {
    let input = extract_json(body)?;
    ensure_contact(&state, input.linked_contact())?;
    let chargeable = Chargeable::create(input, caller.actor_id(), Utc::now())?;
    let chargeable = entities::create(&state, &caller, chargeable).await?;
    Ok((StatusCode::CREATED, Json(chargeable)))
}

/// GET /chargeables/search: Case-insensitive match on customer or type.
#[utoipa::path(
    get,
    path = "/chargeables/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching chargeables, newest first", body = Vec<Chargeable>),
        (status = 400, description = "Missing term", body = crate::error::ErrorBody),
    ),
    tag = "chargeables"
)]
async fn search_chargeables(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Chargeable>>, AppError> {
    let params = extract_query(params)?;
    let term = params
        .term
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("search term is required".into()))?;
    let found = state.chargeables.filter(|c| c.matches_term(term));
    Ok(Json(ListWindow::default().apply(found, |c| c.created_at)))
}

/// GET /chargeables/customer/:customer_name: Chargeables of one customer.
#[utoipa::path(
    get,
    path = "/chargeables/customer/{customer_name}",
    params(("customer_name" = String, Path, description = "Exact customer name")),
    responses((status = 200, description = "Chargeables, newest first", body = Vec<Chargeable>)),
    tag = "chargeables"
)]
async fn list_by_customer(
    State(state): State<AppState>,
    Path(customer_name): Path<String>,
) -> Json<Vec<Chargeable>> {
    let mut found = state.chargeables.filter(|c| c.customer_name == customer_name);
    found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(found)
}

/// GET /chargeables/dropdown/customers: Customer and company names.
#[utoipa::path(
    get,
    path = "/chargeables/dropdown/customers",
    responses((status = 200, description = "Distinct names, sorted", body = Vec<CustomerOption>)),
    tag = "chargeables"
)]
async fn list_customer_options(State(state): State<AppState>) -> Json<Vec<CustomerOption>> {
    let customers = state.chargeables.list().into_iter().map(|c| c.customer_name);
    let companies = state.contacts.list().into_iter().map(|c| c.company_name);
    Json(customer_options(customers, companies))
}

/// GET /chargeables/:id: Get one chargeable.
#[utoipa::path(
    get,
    path = "/chargeables/{id}",
    params(("id" = Uuid, Path, description = "Chargeable ID")),
    responses(
        (status = 200, description = "Chargeable found", body = Chargeable),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "chargeables"
)]
async fn get_chargeable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Chargeable>, AppError> {
    entities::fetch::<Chargeable>(&state, id).map(Json)
}

/// PUT /chargeables/:id: Partially update a chargeable.
#[utoipa::path(
    put,
    path = "/chargeables/{id}",
    params(("id" = Uuid, Path, description = "Chargeable ID")),
    request_body = ChargeableInput,
    responses(
        (status = 200, description = "Chargeable updated", body = Chargeable),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "chargeables"
)]
async fn update_chargeable(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ChargeableInput>, JsonRejection>,
) -> Result<Json<Chargeable>, AppError> {
    let input = extract_json(body)?;
    ensure_contact(&state, input.linked_contact())?;
    let actor = caller.actor_id();
    let now = Utc::now();
    let chargeable = entities::update::<Chargeable, _>(&state, &caller, id, |c| {
        Ok(c.patched(input, actor, now)?)
    })
    .await?;
    Ok(Json(chargeable))
}

/// DELETE /chargeables/:id: Delete a chargeable and its attachments.
#[utoipa::path(
    delete,
    path = "/chargeables/{id}",
    params(("id" = Uuid, Path, description = "Chargeable ID")),
    responses(
        (status = 200, description = "Chargeable deleted", body = MessageResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "chargeables"
)]
async fn delete_chargeable(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    entities::delete::<Chargeable>(&state, &caller, id, <Chargeable as Attachable>::storage_ids)
        .await?;
    Ok(Json(MessageResponse::new("Chargeable deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use crm_core::ActorRef;
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

    fn quote(customer: &str, kind: &str) -> Value {
        json!({
            "quoteSendDate": "2025-02-01",
            "customerName": customer,
            "chargeableType": kind,
            "amount": 1200
        })
    }

    #[tokio::test]
    async fn search_requires_term() {
        let (status, _) = send(&AppState::default(), "GET", "/chargeables/search?term=%20", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_matches_customer_or_type() {
        let state = AppState::default();
        send(&state, "POST", "/chargeables", Some(quote("Acme", "Consulting"))).await;
        send(&state, "POST", "/chargeables", Some(quote("Beta", "Audit"))).await;

        let (_, body) = send(&state, "GET", "/chargeables/search?term=acm", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        let (_, body) = send(&state, "GET", "/chargeables/search?term=AUDIT", None).await;
        assert_eq!(body[0]["customerName"], "Beta");
    }

    #[tokio::test]
    async fn customer_listing_is_exact() {
        let state = AppState::default();
        send(&state, "POST", "/chargeables", Some(quote("Acme", "Consulting"))).await;
        send(&state, "POST", "/chargeables", Some(quote("Acme Ltd", "Consulting"))).await;
        let (_, body) = send(&state, "GET", "/chargeables/customer/Acme", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropdown_unions_customers_and_companies() {
        let state = AppState::default();
        send(&state, "POST", "/chargeables", Some(quote("Acme", "Consulting"))).await;
        let contact = Contact::create(
            serde_json::from_value(json!({
                "companyName": "Beta",
                "companyEmail": "hi@beta.test",
                "phoneNumber": "1"
            }))
            .unwrap(),
            None,
            Utc::now(),
        )
        .unwrap();
        state.contacts.insert(contact.id, contact);

        let (_, body) = send(&state, "GET", "/chargeables/dropdown/customers", None).await;
        assert_eq!(body, json!([{"name": "Acme"}, {"name": "Beta"}]));
    }

    #[tokio::test]
    async fn unknown_contact_person_is_404() {
        let state = AppState::default();
        let mut body = quote("Acme", "Consulting");
        body["contactPerson"] = json!(Uuid::new_v4());
        let (status, _) = send(&state, "POST", "/chargeables", Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(state.chargeables.is_empty());
    }

    #[tokio::test]
    async fn update_then_delete() {
        let state = AppState::default();
        let (_, created) = send(&state, "POST", "/chargeables", Some(quote("Acme", "Consulting"))).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &state,
            "PUT",
            &format!("/chargeables/{id}"),
            Some(json!({"invoiceSent": "yes"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["invoiceSent"], "yes");
        assert_eq!(state.audit.len(), 2);

        let (status, body) = send(&state, "DELETE", &format!("/chargeables/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Chargeable deleted successfully");
        assert_eq!(state.audit.len(), 3);
    }
}

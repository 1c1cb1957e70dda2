//! # Audit Trail API
//!
//! `GET /{resource}/audit/:id` is mounted once per resource through the
//! generic [`router`]. The chargeable collection additionally exposes the
//! collection-wide, per-actor and filtered queries.
//!
//! Every read is paginated (`page`, `limit`) and returns newest first.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use crm_core::temporal::parse_instant;
use crm_core::{ActorId, Attachable, AuditAction, AuditPage, AuditQuery, Choice, EntityKind, Pagination};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::entities;
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::{AppState, Resource};

/// `page`/`limit` of an audit read.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page (default 1).
    pub page: Option<u32>,
    /// Page size (default 50, max 500).
    pub limit: Option<u32>,
}

impl From<PageParams> for Pagination {
    fn from(p: PageParams) -> Self {
        Pagination::new(p.page, p.limit)
    }
}

/// Filters of `GET /chargeables/audit/search`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditSearch {
    /// Earliest timestamp, inclusive.
    pub start_date: Option<String>,
    /// Latest timestamp, inclusive.
    pub end_date: Option<String>,
    /// `create`, `update` or `delete`.
    pub action: Option<String>,
    /// Case-insensitive substring of the actor name.
    pub user_name: Option<String>,
}

impl AuditSearch {
    fn into_query(self) -> Result<AuditQuery, AppError> {
        fn instant(field: &str, raw: Option<String>) -> Result<Option<chrono::DateTime<chrono::Utc>>, AppError> {
            match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                None => Ok(None),
                Some(s) => parse_instant(s)
                    .map(Some)
                    .ok_or_else(|| AppError::BadRequest(format!("{field} is not a valid date"))),
            }
        }

        let action = match self.action.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(label) => Some(
                AuditAction::parse_label(label)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown action '{label}'")))?,
            ),
        };
        Ok(AuditQuery {
            start: instant("startDate", self.start_date)?,
            end: instant("endDate", self.end_date)?,
            action,
            actor_name: self
                .user_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            ..AuditQuery::kind(EntityKind::Chargeable)
        })
    }
}

/// `GET /{resource}s/audit/:id` for the resource `R`.
pub fn router<R: Resource>() -> Router<AppState> {
    let path = format!("/{}s/audit/:id", <R as Attachable>::KIND.as_str());
    Router::new().route(&path, get(entity_trail::<R>))
}

/// `/chargeables/audit`, `/chargeables/audit/search` and
/// `/chargeables/audit/user/:user_id`.
pub fn chargeable_router() -> Router<AppState> {
    Router::new()
        .route("/chargeables/audit", get(list_chargeable_audit))
        .route("/chargeables/audit/search", get(search_chargeable_audit))
        .route("/chargeables/audit/user/:user_id", get(list_chargeable_audit_by_actor))
}

async fn entity_trail<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    page: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<AuditPage>, AppError> {
    let page = extract_query(page)?;
    entities::fetch::<R>(&state, id)?;
    let query = AuditQuery::entity(<R as Attachable>::KIND, id);
    Ok(Json(state.audit.page(&query, page.into())))
}

/// GET /chargeables/audit: Every chargeable audit entry.
#[utoipa::path(
    get,
    path = "/chargeables/audit",
    params(PageParams),
    responses((status = 200, description = "One page of entries", body = AuditPage)),
    tag = "audit"
)]
async fn list_chargeable_audit(
    State(state): State<AppState>,
    page: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<AuditPage>, AppError> {
    let page = extract_query(page)?;
    let query = AuditQuery::kind(EntityKind::Chargeable);
    Ok(Json(state.audit.page(&query, page.into())))
}

/// GET /chargeables/audit/search: Filter by time range, action and actor name.
#[utoipa::path(
    get,
    path = "/chargeables/audit/search",
    params(AuditSearch, PageParams),
    responses(
        (status = 200, description = "One page of matching entries", body = AuditPage),
        (status = 400, description = "Unparseable filter", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
async fn search_chargeable_audit(
    State(state): State<AppState>,
    search: Result<Query<AuditSearch>, QueryRejection>,
    page: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<AuditPage>, AppError> {
    let query = extract_query(search)?.into_query()?;
    let page = extract_query(page)?;
    Ok(Json(state.audit.page(&query, page.into())))
}

/// GET /chargeables/audit/user/:user_id: Chargeable entries written by one actor.
#[utoipa::path(
    get,
    path = "/chargeables/audit/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Actor ID"), PageParams),
    responses((status = 200, description = "One page of entries", body = AuditPage)),
    tag = "audit"
)]
async fn list_chargeable_audit_by_actor(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    page: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<AuditPage>, AppError> {
    let page = extract_query(page)?;
    let query = AuditQuery {
        actor_id: Some(ActorId::from_uuid(user_id)),
        ..AuditQuery::kind(EntityKind::Chargeable)
    };
    Ok(Json(state.audit.page(&query, page.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use crm_core::{ActorRef, Chargeable, Contact};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::CallerIdentity;

    fn app(state: &AppState) -> Router<()> {
        Router::new()
            .merge(router::<Contact>())
            .merge(router::<Chargeable>())
            .merge(chargeable_router())
            .with_state(state.clone())
    }

    async fn get_json(state: &AppState, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn caller(actor: Option<ActorId>, name: &str) -> CallerIdentity {
        CallerIdentity {
            actor: ActorRef {
                id: actor,
                name: Some(name.into()),
            },
        }
    }

    async fn seed_chargeable(state: &AppState, who: &CallerIdentity, customer: &str) -> Uuid {
        let input = serde_json::from_value(json!({
            "quoteSendDate": "2025-02-01",
            "customerName": customer,
            "chargeableType": "Consulting",
            "amount": 100
        }))
        .unwrap();
        let c = Chargeable::create(input, who.actor_id(), Utc::now()).unwrap();
        entities::create(state, who, c).await.unwrap().id
    }

    #[tokio::test]
    async fn entity_trail_is_404_for_missing_entity() {
        let (status, _) = get_json(&AppState::default(), &format!("/contacts/audit/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn entity_trail_pages_newest_first() {
        let state = AppState::default();
        let dana = caller(None, "Dana");
        let id = seed_chargeable(&state, &dana, "Acme").await;
        for n in 1..=3 {
            entities::update::<Chargeable, _>(&state, &dana, id, |c| {
                let input = serde_json::from_value(json!({ "followUps": n })).unwrap();
                Ok(c.patched(input, None, Utc::now())?)
            })
            .await
            .unwrap();
        }

        let (status, body) = get_json(&state, &format!("/chargeables/audit/{id}?limit=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 4);
        assert_eq!(body["pagination"]["pages"], 2);
        let logs = body["auditLogs"].as_array().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["changes"][0]["newValue"], 3);
    }

    #[tokio::test]
    async fn search_and_actor_queries() {
        let state = AppState::default();
        let actor = ActorId::new();
        let dana = caller(Some(actor), "Dana Scully");
        let fox = caller(None, "Fox");
        let id = seed_chargeable(&state, &dana, "Acme").await;
        seed_chargeable(&state, &fox, "Beta").await;
        entities::delete::<Chargeable>(&state, &fox, id, |c| c.storage_ids()).await.unwrap();

        let (_, all) = get_json(&state, "/chargeables/audit").await;
        assert_eq!(all["pagination"]["total"], 3);

        let (_, by_name) = get_json(&state, "/chargeables/audit/search?userName=scully").await;
        assert_eq!(by_name["pagination"]["total"], 1);

        let (_, deletes) = get_json(&state, "/chargeables/audit/search?action=delete").await;
        assert_eq!(deletes["auditLogs"][0]["entityId"], id.to_string());

        let (_, future) = get_json(&state, "/chargeables/audit/search?startDate=2999-01-01").await;
        assert_eq!(future["pagination"]["total"], 0);

        let (_, mine) = get_json(&state, &format!("/chargeables/audit/user/{actor}")).await;
        assert_eq!(mine["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn search_rejects_garbage_filters() {
        let state = AppState::default();
        let (status, _) = get_json(&state, "/chargeables/audit/search?startDate=yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get_json(&state, "/chargeables/audit/search?action=rename").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

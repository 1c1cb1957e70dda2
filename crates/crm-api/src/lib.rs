//! # crm-api: Axum API Service for the CRM Backend
//!
//! Serves contacts, leads, tasks and chargeables over JSON/HTTP. Every
//! effective entity write lands in the field-level audit log; task writes
//! drive the reminder engine; a cron job emails due reminders.
//!
//! ## API Surface
//!
//! | Prefix                    | Module                        |
//! |---------------------------|-------------------------------|
//! | `/auth/*`                 | [`routes::auth`]              |
//! | `/contacts/*`             | [`routes::contacts`]          |
//! | `/leads/*`                | [`routes::leads`]             |
//! | `/tasks/*`                | [`routes::tasks`], [`routes::reminders`] |
//! | `/chargeables/*`          | [`routes::chargeables`]       |
//! | `/{resource}/audit/*`     | [`routes::audit`]             |
//! | `/{resource}/:id/attachments/*` | [`routes::attachments`] |
//! | `/health/*`               | unauthenticated probes        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Cors → Trace → Timeout → Metrics → Auth (protected routes only) → Handler
//! ```
//!
//! ## Crate Policy
//!
//! - Route handlers parse, delegate and shape responses; rules live in
//!   `crm-core`.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod attachments;
pub mod audit;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod directory;
pub mod entities;
pub mod error;
pub mod extractors;
pub mod mailer;
pub mod middleware;
pub mod notifications;
pub mod openapi;
pub mod reminders;
pub mod routes;
pub mod scheduler;
pub mod state;

use std::time::Duration;

use axum::middleware::from_fn;
use axum::Router;
use crm_core::{Chargeable, Contact, Lead, Task};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and the account routes other than `/auth/me` are mounted
/// outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig::new(&state.config, state.users.clone());
    let metrics = ApiMetrics::new();
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let protected = Router::new()
        .merge(routes::contacts::router())
        .merge(routes::leads::router())
        .merge(routes::tasks::router())
        .merge(routes::reminders::router())
        .merge(routes::chargeables::router())
        .merge(routes::audit::chargeable_router())
        .merge(routes::audit::router::<Contact>())
        .merge(routes::audit::router::<Lead>())
        .merge(routes::audit::router::<Task>())
        .merge(routes::audit::router::<Chargeable>())
        .merge(routes::attachments::router::<Contact>())
        .merge(routes::attachments::router::<Lead>())
        .merge(routes::attachments::router::<Task>())
        .merge(routes::attachments::router::<Chargeable>())
        .merge(routes::auth::protected_router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware));

    let api = Router::new()
        .merge(routes::auth::public_router())
        .merge(protected)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::tracing_layer::layer())
        .layer(CorsLayer::permissive())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(metrics))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once the stores are hydrated and the router is up.
async fn readiness() -> &'static str {
    "ready"
}

//! # API Route Modules
//!
//! - `auth`: signup, login, password reset, current actor.
//! - `contacts`, `leads`, `tasks`, `chargeables`: entity CRUD, list
//!   filters and the dropdown/summary queries of each resource.
//! - `attachments`: upload, download redirect and delete, mounted for
//!   every resource.
//! - `audit`: per-entity audit trails and the chargeable audit queries.
//! - `reminders`: reminder listing and acknowledgement, and the
//!   actor-scoped notification endpoints under `/tasks`.

pub mod attachments;
pub mod audit;
pub mod auth;
pub mod chargeables;
pub mod contacts;
pub mod leads;
pub mod reminders;
pub mod tasks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default page size for entity lists.
pub const DEFAULT_LIST_LIMIT: usize = 100;
/// Largest accepted page size for entity lists.
pub const MAX_LIST_LIMIT: usize = 1000;

/// `offset`/`limit` window over an entity list.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListWindow {
    /// Records to skip (default 0).
    pub offset: Option<usize>,
    /// Records to return (default 100, max 1000).
    pub limit: Option<usize>,
}

impl ListWindow {
    /// Sort newest first, then cut the window.
    pub fn apply<T>(&self, mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
        items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT);
        items
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(limit)
            .collect()
    }
}

/// `{ "message": ... }` acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

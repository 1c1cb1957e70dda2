//! # Audit Entries
//!
//! Immutable records of entity writes. An update that changed nothing
//! produces no entry; create and delete always produce one carrying a
//! synthetic change.
//!
//! Reads are filtered by [`AuditQuery`], ordered newest first and paginated
//! with [`Pagination`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::change::ChangeRecord;
use crate::choice::choice_enum;
use crate::identity::{ActorId, ActorRef, EntityKind};

/// Default page size for audit reads.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest accepted page size for audit reads.
pub const MAX_PAGE_SIZE: u32 = 500;

choice_enum! {
    /// Kind of write being audited.
    pub enum AuditAction (default Update) {
        /// Entity created.
        Create => "create",
        /// Entity modified.
        Update => "update",
        /// Entity removed.
        Delete => "delete",
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Identifier.
    pub id: Uuid,
    /// Collection of the audited entity.
    pub entity_kind: EntityKind,
    /// Audited entity.
    pub entity_id: Uuid,
    /// Actor that performed the write, if known.
    pub actor_id: Option<ActorId>,
    /// Actor display name, `System User` when unknown.
    pub actor_name: String,
    /// When the write happened.
    pub timestamp: DateTime<Utc>,
    /// Kind of write.
    pub action: AuditAction,
    /// Field-level changes.
    pub changes: Vec<ChangeRecord>,
}

impl AuditEntry {
    /// Build the entry for a write, or `None` for an update that changed
    /// nothing. Create and delete ignore `changes` and record their
    /// synthetic change instead.
    pub fn for_write(
        kind: EntityKind,
        entity_id: Uuid,
        actor: &ActorRef,
        action: AuditAction,
        changes: Vec<ChangeRecord>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let changes = match action {
            AuditAction::Create => vec![created_change(kind)],
            AuditAction::Delete => vec![deleted_change()],
            AuditAction::Update if changes.is_empty() => return None,
            AuditAction::Update => changes,
        };
        Some(Self {
            id: Uuid::new_v4(),
            entity_kind: kind,
            entity_id,
            actor_id: actor.id,
            actor_name: actor.audit_name().to_string(),
            timestamp: now,
            action,
            changes,
        })
    }
}

/// Synthetic change recorded on create.
pub fn created_change(kind: EntityKind) -> ChangeRecord {
    ChangeRecord::new(
        "all",
        Value::Null,
        Value::from(format!("{} created", kind.label())),
    )
}

/// Synthetic change recorded on delete.
pub fn deleted_change() -> ChangeRecord {
    ChangeRecord::new("status", Value::from("Active"), Value::from("Deleted"))
}

/// Change recorded when attachments are added.
pub fn attachments_added(count: usize) -> ChangeRecord {
    ChangeRecord::new(
        "attachments",
        Value::from("Previous attachments"),
        Value::from(format!("Added {count} attachments")),
    )
}

/// Change recorded when one attachment is removed.
pub fn attachment_removed(file_name: &str) -> ChangeRecord {
    ChangeRecord::new(
        "attachments",
        Value::from(file_name),
        Value::from("Attachment deleted"),
    )
}

/// Change recorded when a contact logo is replaced or removed.
pub fn logo_changed(old: Option<&str>, new: Option<&str>) -> ChangeRecord {
    ChangeRecord::new(
        "companyLogo",
        old.map(Value::from).unwrap_or(Value::Null),
        Value::from(new.unwrap_or("Logo deleted")),
    )
}

/// Filter for audit reads. Every set criterion must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    /// Restrict to one collection.
    pub entity_kind: Option<EntityKind>,
    /// Restrict to one entity.
    pub entity_id: Option<Uuid>,
    /// Restrict to one actor.
    pub actor_id: Option<ActorId>,
    /// Earliest timestamp (inclusive).
    pub start: Option<DateTime<Utc>>,
    /// Latest timestamp (inclusive).
    pub end: Option<DateTime<Utc>>,
    /// Restrict to one action.
    pub action: Option<AuditAction>,
    /// Case-insensitive substring of the actor name.
    pub actor_name: Option<String>,
}

impl AuditQuery {
    /// Entries of one collection.
    pub fn kind(kind: EntityKind) -> Self {
        Self {
            entity_kind: Some(kind),
            ..Self::default()
        }
    }

    /// Entries of one entity.
    pub fn entity(kind: EntityKind, entity_id: Uuid) -> Self {
        Self {
            entity_kind: Some(kind),
            entity_id: Some(entity_id),
            ..Self::default()
        }
    }

    /// Whether `entry` satisfies every criterion.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.entity_kind.map_or(true, |k| entry.entity_kind == k)
            && self.entity_id.map_or(true, |id| entry.entity_id == id)
            && self.actor_id.map_or(true, |a| entry.actor_id == Some(a))
            && self.start.map_or(true, |s| entry.timestamp >= s)
            && self.end.map_or(true, |e| entry.timestamp <= e)
            && self.action.map_or(true, |a| entry.action == a)
            && self.actor_name.as_deref().map_or(true, |needle| {
                entry
                    .actor_name
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
            })
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl Pagination {
    /// Clamp raw query values: page defaults to 1, limit to 50 (max 500).
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit
                .filter(|l| *l > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .min(MAX_PAGE_SIZE),
        }
    }

    fn skip(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination metadata of an audit page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageInfo {
    /// Matching entries across all pages.
    pub total: usize,
    /// This page's number.
    pub page: u32,
    /// Number of pages.
    pub pages: usize,
    /// Page size.
    pub limit: u32,
}

/// One page of audit entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    /// Entries on this page, newest first.
    pub audit_logs: Vec<AuditEntry>,
    /// Page metadata.
    pub pagination: PageInfo,
}

/// Filter, order newest first, and cut one page.
pub fn paginate<'a>(
    entries: impl IntoIterator<Item = &'a AuditEntry>,
    query: &AuditQuery,
    page: Pagination,
) -> AuditPage {
    let mut matching: Vec<&AuditEntry> = entries.into_iter().filter(|e| query.matches(e)).collect();
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let total = matching.len();
    let audit_logs = matching
        .into_iter()
        .skip(page.skip())
        .take(page.limit as usize)
        .cloned()
        .collect();
    AuditPage {
        audit_logs,
        pagination: PageInfo {
            total,
            page: page.page,
            pages: total.div_ceil(page.limit as usize),
            limit: page.limit,
        },
    }
}

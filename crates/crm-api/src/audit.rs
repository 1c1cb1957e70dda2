//! # Audit Log Writer
//!
//! Records one [`AuditEntry`] per effective entity write. Entries are kept
//! in memory for reads and appended to an optional [`AuditSink`]. A sink
//! failure is logged and swallowed: auditing never fails the write it
//! describes.
//!
//! The in-memory list is the read model every audit query is served from.
//! It is a full copy of the log, loaded from the sink's table at startup
//! and appended to on each write, so it is never trimmed: dropping entries
//! would silently shorten audit trails and skew pagination totals. Its size
//! tracks the `audit_log` table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use crm_core::{
    ActorRef, AuditAction, AuditEntry, AuditPage, AuditQuery, ChangeRecord, EntityKind, Pagination,
};
use parking_lot::RwLock;
use sqlx::PgPool;
use uuid::Uuid;

/// Durable destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    async fn append(&self, entry: &AuditEntry) -> Result<(), sqlx::Error>;
}

/// Appends to the `audit_log` table.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), sqlx::Error> {
        crate::db::audit::append(&self.pool, entry).await
    }
}

/// Append-only audit log: an in-memory read model plus an optional sink.
#[derive(Debug, Clone, Default)]
pub struct AuditLogWriter {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    sink: Option<Arc<dyn AuditSink>>,
}

impl AuditLogWriter {
    /// In-memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory plus a durable sink.
    pub fn with_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            entries: Arc::default(),
            sink: Some(sink),
        }
    }

    /// Record a write. Returns `None` for an update that changed nothing.
    pub async fn record(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        actor: &ActorRef,
        action: AuditAction,
        changes: Vec<ChangeRecord>,
    ) -> Option<AuditEntry> {
        let entry = AuditEntry::for_write(kind, entity_id, actor, action, changes, Utc::now())?;
        self.entries.write().push(entry.clone());

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.append(&entry).await {
                tracing::error!(
                    entity_kind = %kind,
                    entity_id = %entity_id,
                    action = %action,
                    error = %e,
                    "failed to persist audit entry"
                );
            }
        }

        tracing::debug!(
            entity_kind = %kind,
            entity_id = %entity_id,
            action = %action,
            changes = entry.changes.len(),
            actor = %entry.actor_name,
            "audit entry recorded"
        );
        Some(entry)
    }

    /// One page of entries matching `query`, newest first.
    pub fn page(&self, query: &AuditQuery, pagination: Pagination) -> AuditPage {
        crm_core::audit::paginate(self.entries.read().iter(), query, pagination)
    }

    /// Number of entries held in memory.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load persisted entries into memory. Returns how many were loaded.
    pub async fn hydrate(&self, pool: &PgPool) -> Result<usize, sqlx::Error> {
        let loaded = crate::db::audit::load_all(pool).await?;
        let count = loaded.len();
        self.entries.write().extend(loaded);
        Ok(count)
    }
}

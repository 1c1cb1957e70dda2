//! Entity write pipeline shared by the four resources: store the record,
//! write it through, then audit the write.
//!
//! When the write-through fails the in-memory mutation is reverted before
//! the error is returned, so the store never shows a write the audit log
//! lacks.
//!
//! Updates run their patch under the store's write lock. Change detection
//! happens after the lock is released, because resolving contact labels
//! reads the contact store.

use crm_core::{Attachable, AuditAction, ChangeDetector, EntityKind};
use uuid::Uuid;

use crate::attachments::delete_entity;
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::{AppState, Document, Resource};

/// Error for a missing entity of kind `R`.
pub fn not_found<R: Resource>(id: Uuid) -> AppError {
    AppError::NotFound(format!("{} {id} not found", <R as Attachable>::KIND.as_str()))
}

/// Fetch an entity or 404.
pub fn fetch<R: Resource>(state: &AppState, id: Uuid) -> Result<R, AppError> {
    R::store(state).get(&id).ok_or_else(|| not_found::<R>(id))
}

/// Insert a freshly validated entity and audit its creation.
pub async fn create<R: Resource>(
    state: &AppState,
    caller: &CallerIdentity,
    entity: R,
) -> Result<R, AppError> {
    let kind: EntityKind = <R as Attachable>::KIND;
    let id = entity.entity_id();
    R::store(state).insert(id, entity.clone());
    if let Err(e) = state.save(&entity).await {
        R::store(state).remove(&id);
        return Err(e);
    }
    state
        .audit
        .record(kind, id, &caller.actor, AuditAction::Create, Vec::new())
        .await;
    tracing::info!(entity_kind = %kind, entity_id = %id, actor = caller.actor.audit_name(), "entity created");
    Ok(entity)
}

/// Apply `patch` atomically, persist, and audit the field-level changes.
///
/// An update that changes no tracked field writes no audit entry.
pub async fn update<R, F>(
    state: &AppState,
    caller: &CallerIdentity,
    id: Uuid,
    patch: F,
) -> Result<R, AppError>
where
    R: Resource,
    F: FnOnce(&R) -> Result<R, AppError>,
{
    let kind = <R as Attachable>::KIND;
    let (before, after) = R::store(state)
        .try_update(&id, |current| {
            let next = patch(current)?;
            let before = std::mem::replace(current, next.clone());
            Ok::<_, AppError>((before, next))
        })
        .ok_or_else(|| not_found::<R>(id))??;

    if let Err(e) = state.save(&after).await {
        revert(state, &after, before);
        return Err(e);
    }
    let changes = ChangeDetector::new(&state.contacts).detect(&before, &after);
    let audited = state
        .audit
        .record(kind, id, &caller.actor, AuditAction::Update, changes)
        .await;
    tracing::info!(
        entity_kind = %kind,
        entity_id = %id,
        changes = audited.as_ref().map_or(0, |e| e.changes.len()),
        "entity updated"
    );
    Ok(after)
}

/// Put `prior` back in place of `written` after a failed write-through.
///
/// Left alone when a later write has already replaced `written` or the
/// record is gone.
pub(crate) fn revert<R: Resource>(state: &AppState, written: &R, prior: R) {
    let kind = <R as Attachable>::KIND;
    let id = prior.document_id();
    let reverted = R::store(state).try_update(&id, |current| {
        if *current != *written {
            return Err(());
        }
        *current = prior;
        Ok(())
    });
    match reverted {
        Some(Ok(())) => tracing::warn!(entity_kind = %kind, entity_id = %id, "write reverted after persistence failure"),
        _ => tracing::warn!(entity_kind = %kind, entity_id = %id, "write superseded, not reverted"),
    }
}

/// Remove an entity and its blobs, then audit the deletion.
pub async fn delete<R: Resource>(
    state: &AppState,
    caller: &CallerIdentity,
    id: Uuid,
    storage_ids: impl FnOnce(&R) -> Vec<String>,
) -> Result<R, AppError> {
    let kind = <R as Attachable>::KIND;
    let removed = delete_entity::<R>(state, id, storage_ids).await?;
    state
        .audit
        .record(kind, id, &caller.actor, AuditAction::Delete, Vec::new())
        .await;
    tracing::info!(entity_kind = %kind, entity_id = %id, "entity deleted");
    Ok(removed)
}

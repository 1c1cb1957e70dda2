//! # Attachment Manager
//!
//! Files live in the [`BlobStore`]; entities keep only [`Attachment`]
//! references. An upload call is all-or-nothing: blobs are stored
//! concurrently, and if any fails the ones already stored are deleted again
//! and the entity is left unchanged. The append itself runs under the
//! entity store's write lock.
//!
//! Blob deletions on detach and on entity delete are best effort. A failed
//! write-through reverts the entity and deletes any blob it introduced.

use axum::extract::Multipart;
use bytes::Bytes;
use chrono::Utc;
use crm_blob::BlobStore;
use crm_core::attachment::storage_key;
use crm_core::audit::{attachment_removed, attachments_added, logo_changed};
use crm_core::{Attachable, Attachment, AuditAction, Contact, EntityKind, UploadCandidate, UploadPolicy};
use futures::future::join_all;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::entities::revert;
use crate::error::AppError;
use crate::state::{AppState, Document, Resource};

/// Largest accepted multipart body: a full batch of maximum-size files.
pub const UPLOAD_BODY_LIMIT: usize = 10 * crm_core::attachment::MAX_FILE_BYTES + 1024 * 1024;

/// One file read from a multipart body.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl IncomingFile {
    fn candidate(&self) -> UploadCandidate {
        UploadCandidate {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size: self.bytes.len(),
        }
    }
}

/// Collect every part that carries a file name.
pub async fn read_files(mut multipart: Multipart) -> Result<Vec<IncomingFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        files.push(IncomingFile {
            file_name,
            content_type,
            bytes,
        });
    }
    Ok(files)
}

fn check(policy: UploadPolicy, files: &[IncomingFile]) -> Result<(), AppError> {
    let candidates: Vec<UploadCandidate> = files.iter().map(IncomingFile::candidate).collect();
    policy.check(&candidates)?;
    Ok(())
}

/// Store every file concurrently. On any failure, delete what was stored.
async fn store_all(
    blobs: &dyn BlobStore,
    kind: EntityKind,
    entity_id: Uuid,
    files: Vec<IncomingFile>,
) -> Result<Vec<Attachment>, AppError> {
    let uploads = files.into_iter().map(|file| async move {
        let key = storage_key(kind, entity_id, &file.file_name);
        let size = file.bytes.len() as u64;
        let result = blobs.put(&key, file.bytes, &file.content_type).await;
        result.map(|blob| Attachment {
            id: Uuid::new_v4(),
            file_name: file.file_name,
            storage_url: blob.url,
            storage_id: blob.storage_id,
            file_type: file.content_type,
            file_size: size,
            uploaded_at: Utc::now(),
        })
    });

    let mut stored = Vec::new();
    let mut first_error = None;
    for result in join_all(uploads).await {
        match result {
            Ok(attachment) => stored.push(attachment),
            Err(e) => {
                tracing::error!(entity_kind = %kind, entity_id = %entity_id, error = %e, "blob upload failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        None => Ok(stored),
        Some(e) => {
            rollback(blobs, &stored).await;
            Err(e.into())
        }
    }
}

async fn rollback(blobs: &dyn BlobStore, stored: &[Attachment]) {
    let ids: Vec<String> = stored.iter().map(|a| a.storage_id.clone()).collect();
    delete_blobs(blobs, &ids).await;
}

/// Delete blobs concurrently, logging failures. Returns how many succeeded.
pub async fn delete_blobs(blobs: &dyn BlobStore, storage_ids: &[String]) -> usize {
    let results = join_all(storage_ids.iter().map(|id| async move {
        let result = blobs.delete(id).await;
        if let Err(e) = &result {
            tracing::warn!(storage_id = %id, error = %e, "blob deletion failed, ignoring");
        }
        result.is_ok()
    }))
    .await;
    results.into_iter().filter(|ok| *ok).count()
}

/// Upload `files` and append them to the entity.
pub async fn attach<R: Resource>(
    state: &AppState,
    caller: &CallerIdentity,
    entity_id: Uuid,
    files: Vec<IncomingFile>,
) -> Result<Vec<Attachment>, AppError> {
    let kind = <R as Attachable>::KIND;
    let store = R::store(state);
    if !store.contains(&entity_id) {
        return Err(not_found(kind, entity_id));
    }
    check(UploadPolicy::for_kind(kind), &files)?;

    let added = store_all(state.blobs.as_ref(), kind, entity_id, files).await?;

    let now = Utc::now();
    let appended = store.try_update(&entity_id, |entity| -> Result<(R, R), AppError> {
        let before = entity.clone();
        entity.attachments_mut().extend(added.iter().cloned());
        entity.touch(now);
        Ok((before, entity.clone()))
    });
    let (before, entity) = match appended {
        Some(result) => result?,
        None => {
            rollback(state.blobs.as_ref(), &added).await;
            return Err(not_found(kind, entity_id));
        }
    };

    if let Err(e) = state.save(&entity).await {
        revert(state, &entity, before);
        rollback(state.blobs.as_ref(), &added).await;
        return Err(e);
    }
    state
        .audit
        .record(
            kind,
            entity_id,
            &caller.actor,
            AuditAction::Update,
            vec![attachments_added(added.len())],
        )
        .await;
    tracing::info!(entity_kind = %kind, entity_id = %entity_id, count = added.len(), "attachments added");
    Ok(added)
}

/// Remove one attachment reference and try to delete its blob.
pub async fn detach<R: Resource>(
    state: &AppState,
    caller: &CallerIdentity,
    entity_id: Uuid,
    attachment_id: Uuid,
) -> Result<(), AppError> {
    let kind = <R as Attachable>::KIND;
    let now = Utc::now();
    let (removed, before, entity) = R::store(state)
        .try_update(&entity_id, |entity| {
            let before = entity.clone();
            let removed = entity
                .take_attachment(attachment_id)
                .ok_or_else(|| AppError::NotFound(format!("attachment {attachment_id} not found")))?;
            entity.touch(now);
            Ok::<_, AppError>((removed, before, entity.clone()))
        })
        .ok_or_else(|| not_found(kind, entity_id))??;

    if let Err(e) = state.save(&entity).await {
        revert(state, &entity, before);
        return Err(e);
    }
    delete_blobs(state.blobs.as_ref(), &[removed.storage_id.clone()]).await;
    state
        .audit
        .record(
            kind,
            entity_id,
            &caller.actor,
            AuditAction::Update,
            vec![attachment_removed(&removed.file_name)],
        )
        .await;
    Ok(())
}

/// Look up one attachment of an entity.
pub fn find<R: Resource>(
    state: &AppState,
    entity_id: Uuid,
    attachment_id: Uuid,
) -> Result<Attachment, AppError> {
    let entity = R::store(state)
        .get(&entity_id)
        .ok_or_else(|| not_found(<R as Attachable>::KIND, entity_id))?;
    entity
        .attachments()
        .iter()
        .find(|a| a.id == attachment_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("attachment {attachment_id} not found")))
}

/// Replace the contact's logo.
pub async fn set_logo(
    state: &AppState,
    caller: &CallerIdentity,
    contact_id: Uuid,
    files: Vec<IncomingFile>,
) -> Result<Attachment, AppError> {
    if !state.contacts.contains(&contact_id) {
        return Err(not_found(EntityKind::Contact, contact_id));
    }
    check(UploadPolicy::logo(), &files)?;
    let mut stored = store_all(state.blobs.as_ref(), EntityKind::Contact, contact_id, files).await?;
    let Some(logo) = stored.pop() else {
        return Err(AppError::BadRequest("no logo file in request".into()));
    };

    let now = Utc::now();
    let replaced = state.contacts.try_update(&contact_id, |c| -> Result<_, AppError> {
        let before = c.clone();
        let old = c.company_logo.replace(logo.clone());
        c.updated_at = now;
        Ok((old, before, c.clone()))
    });
    let (old, before, contact) = match replaced {
        Some(result) => result?,
        None => {
            rollback(state.blobs.as_ref(), std::slice::from_ref(&logo)).await;
            return Err(not_found(EntityKind::Contact, contact_id));
        }
    };

    if let Err(e) = state.save(&contact).await {
        revert(state, &contact, before);
        rollback(state.blobs.as_ref(), std::slice::from_ref(&logo)).await;
        return Err(e);
    }
    if let Some(old) = &old {
        delete_blobs(state.blobs.as_ref(), &[old.storage_id.clone()]).await;
    }
    state
        .audit
        .record(
            EntityKind::Contact,
            contact_id,
            &caller.actor,
            AuditAction::Update,
            vec![logo_changed(
                old.as_ref().map(|o| o.file_name.as_str()),
                Some(&logo.file_name),
            )],
        )
        .await;
    Ok(logo)
}

/// Clear the contact's logo.
pub async fn remove_logo(
    state: &AppState,
    caller: &CallerIdentity,
    contact_id: Uuid,
) -> Result<(), AppError> {
    let now = Utc::now();
    let (old, before, contact): (Attachment, Contact, Contact) = state
        .contacts
        .try_update(&contact_id, |c| {
            let before = c.clone();
            let old = c
                .company_logo
                .take()
                .ok_or_else(|| AppError::NotFound(format!("contact {contact_id} has no logo")))?;
            c.updated_at = now;
            Ok::<_, AppError>((old, before, c.clone()))
        })
        .ok_or_else(|| not_found(EntityKind::Contact, contact_id))??;

    if let Err(e) = state.save(&contact).await {
        revert(state, &contact, before);
        return Err(e);
    }
    delete_blobs(state.blobs.as_ref(), &[old.storage_id.clone()]).await;
    state
        .audit
        .record(
            EntityKind::Contact,
            contact_id,
            &caller.actor,
            AuditAction::Update,
            vec![logo_changed(Some(&old.file_name), None)],
        )
        .await;
    Ok(())
}

/// Remove an entity, then delete every blob it owned (best effort).
pub async fn delete_entity<R: Resource>(
    state: &AppState,
    entity_id: Uuid,
    storage_ids: impl FnOnce(&R) -> Vec<String>,
) -> Result<R, AppError> {
    let kind = <R as Attachable>::KIND;
    let store = R::store(state);
    let removed = store
        .remove(&entity_id)
        .ok_or_else(|| not_found(kind, entity_id))?;
    if let Err(e) = state.purge::<R>(removed.document_id()).await {
        store.insert(entity_id, removed);
        return Err(e);
    }

    let ids = storage_ids(&removed);
    if !ids.is_empty() {
        let deleted = delete_blobs(state.blobs.as_ref(), &ids).await;
        tracing::info!(
            entity_kind = %kind,
            entity_id = %entity_id,
            requested = ids.len(),
            deleted,
            "entity blobs purged"
        );
    }
    Ok(removed)
}

fn not_found(kind: EntityKind, id: Uuid) -> AppError {
    AppError::NotFound(format!("{} {id} not found", kind.as_str()))
}

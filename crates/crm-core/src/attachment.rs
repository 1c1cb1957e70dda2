//! # Attachments
//!
//! Metadata for uploaded files embedded in an entity's `attachments` list.
//! The bytes live in blob storage; `storage_id` is the handle used to delete
//! them again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationErrors;
use crate::identity::EntityKind;

/// Largest accepted file, in bytes (10 MiB).
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Extensions accepted for upload (lowercase, without the dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpeg", "jpg", "png", "gif", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt",
];

/// Metadata of one stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment identifier (unique within its parent).
    pub id: Uuid,
    /// Original client file name.
    pub file_name: String,
    /// Public URL of the stored blob.
    pub storage_url: String,
    /// Blob-store handle used for deletion.
    pub storage_id: String,
    /// MIME type reported by the client.
    pub file_type: String,
    /// Size in bytes.
    pub file_size: u64,
    /// When the upload completed.
    pub uploaded_at: DateTime<Utc>,
}

/// An entity that carries an attachment list.
pub trait Attachable {
    /// The collection this entity belongs to.
    const KIND: EntityKind;

    /// The entity's identifier.
    fn entity_id(&self) -> Uuid;

    /// The embedded attachments.
    fn attachments(&self) -> &[Attachment];

    /// Mutable access to the embedded attachments.
    fn attachments_mut(&mut self) -> &mut Vec<Attachment>;

    /// Stamp the entity as modified.
    fn touch(&mut self, at: DateTime<Utc>);

    /// Every blob handle owned by this entity, for purge on delete.
    fn storage_ids(&self) -> Vec<String> {
        self.attachments()
            .iter()
            .map(|a| a.storage_id.clone())
            .collect()
    }

    /// Remove one attachment by id, returning it.
    fn take_attachment(&mut self, attachment_id: Uuid) -> Option<Attachment> {
        let list = self.attachments_mut();
        let pos = list.iter().position(|a| a.id == attachment_id)?;
        Some(list.remove(pos))
    }
}

/// A file offered for upload, before it reaches blob storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    /// Client file name.
    pub file_name: String,
    /// Client content type.
    pub content_type: String,
    /// Size in bytes.
    pub size: usize,
}

/// Limits applied to one upload call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Largest accepted file.
    pub max_file_bytes: usize,
    /// Most files accepted in one call.
    pub max_files: usize,
}

impl UploadPolicy {
    /// Policy for attachments on the given collection.
    pub fn for_kind(kind: EntityKind) -> Self {
        let max_files = match kind {
            EntityKind::Chargeable => 5,
            _ => 10,
        };
        Self {
            max_file_bytes: MAX_FILE_BYTES,
            max_files,
        }
    }

    /// Policy for the single contact logo slot.
    pub fn logo() -> Self {
        Self {
            max_file_bytes: MAX_FILE_BYTES,
            max_files: 1,
        }
    }

    /// Check a batch of candidates, reporting every offending file.
    pub fn check(&self, files: &[UploadCandidate]) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if files.is_empty() {
            return Err(ValidationErrors::single("files", "at least one file is required"));
        }
        if files.len() > self.max_files {
            errors.push(crate::error::FieldError::new(
                "files",
                format!("at most {} files per upload", self.max_files),
            ));
        }
        for f in files {
            if f.size > self.max_file_bytes {
                errors.push(crate::error::FieldError::new(
                    "files",
                    format!("{} exceeds the {} byte limit", f.file_name, self.max_file_bytes),
                ));
            }
            if !extension_allowed(&f.file_name) {
                errors.push(crate::error::FieldError::new(
                    "files",
                    format!("{} has a file type that is not allowed", f.file_name),
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(errors))
        }
    }
}

/// Whether the file name carries an allowed extension.
pub fn extension_allowed(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Blob key for a new upload: `{collection}/{entity}/{uuid}-{sanitized name}`.
pub fn storage_key(kind: EntityKind, entity_id: Uuid, file_name: &str) -> String {
    let clean: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}s/{}/{}-{}", kind.as_str(), entity_id, Uuid::new_v4(), clean)
}

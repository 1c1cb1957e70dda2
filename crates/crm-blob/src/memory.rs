//! In-process blob store.
//!
//! Used when no storage service is configured and by tests, which can make
//! individual uploads or every delete fail and count delete calls.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::BlobError;
use crate::{BlobStore, StoredBlob};

#[derive(Debug, Clone)]
struct Object {
    bytes: Bytes,
    content_type: String,
}

/// Blob store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: RwLock<HashMap<String, Object>>,
    failing_puts: RwLock<HashSet<String>>,
    fail_deletes: AtomicBool,
    delete_calls: AtomicUsize,
}

impl InMemoryBlobStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload whose key ends with `suffix` fail.
    pub fn fail_puts_ending_with(&self, suffix: &str) {
        self.failing_puts.write().insert(suffix.to_string());
    }

    /// Make every delete fail (after being counted).
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of delete calls received, failed ones included.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Whether an object is stored under `storage_id`.
    pub fn contains(&self, storage_id: &str) -> bool {
        self.objects.read().contains_key(storage_id)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Content type recorded for `storage_id`.
    pub fn content_type(&self, storage_id: &str) -> Option<String> {
        self.objects
            .read()
            .get(storage_id)
            .map(|o| o.content_type.clone())
    }

    /// Stored bytes for `storage_id`.
    pub fn bytes(&self, storage_id: &str) -> Option<Bytes> {
        self.objects.read().get(storage_id).map(|o| o.bytes.clone())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<StoredBlob, BlobError> {
        let rejected = self
            .failing_puts
            .read()
            .iter()
            .any(|suffix| key.ends_with(suffix.as_str()));
        if rejected {
            return Err(BlobError::Rejected {
                key: key.to_string(),
                reason: "upload rejected".into(),
            });
        }
        self.objects.write().insert(
            key.to_string(),
            Object {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(StoredBlob {
            url: format!("memory://{key}"),
            storage_id: key.to_string(),
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), BlobError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Rejected {
                key: storage_id.to_string(),
                reason: "delete rejected".into(),
            });
        }
        self.objects.write().remove(storage_id);
        Ok(())
    }
}

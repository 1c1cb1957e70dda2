//! # crm-blob: Blob storage for CRM attachments
//!
//! Uploaded files live outside the document store. Entities keep only the
//! public URL and the storage id returned here; the id is what
//! [`BlobStore::delete`] takes to remove the object again.
//!
//! Two implementations sit behind the [`BlobStore`] trait:
//! - [`HttpBlobStore`], a typed client for the storage API (bearer auth,
//!   retry with backoff on transport errors and busy gateways);
//! - [`InMemoryBlobStore`], used when no storage service is configured and
//!   in tests.

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod retry;

pub use config::BlobConfig;
pub use error::BlobError;
pub use http::HttpBlobStore;
pub use memory::InMemoryBlobStore;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Location of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    /// Public download URL.
    pub url: String,
    /// Handle for later deletion.
    pub storage_id: String,
}

/// Object storage for attachment bytes.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Store `bytes` under `key`.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<StoredBlob, BlobError>;

    /// Remove a stored object. Removing an absent object succeeds.
    async fn delete(&self, storage_id: &str) -> Result<(), BlobError>;
}

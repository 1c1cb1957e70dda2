//! HTTP blob store.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | PUT    | `/{bucket}/{key}` | Store bytes under `key` |
//! | DELETE | `/{bucket}/{key}` | Remove the object (404 counts as removed) |
//!
//! The storage id handed back to callers is the object key; the public
//! URL is `{public_url}/{bucket}/{key}`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::{BlobConfig, ConfigError};
use crate::error::BlobError;
use crate::retry::RetryPolicy;
use crate::{BlobStore, StoredBlob};

/// Client for the HTTP storage API.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    http: reqwest::Client,
    base: String,
    public: String,
    bucket: String,
    retry: RetryPolicy,
}

impl HttpBlobStore {
    /// Build a client from configuration.
    pub fn new(config: BlobConfig) -> Result<Self, BlobError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_token.as_str()))
                .map_err(|_| BlobError::Config(ConfigError::MissingToken))?,
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| BlobError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base: config.base_url.as_str().trim_end_matches('/').to_string(),
            public: config.public_url.as_str().trim_end_matches('/').to_string(),
            bucket: config.bucket,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the default retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base, self.bucket, key)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public, self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<StoredBlob, BlobError> {
        let endpoint = format!("PUT /{}/{key}", self.bucket);
        let url = self.object_url(key);

        let resp = self
            .retry
            .run(&endpoint, || {
                self.http
                    .put(&url)
                    .header(CONTENT_TYPE, content_type)
                    .body(bytes.clone())
                    .send()
            })
            .await
            .map_err(|e| BlobError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                endpoint,
                status,
                body,
            });
        }

        tracing::debug!(key, size = bytes.len(), "blob stored");
        Ok(StoredBlob {
            url: self.public_url(key),
            storage_id: key.to_string(),
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), BlobError> {
        let endpoint = format!("DELETE /{}/{storage_id}", self.bucket);
        let url = self.object_url(storage_id);

        let resp = self
            .retry
            .run(&endpoint, || self.http.delete(&url).send())
            .await
            .map_err(|e| BlobError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(storage_id, "blob already absent");
            return Ok(());
        }

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                endpoint,
                status,
                body,
            });
        }

        Ok(())
    }
}

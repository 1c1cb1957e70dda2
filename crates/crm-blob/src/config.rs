//! Blob-store client configuration.
//!
//! Loaded from the environment. When `BLOB_STORE_URL` is unset the service
//! falls back to the in-memory store, so [`BlobConfig::from_env`] returns
//! `Ok(None)` rather than an error in that case.

use url::Url;
use zeroize::Zeroizing;

/// Configuration for the HTTP blob store.
///
/// Custom `Debug` implementation redacts the `api_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct BlobConfig {
    /// Base URL of the storage API.
    pub base_url: Url,
    /// Bucket that receives CRM uploads.
    pub bucket: String,
    /// Base URL used to build public download links. Defaults to `base_url`.
    pub public_url: Url,
    /// Bearer token for API authentication.
    pub api_token: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for BlobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobConfig")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("public_url", &self.public_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl BlobConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `BLOB_STORE_URL` (unset: no HTTP store configured)
    /// - `BLOB_STORE_TOKEN` (required when `BLOB_STORE_URL` is set)
    /// - `BLOB_BUCKET` (default: `crm-attachments`)
    /// - `BLOB_PUBLIC_URL` (default: `BLOB_STORE_URL`)
    /// - `BLOB_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(raw_base) = std::env::var("BLOB_STORE_URL") else {
            return Ok(None);
        };
        let base_url = parse_url("BLOB_STORE_URL", &raw_base)?;
        let api_token = std::env::var("BLOB_STORE_TOKEN").map_err(|_| ConfigError::MissingToken)?;
        let public_url = match std::env::var("BLOB_PUBLIC_URL") {
            Ok(raw) => parse_url("BLOB_PUBLIC_URL", &raw)?,
            Err(_) => base_url.clone(),
        };

        Ok(Some(Self {
            base_url,
            bucket: std::env::var("BLOB_BUCKET").unwrap_or_else(|_| "crm-attachments".to_string()),
            public_url,
            api_token: Zeroizing::new(api_token),
            timeout_secs: std::env::var("BLOB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }))
    }

    /// Configuration pointing at a local mock server (for testing).
    pub fn local_mock(base: &str, token: &str) -> Result<Self, ConfigError> {
        let base_url = parse_url("local_mock", base)?;
        Ok(Self {
            public_url: base_url.clone(),
            base_url,
            bucket: "test-bucket".to_string(),
            api_token: Zeroizing::new(token.to_string()),
            timeout_secs: 5,
        })
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BLOB_STORE_TOKEN environment variable is required when BLOB_STORE_URL is set")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = BlobConfig::local_mock("http://127.0.0.1:9100", "t").unwrap();
        assert_eq!(cfg.bucket, "test-bucket");
        assert_eq!(cfg.public_url, cfg.base_url);
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = BlobConfig::local_mock("http://127.0.0.1:9100", "super-secret").unwrap();
        let printed = format!("{cfg:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            BlobConfig::local_mock("not a url", "t"),
            Err(ConfigError::InvalidUrl(_, _))
        ));
    }
}

//! Blob-store error types.

/// Errors from blob-store calls.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The storage API returned a non-2xx status.
    #[error("blob store {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Failure injected or reported by a non-HTTP store.
    #[error("blob store rejected {key}: {reason}")]
    Rejected { key: String, reason: String },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

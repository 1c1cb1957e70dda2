//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from crm-core, crm-blob and the mailer to HTTP status
//! codes with a JSON body of error code, message and optional details.
//! Internal and dependency failures are logged and never exposed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crm_core::ValidationErrors;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::mailer::MailError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Per-field failures for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Why a request was not authenticated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("No token, authorization denied")]
    TokenMissing,
    #[error("Token is not valid")]
    TokenInvalid,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("An authenticated actor with a display name is required")]
    ActorRequired,
}

impl AuthFailure {
    /// Machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenMissing => "TOKEN_MISSING",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::ActorRequired => "ACTOR_REQUIRED",
        }
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// One or more fields failed validation (400).
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Request body, path or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found (404).
    #[error("{0}")]
    NotFound(String),

    /// Missing, invalid or expired credential (401).
    #[error("{0}")]
    Unauthorized(AuthFailure),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An external collaborator (blob storage, SMTP) failed (500).
    /// Message is logged but not returned to the client.
    #[error("dependency failure: {0}")]
    Dependency(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Unauthorized(failure) => (StatusCode::UNAUTHORIZED, failure.code()),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Dependency(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DEPENDENCY_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Dependency(_) => "A dependent service failed".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_) | Self::Dependency(_)) {
            tracing::error!(error = %self, code, "request failed");
        }

        let details = match &self {
            Self::Validation(errors) => Some(serde_json::json!({ "fields": errors.fields() })),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        Self::Unauthorized(failure)
    }
}

impl From<crm_blob::BlobError> for AppError {
    fn from(err: crm_blob::BlobError) -> Self {
        Self::Dependency(err.to_string())
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        Self::Dependency(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                AppError::Unauthorized(AuthFailure::TokenExpired),
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
            ),
            (
                AppError::Dependency("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "DEPENDENCY_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[tokio::test]
    async fn validation_lists_every_field() {
        let errors = ValidationErrors::new(vec![
            crm_core::FieldError::new("title", "is required"),
            crm_core::FieldError::new("priority", "must be one of Low, Medium, High"),
        ]);
        let (status, body) = response_parts(AppError::from(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.code, "VALIDATION_ERROR");
        let fields = body.error.details.unwrap()["fields"].as_array().unwrap().clone();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["field"], "title");
        assert_eq!(fields[1]["field"], "priority");
    }

    #[tokio::test]
    async fn not_found_carries_message() {
        let (status, body) = response_parts(AppError::NotFound("lead 7 not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.message, "lead 7 not found");
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn internal_and_dependency_are_redacted() {
        let (status, body) = response_parts(AppError::Internal("pool exhausted at 10.0.0.3".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.message.contains("10.0.0.3"));

        let (_, body) = response_parts(AppError::Dependency("PUT /bucket/key: 507".into())).await;
        assert_eq!(body.error.code, "DEPENDENCY_ERROR");
        assert!(!body.error.message.contains("bucket"));
    }

    #[tokio::test]
    async fn unauthorized_uses_failure_code() {
        let (status, body) = response_parts(AuthFailure::TokenMissing.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error.code, "TOKEN_MISSING");
        assert_eq!(body.error.message, "No token, authorization denied");
    }
}

//! # Error Hierarchy
//!
//! Structured error types for the CRM domain, built with `thiserror`.
//!
//! Validation never stops at the first problem: every write collects all
//! field-level failures into a single [`ValidationErrors`] so the caller can
//! report them together.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    /// The offending field, using its wire (camelCase) name.
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl FieldError {
    /// Build a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// All validation failures produced by one write.
///
/// Never empty when returned as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(Vec<FieldError>);

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// Wrap a non-empty list of field errors.
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }

    /// Convenience constructor for a single failing field.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, message)])
    }

    /// The individual field errors, in the order they were detected.
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// Whether the given field failed validation.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Consume into the underlying list.
    pub fn into_fields(self) -> Vec<FieldError> {
        self.0
    }
}

/// Failure to derive a reminder instant from a task's reminder fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DueTimeError {
    /// `reminderDate` is not a `YYYY-MM-DD` calendar date.
    #[error("invalid reminder date \"{0}\" (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// `reminderTime` is not an `HH:MM` or `HH:MM:SS` wall-clock time.
    #[error("invalid reminder time \"{0}\" (expected HH:MM or HH:MM:SS)")]
    InvalidTime(String),
}

//! # Write-time Validation
//!
//! A [`Validator`] accumulates [`FieldError`]s while an input is applied to
//! an entity, so one rejected write reports every bad field at once.
//!
//! The same rules serve create and update. On create every required field
//! must be present; on update absent fields are left untouched, but a
//! present field is held to the same rule as on create.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::choice::Choice;
use crate::error::{FieldError, ValidationErrors};
use crate::temporal;

/// Whether an input creates a new entity or patches an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Required fields must be present.
    Create,
    /// Absent fields keep their current value.
    Update,
}

/// A client-supplied amount: a JSON number or a numeric string that may
/// carry thousands separators (`"12,500.50"`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum AmountInput {
    /// Plain JSON number.
    Number(f64),
    /// Text form, commas stripped before parsing.
    Text(String),
}

impl AmountInput {
    /// Numeric value, or `None` if the text does not parse to a finite number.
    pub fn to_number(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => {
                let cleaned: String = s.chars().filter(|c| *c != ',').collect();
                cleaned.trim().parse::<f64>().ok()?
            }
        };
        n.is_finite().then_some(n)
    }
}

impl From<f64> for AmountInput {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Collects field errors for one write.
#[derive(Debug)]
pub struct Validator {
    mode: Mode,
    errors: Vec<FieldError>,
}

impl Validator {
    /// Start validating a write in the given mode.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            errors: Vec::new(),
        }
    }

    /// The mode this validator runs in.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Record an error against `field`.
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn missing(&mut self, field: &str) {
        if self.mode == Mode::Create {
            self.push(field, "is required");
        }
    }

    /// A required, non-blank text field. Returns the trimmed value.
    pub fn required_text(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            None => {
                self.missing(field);
                None
            }
            Some("") => {
                self.push(field, "is required");
                None
            }
            Some(s) => Some(s.to_string()),
        }
    }

    /// A value from a closed label set.
    pub fn choice<C: Choice>(&mut self, field: &str, value: Option<&str>) -> Option<C> {
        let raw = value?;
        match C::parse_label(raw) {
            Some(v) => Some(v),
            None => {
                self.push(field, format!("must be one of: {}", C::allowed()));
                None
            }
        }
    }

    /// A non-negative amount. `required` only matters on create.
    pub fn amount(
        &mut self,
        field: &str,
        value: Option<&AmountInput>,
        required: bool,
    ) -> Option<f64> {
        let Some(input) = value else {
            if required {
                self.missing(field);
            }
            return None;
        };
        match input.to_number() {
            None => {
                self.push(field, "must be a number");
                None
            }
            Some(n) if n < 0.0 => {
                self.push(field, "must not be negative");
                None
            }
            Some(n) => Some(n),
        }
    }

    /// A non-negative whole count.
    pub fn count(&mut self, field: &str, value: Option<i64>) -> Option<u32> {
        let n = value?;
        match u32::try_from(n) {
            Ok(n) => Some(n),
            Err(_) => {
                self.push(field, "must be a non-negative whole number");
                None
            }
        }
    }

    /// A parseable date or datetime. `required` only matters on create.
    pub fn date(
        &mut self,
        field: &str,
        value: Option<&str>,
        required: bool,
    ) -> Option<DateTime<Utc>> {
        let Some(raw) = value else {
            if required {
                self.missing(field);
            }
            return None;
        };
        match temporal::parse_instant(raw) {
            Some(dt) => Some(dt),
            None => {
                self.push(field, "must be a valid date");
                None
            }
        }
    }

    /// An email address: trimmed, lowercased, and containing one `@` with
    /// text on both sides.
    pub fn email(&mut self, field: &str, value: Option<&str>, required: bool) -> Option<String> {
        let text = if required {
            self.required_text(field, value)?
        } else {
            let s = value?.trim();
            if s.is_empty() {
                return Some(String::new());
            }
            s.to_string()
        };
        let lowered = text.to_lowercase();
        match lowered.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
                Some(lowered)
            }
            _ => {
                self.push(field, "must be a valid email address");
                None
            }
        }
    }

    /// Whether any error has been recorded so far.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Finish: `Ok(())` when no field failed.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(self.errors))
        }
    }
}

/// Serde helper for patch fields where an explicit `null` differs from an
/// absent key: absent is `None`, `null` is `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Serde helper for optional entity references: absent is `None`; `null`
/// or an empty string clears the reference; anything else must be a UUID.
pub fn nullable_reference<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Some(None)),
        Some(s) => Uuid::parse_str(s)
            .map(|id| Some(Some(id)))
            .map_err(serde::de::Error::custom),
    }
}

/// Trim an optional free-text field.
pub fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(|s| s.trim().to_string())
}

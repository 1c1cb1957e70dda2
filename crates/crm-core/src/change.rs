//! # Change Detection
//!
//! Compares two snapshots of the same entity over its statically declared
//! tracked fields and yields one [`ChangeRecord`] per field whose canonical
//! form differs. Identifiers, timestamps and attachment lists are never
//! tracked.
//!
//! Canonical forms:
//!
//! - [`FieldKind::Plain`]: the serialized JSON value, compared structurally.
//! - [`FieldKind::Date`]: RFC 3339 UTC with millisecond precision, so
//!   `2025-01-10` and `2025-01-10T00:00:00Z` are the same date.
//! - [`FieldKind::Reference`]: the referenced id's string form. The recorded
//!   value is the referenced entity's label, or the raw id when the label
//!   cannot be resolved.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::identity::EntityKind;
use crate::temporal;

/// One field-level difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Wire name of the changed field.
    pub field: String,
    /// Value before the write.
    #[schema(value_type = Object)]
    pub old_value: Value,
    /// Value after the write.
    #[schema(value_type = Object)]
    pub new_value: Value,
}

impl ChangeRecord {
    /// Build a change record.
    pub fn new(field: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            field: field.into(),
            old_value,
            new_value,
        }
    }
}

/// How a tracked field is canonicalized before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Structural JSON equality.
    Plain,
    /// Instant, compared as canonical RFC 3339.
    Date,
    /// Identifier of another entity, compared by string form.
    Reference,
}

/// A field that participates in change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedField {
    /// Wire (camelCase) name.
    pub name: &'static str,
    /// Canonicalization rule.
    pub kind: FieldKind,
}

impl TrackedField {
    /// A structurally compared field.
    pub const fn plain(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Plain,
        }
    }

    /// A date-valued field.
    pub const fn date(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Date,
        }
    }

    /// A reference-valued field.
    pub const fn reference(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Reference,
        }
    }
}

/// An entity whose writes are change-tracked.
pub trait Tracked {
    /// The collection this entity belongs to.
    const KIND: EntityKind;

    /// Tracked fields in declaration order.
    const TRACKED: &'static [TrackedField];

    /// Current JSON value of a tracked field (`Null` when unset).
    fn tracked_value(&self, field: &str) -> Value;
}

/// Resolves a referenced entity id to a human-readable label.
pub trait ReferenceResolver {
    /// Label for `id`, or `None` when it cannot be resolved.
    fn label(&self, id: Uuid) -> Option<String>;
}

/// A resolver that never resolves; references are recorded as raw ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawIds;

impl ReferenceResolver for RawIds {
    fn label(&self, _id: Uuid) -> Option<String> {
        None
    }
}

impl ReferenceResolver for std::collections::HashMap<Uuid, String> {
    fn label(&self, id: Uuid) -> Option<String> {
        self.get(&id).cloned()
    }
}

/// Produces ordered change lists for tracked entities.
pub struct ChangeDetector<'a> {
    resolver: &'a dyn ReferenceResolver,
}

impl<'a> ChangeDetector<'a> {
    /// A detector that labels references through `resolver`.
    pub fn new(resolver: &'a dyn ReferenceResolver) -> Self {
        Self { resolver }
    }

    /// Compare `before` and `after`; one record per differing tracked field,
    /// in declaration order.
    pub fn detect<T: Tracked>(&self, before: &T, after: &T) -> Vec<ChangeRecord> {
        T::TRACKED
            .iter()
            .filter_map(|field| {
                let old = canonicalize(field.kind, before.tracked_value(field.name));
                let new = canonicalize(field.kind, after.tracked_value(field.name));
                if old == new {
                    return None;
                }
                let (old, new) = match field.kind {
                    FieldKind::Reference => (self.present(old), self.present(new)),
                    _ => (old, new),
                };
                Some(ChangeRecord::new(field.name, old, new))
            })
            .collect()
    }

    fn present(&self, reference: Value) -> Value {
        let Value::String(raw) = &reference else {
            return reference;
        };
        match Uuid::parse_str(raw).ok().and_then(|id| self.resolver.label(id)) {
            Some(label) => Value::String(label),
            None => reference,
        }
    }
}

/// Canonical comparison form of one field value.
pub fn canonicalize(kind: FieldKind, value: Value) -> Value {
    match (kind, value) {
        (FieldKind::Date, Value::String(s)) => match temporal::parse_instant(&s) {
            Some(dt) => Value::String(temporal::canonical(&dt)),
            None => Value::String(s),
        },
        (FieldKind::Reference, Value::String(s)) => Value::String(s.trim().to_lowercase()),
        (FieldKind::Reference, Value::Object(map)) => map
            .get("id")
            .and_then(Value::as_str)
            .map(|s| Value::String(s.to_lowercase()))
            .unwrap_or(Value::Null),
        (_, other) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Probe {
        title: Value,
        due: Value,
        owner: Value,
    }

    impl Tracked for Probe {
        const KIND: EntityKind = EntityKind::Task;
        const TRACKED: &'static [TrackedField] = &[
            TrackedField::plain("title"),
            TrackedField::date("due"),
            TrackedField::reference("owner"),
        ];

        fn tracked_value(&self, field: &str) -> Value {
            match field {
                "title" => self.title.clone(),
                "due" => self.due.clone(),
                "owner" => self.owner.clone(),
                _ => Value::Null,
            }
        }
    }

    fn probe(title: &str, due: &str, owner: Value) -> Probe {
        Probe {
            title: json!(title),
            due: json!(due),
            owner,
        }
    }

    #[test]
    fn identical_snapshots_yield_nothing() {
        let a = probe("x", "2025-01-10", Value::Null);
        let b = probe("x", "2025-01-10", Value::Null);
        assert!(ChangeDetector::new(&RawIds).detect(&a, &b).is_empty());
    }

    #[test]
    fn equivalent_dates_are_not_changes() {
        let a = probe("x", "2025-01-10", Value::Null);
        let b = probe("x", "2025-01-10T00:00:00.000Z", Value::Null);
        assert!(ChangeDetector::new(&RawIds).detect(&a, &b).is_empty());
    }

    #[test]
    fn date_change_is_recorded_canonically() {
        let a = probe("x", "2025-01-10", Value::Null);
        let b = probe("x", "2025-01-11", Value::Null);
        let changes = ChangeDetector::new(&RawIds).detect(&a, &b);
        assert_eq!(
            changes,
            vec![ChangeRecord::new(
                "due",
                json!("2025-01-10T00:00:00.000Z"),
                json!("2025-01-11T00:00:00.000Z")
            )]
        );
    }

    #[test]
    fn references_compare_case_insensitively_and_resolve_labels() {
        let id = Uuid::new_v4();
        let a = probe("x", "2025-01-10", json!(id.to_string().to_uppercase()));
        let b = probe("x", "2025-01-10", json!(id.to_string()));
        let labels = std::collections::HashMap::from([(id, "Acme Pty".to_string())]);
        let detector = ChangeDetector::new(&labels);
        assert!(detector.detect(&a, &b).is_empty());

        let c = probe("x", "2025-01-10", Value::Null);
        let changes = detector.detect(&c, &b);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value, Value::Null);
        assert_eq!(changes[0].new_value, json!("Acme Pty"));
    }

    #[test]
    fn unresolvable_reference_falls_back_to_raw_id() {
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        let a = probe("x", "2025-01-10", json!(old.to_string()));
        let b = probe("x", "2025-01-10", json!(new.to_string()));
        let changes = ChangeDetector::new(&RawIds).detect(&a, &b);
        assert_eq!(changes[0].old_value, json!(old.to_string()));
        assert_eq!(changes[0].new_value, json!(new.to_string()));
    }

    #[test]
    fn changes_follow_declaration_order() {
        let a = probe("x", "2025-01-10", Value::Null);
        let b = probe("y", "2025-02-10", json!(Uuid::new_v4().to_string()));
        let fields: Vec<_> = ChangeDetector::new(&RawIds)
            .detect(&a, &b)
            .into_iter()
            .map(|c| c.field)
            .collect();
        assert_eq!(fields, vec!["title", "due", "owner"]);
    }
}

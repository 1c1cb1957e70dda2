//! Registered actors, and the lookups business logic needs from the stores:
//! assignee email by display name and contact labels for change records.

use chrono::{DateTime, Utc};
use crm_core::{ActorId, ActorRef, AssigneeDirectory, Contact, ReferenceResolver};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::Store;

/// A registered actor.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Lowercased, unique.
    pub email: String,
    pub password_hash: String,
    /// SHA-256 hex of the outstanding reset token.
    #[serde(default)]
    pub reset_token_hash: Option<String>,
    #[serde(default)]
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl User {
    /// The actor as seen by business logic.
    pub fn actor(&self) -> ActorRef {
        ActorRef {
            id: Some(ActorId::from_uuid(self.id)),
            name: Some(self.name.clone()),
        }
    }
}

/// Public projection of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        }
    }
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Store<User> {
    /// Look up a user by email, case-insensitively.
    pub fn by_email(&self, email: &str) -> Option<User> {
        let wanted = normalize_email(email);
        self.find(|u| u.email == wanted)
    }

    /// Every user as a dropdown entry, sorted by name.
    pub fn views(&self) -> Vec<UserView> {
        let mut views: Vec<UserView> = self.list().iter().map(UserView::from).collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }
}

impl AssigneeDirectory for Store<User> {
    fn email_for(&self, assignee_name: &str) -> Option<String> {
        self.find(|u| u.name == assignee_name).map(|u| u.email)
    }
}

impl ReferenceResolver for Store<Contact> {
    fn label(&self, id: Uuid) -> Option<String> {
        self.get(&id).map(|c| c.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: normalize_email(email),
            password_hash: "$argon2id$v=19$stub".into(),
            reset_token_hash: None,
            reset_token_expiry: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn assignee_lookup_is_by_exact_name() {
        let users = Store::new();
        let u = user("Dana Scully", "Dana@Example.com");
        users.insert(u.id, u);
        assert_eq!(users.email_for("Dana Scully").as_deref(), Some("dana@example.com"));
        assert!(users.email_for("dana scully").is_none());
    }

    #[test]
    fn email_lookup_ignores_case() {
        let users = Store::new();
        let u = user("Fox", "fox@example.com");
        let id = u.id;
        users.insert(id, u);
        assert_eq!(users.by_email("  FOX@example.com ").map(|u| u.id), Some(id));
    }

    #[test]
    fn debug_hides_password_hash() {
        let rendered = format!("{:?}", user("Walter", "w@example.com"));
        assert!(!rendered.contains("argon2"));
    }
}

//! # Identity Newtypes
//!
//! [`ActorId`] identifies the authenticated identity performing a write. It
//! is a distinct type so an actor can never be confused with an entity id.
//! [`EntityKind`] names the four business collections.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Display name recorded for writes that carry no actor name.
pub const SYSTEM_ACTOR_NAME: &str = "System User";

/// A unique identifier for an actor (registered user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Create a new random actor identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an actor identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ActorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// The actor performing a write, as seen by business logic.
///
/// `id` is `None` when the request carried no identity and no fallback
/// actor was configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRef {
    /// The actor's identifier, if known.
    pub id: Option<ActorId>,
    /// The actor's display name, if known.
    pub name: Option<String>,
}

impl ActorRef {
    /// An actor with neither id nor name.
    pub fn anonymous() -> Self {
        Self { id: None, name: None }
    }

    /// Name to record in audit entries.
    pub fn audit_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(SYSTEM_ACTOR_NAME)
    }
}

/// The four business entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Companies and their contact persons.
    Contact,
    /// Sales opportunities.
    Lead,
    /// Assignable work items.
    Task,
    /// Billable quotes and their payment progress.
    Chargeable,
}

impl EntityKind {
    /// Return the lowercase singular name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Lead => "lead",
            Self::Task => "task",
            Self::Chargeable => "chargeable",
        }
    }

    /// Capitalized label used in synthetic audit messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Contact => "Contact",
            Self::Lead => "Lead",
            Self::Task => "Task",
            Self::Chargeable => "Chargeable",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

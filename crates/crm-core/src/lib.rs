//! # crm-core: Domain Model for the CRM Backend
//!
//! Entities (contacts, leads, tasks, chargeables), their write-time
//! validation, field-level change detection, audit records, and the
//! reminder and notification rules. Nothing in this crate performs I/O;
//! storage, HTTP and email live in `crm-api` and `crm-blob`.
//!
//! ## Key Design Principles
//!
//! 1. **All field errors at once.** Every create and update runs through a
//!    [`Validator`] that collects every failing field into one
//!    [`ValidationErrors`].
//!
//! 2. **Change detection is declarative.** Each entity declares its tracked
//!    fields once ([`Tracked::TRACKED`]); the [`ChangeDetector`] canonicalizes
//!    dates and references before comparing.
//!
//! 3. **Actors are optional.** Every write path takes an `Option<ActorId>`;
//!    an unknown actor is recorded as `System User`.
//!
//! 4. **Reminders are derived, not entered.** A task write yields a
//!    [`ReminderDirective`]; [`reconcile`] turns it into an upsert, a delete
//!    or nothing.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `crm-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

#![deny(missing_docs)]

pub mod attachment;
pub mod audit;
pub mod chargeable;
pub mod change;
pub mod choice;
pub mod contact;
pub mod error;
pub mod identity;
pub mod lead;
pub mod money;
pub mod notification;
pub mod reminder;
pub mod task;
pub mod temporal;
pub mod validate;

// Re-export primary types for ergonomic imports.
pub use attachment::{Attachable, Attachment, UploadCandidate, UploadPolicy};
pub use audit::{AuditAction, AuditEntry, AuditPage, AuditQuery, Pagination};
pub use chargeable::{Chargeable, ChargeableInput, CustomerOption};
pub use change::{ChangeDetector, ChangeRecord, RawIds, ReferenceResolver, Tracked};
pub use choice::{Choice, Priority, YesNoPending};
pub use contact::{Contact, ContactInput, ContactView};
pub use error::{DueTimeError, FieldError, ValidationErrors};
pub use identity::{ActorId, ActorRef, EntityKind, SYSTEM_ACTOR_NAME};
pub use lead::{Lead, LeadContactInfo, LeadInput, LeadStage, LeadView, StageSummary};
pub use money::CurrencyCode;
pub use notification::Notification;
pub use reminder::{
    reconcile, AssigneeDirectory, AssigneeMatcher, ExactName, Reminder, ReminderDirective,
    ReminderOutcome, ReminderStatus,
};
pub use task::{Task, TaskInput, TaskStatus};
pub use validate::{AmountInput, Mode, Validator};

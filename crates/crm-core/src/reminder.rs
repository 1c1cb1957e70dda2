//! # Reminders
//!
//! At most one reminder exists per task (`taskId` is the uniqueness key).
//! Its due instant is derived from the task write's `reminderDate` and
//! `reminderTime`, both read as UTC.
//!
//! ## State machine
//!
//! ```text
//!   pending ──(client acknowledgement)──▶ sent
//!   sent ──(edit moves the due instant into the future)──▶ pending
//!   any ──(task deleted, or reminder fields cleared)──▶ (deleted)
//! ```
//!
//! Nothing here moves a reminder to `sent` on its own; the periodic scan
//! only reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::choice::choice_enum;
use crate::error::DueTimeError;
use crate::identity::ActorId;
use crate::task::Task;
use crate::temporal;

choice_enum! {
    /// Delivery state of a reminder.
    pub enum ReminderStatus (default Pending) {
        /// Waiting for acknowledgement.
        Pending => "pending",
        /// Acknowledged by a client.
        Sent => "sent",
        /// Withdrawn.
        Cancelled => "cancelled",
    }
}

/// A stored reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// Identifier.
    pub id: Uuid,
    /// Owning task (unique).
    pub task_id: Uuid,
    /// Task title at the last write.
    pub task_name: String,
    /// Task description at the last write.
    #[serde(default)]
    pub description: String,
    /// Assignee display name.
    pub assignee_name: String,
    /// Assignee email, empty when unknown.
    #[serde(default)]
    pub assignee_email: String,
    /// Task due date.
    pub due_date: DateTime<Utc>,
    /// Reminder calendar date.
    pub reminder_date: NaiveDate,
    /// Reminder wall-clock time as entered.
    pub reminder_time: String,
    /// Due instant.
    pub reminder_date_time: DateTime<Utc>,
    /// Delivery state.
    pub status: ReminderStatus,
    /// Actor that wrote the task.
    pub owner_id: Option<ActorId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A validated reminder schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSchedule {
    /// Calendar date.
    pub date: NaiveDate,
    /// Wall-clock time as entered (trimmed).
    pub time: String,
    /// Due instant in UTC.
    pub at: DateTime<Utc>,
}

/// Combine a `YYYY-MM-DD` date and an `HH:MM[:SS]` time into a UTC instant.
pub fn derive_due_time(date: &str, time: &str) -> Result<ReminderSchedule, DueTimeError> {
    let day = temporal::parse_calendar_date(date)
        .ok_or_else(|| DueTimeError::InvalidDate(date.to_string()))?;
    let clock = temporal::parse_wall_clock(time)
        .ok_or_else(|| DueTimeError::InvalidTime(time.to_string()))?;
    Ok(ReminderSchedule {
        date: day,
        time: time.trim().to_string(),
        at: day.and_time(clock).and_utc(),
    })
}

/// What a task write asks of the task's reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderDirective {
    /// Both fields filled: create or overwrite the reminder.
    Upsert {
        /// Raw `reminderDate`.
        date: String,
        /// Raw `reminderTime`.
        time: String,
    },
    /// At least one key present but not both filled: remove the reminder.
    Delete,
    /// Neither key present: leave the reminder alone.
    Leave,
}

impl ReminderDirective {
    /// Classify the tri-state reminder fields of a task write.
    pub fn from_fields(date: Option<&Option<String>>, time: Option<&Option<String>>) -> Self {
        fn filled(field: Option<&Option<String>>) -> Option<&str> {
            field
                .and_then(Option::as_deref)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        }
        match (filled(date), filled(time)) {
            (Some(d), Some(t)) => Self::Upsert {
                date: d.to_string(),
                time: t.to_string(),
            },
            _ if date.is_some() || time.is_some() => Self::Delete,
            _ => Self::Leave,
        }
    }
}

/// Resolves an assignee's display name to an email address.
pub trait AssigneeDirectory {
    /// Email for the actor with this display name, if any.
    fn email_for(&self, assignee_name: &str) -> Option<String>;
}

/// Decides whether a reminder belongs to an actor.
pub trait AssigneeMatcher {
    /// Whether `reminder` is assigned to the actor named `actor_name`.
    fn matches(&self, reminder: &Reminder, actor_name: &str) -> bool;
}

/// Exact display-name equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactName;

impl AssigneeMatcher for ExactName {
    fn matches(&self, reminder: &Reminder, actor_name: &str) -> bool {
        reminder.assignee_name == actor_name
    }
}

impl Reminder {
    /// A fresh pending reminder for `task`.
    pub fn new(
        task: &Task,
        schedule: ReminderSchedule,
        assignee_email: String,
        owner_id: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task.id,
            task_name: task.title.clone(),
            description: task.description.clone(),
            assignee_name: task.assigned_to.clone(),
            assignee_email,
            due_date: task.due_date,
            reminder_date: schedule.date,
            reminder_time: schedule.time,
            reminder_date_time: schedule.at,
            status: ReminderStatus::Pending,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite every mutable field from `task` and `schedule`. A sent
    /// reminder whose new due instant lies in the future becomes pending.
    pub fn reschedule(
        &mut self,
        task: &Task,
        schedule: ReminderSchedule,
        assignee_email: String,
        now: DateTime<Utc>,
    ) {
        self.task_name = task.title.clone();
        self.description = task.description.clone();
        self.assignee_name = task.assigned_to.clone();
        self.assignee_email = assignee_email;
        self.due_date = task.due_date;
        self.reminder_date = schedule.date;
        self.reminder_time = schedule.time;
        self.reminder_date_time = schedule.at;
        if self.status == ReminderStatus::Sent && schedule.at > now {
            self.status = ReminderStatus::Pending;
        }
        self.updated_at = now;
    }

    /// Mark as acknowledged. Idempotent.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.status = ReminderStatus::Sent;
        self.updated_at = now;
    }

    /// Whether this reminder is pending and due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && self.reminder_date_time <= now
    }
}

/// Result of reconciling a task write with the task's reminder.
#[derive(Debug, Clone, PartialEq)]
pub enum ReminderOutcome {
    /// Store this reminder (new or rescheduled).
    Upserted(Reminder),
    /// Remove the reminder with this id.
    Deleted(Uuid),
    /// Nothing to do.
    Unchanged,
    /// The reminder fields did not form a valid instant; the task write
    /// still stands and the reminder is left as it was.
    Skipped(DueTimeError),
}

/// Apply a task write's reminder directive to the task's current reminder.
pub fn reconcile(
    directive: &ReminderDirective,
    task: &Task,
    existing: Option<&Reminder>,
    directory: &dyn AssigneeDirectory,
    owner_id: Option<ActorId>,
    now: DateTime<Utc>,
) -> ReminderOutcome {
    match directive {
        ReminderDirective::Leave => ReminderOutcome::Unchanged,
        ReminderDirective::Delete => match existing {
            Some(r) => ReminderOutcome::Deleted(r.id),
            None => ReminderOutcome::Unchanged,
        },
        ReminderDirective::Upsert { date, time } => {
            let schedule = match derive_due_time(date, time) {
                Ok(s) => s,
                Err(e) => return ReminderOutcome::Skipped(e),
            };
            let email = directory.email_for(&task.assigned_to).unwrap_or_default();
            match existing {
                Some(current) => {
                    let mut next = current.clone();
                    next.reschedule(task, schedule, email, now);
                    ReminderOutcome::Upserted(next)
                }
                None => ReminderOutcome::Upserted(Reminder::new(task, schedule, email, owner_id, now)),
            }
        }
    }
}

/// Pending reminders due at `now`, earliest first.
pub fn due_reminders<'a>(
    reminders: impl IntoIterator<Item = &'a Reminder>,
    now: DateTime<Utc>,
) -> Vec<Reminder> {
    let mut due: Vec<Reminder> = reminders
        .into_iter()
        .filter(|r| r.is_due(now))
        .cloned()
        .collect();
    due.sort_by_key(|r| r.reminder_date_time);
    due
}

/// Every reminder, earliest first.
pub fn by_due_time<'a>(reminders: impl IntoIterator<Item = &'a Reminder>) -> Vec<Reminder> {
    let mut all: Vec<Reminder> = reminders.into_iter().cloned().collect();
    all.sort_by_key(|r| r.reminder_date_time);
    all
}

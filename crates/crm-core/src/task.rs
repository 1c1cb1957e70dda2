//! # Tasks
//!
//! Assignable work items. `assignedTo` holds an actor's display name, not
//! an id. The reminder fields of [`TaskInput`] are never stored on the task;
//! they drive the reminder engine through [`TaskInput::reminder_directive`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::attachment::{Attachable, Attachment};
use crate::change::{Tracked, TrackedField};
use crate::choice::{choice_enum, Choice, Priority};
use crate::error::ValidationErrors;
use crate::identity::{ActorId, EntityKind};
use crate::reminder::ReminderDirective;
use crate::temporal;
use crate::validate::{double_option, trimmed, Mode, Validator};

choice_enum! {
    /// Progress of a task.
    pub enum TaskStatus (default NotStarted) {
        /// Not yet begun.
        NotStarted => "Not Started",
        /// Being worked on.
        InProgress => "In Progress",
        /// Done.
        Completed => "Completed",
    }
}

/// A stored task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Identifier.
    pub id: Uuid,
    /// Title (required).
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Assignee display name (required).
    pub assigned_to: String,
    /// Progress.
    pub status: TaskStatus,
    /// Priority.
    pub priority: Priority,
    /// Due date (required).
    pub due_date: DateTime<Utc>,
    /// Related company or record, free text.
    #[serde(default)]
    pub related_to: String,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Actor that created the task.
    pub owner_id: Option<ActorId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Create/update body for tasks.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskInput {
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Assignee display name.
    pub assigned_to: Option<String>,
    /// Status label.
    pub status: Option<String>,
    /// Priority label.
    pub priority: Option<String>,
    /// Due date.
    pub due_date: Option<String>,
    /// Related record.
    pub related_to: Option<String>,
    /// Reminder date, `YYYY-MM-DD`. `null` or `""` clears the reminder.
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub reminder_date: Option<Option<String>>,
    /// Reminder time, `HH:MM` or `HH:MM:SS`. `null` or `""` clears the reminder.
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub reminder_time: Option<Option<String>>,
}

impl TaskInput {
    /// What this write asks of the task's reminder.
    pub fn reminder_directive(&self) -> ReminderDirective {
        ReminderDirective::from_fields(self.reminder_date.as_ref(), self.reminder_time.as_ref())
    }
}

impl Task {
    /// Validate `input` and build a new task.
    pub fn create(
        input: &TaskInput,
        owner_id: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut task = Self {
            id: Uuid::new_v4(),
            title: String::new(),
            description: String::new(),
            assigned_to: String::new(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            due_date: now,
            related_to: String::new(),
            attachments: Vec::new(),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        let mut v = Validator::new(Mode::Create);
        task.apply(input, &mut v);
        v.finish()?;
        Ok(task)
    }

    /// Validate a partial update and return the patched task.
    pub fn patched(&self, input: &TaskInput, now: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        let mut next = self.clone();
        let mut v = Validator::new(Mode::Update);
        next.apply(input, &mut v);
        v.finish()?;
        next.updated_at = now;
        Ok(next)
    }

    fn apply(&mut self, input: &TaskInput, v: &mut Validator) {
        if let Some(title) = v.required_text("title", input.title.as_deref()) {
            self.title = title;
        }
        if let Some(description) = trimmed(input.description.as_deref()) {
            self.description = description;
        }
        if let Some(assignee) = v.required_text("assignedTo", input.assigned_to.as_deref()) {
            self.assigned_to = assignee;
        }
        if let Some(status) = v.choice::<TaskStatus>("status", input.status.as_deref()) {
            self.status = status;
        }
        if let Some(priority) = v.choice::<Priority>("priority", input.priority.as_deref()) {
            self.priority = priority;
        }
        if let Some(due) = v.date("dueDate", input.due_date.as_deref(), true) {
            self.due_date = due;
        }
        if let Some(related) = trimmed(input.related_to.as_deref()) {
            self.related_to = related;
        }
    }
}

impl Tracked for Task {
    const KIND: EntityKind = EntityKind::Task;
    const TRACKED: &'static [TrackedField] = &[
        TrackedField::plain("title"),
        TrackedField::plain("description"),
        TrackedField::plain("assignedTo"),
        TrackedField::plain("status"),
        TrackedField::plain("priority"),
        TrackedField::date("dueDate"),
        TrackedField::plain("relatedTo"),
    ];

    fn tracked_value(&self, field: &str) -> Value {
        match field {
            "title" => Value::from(self.title.as_str()),
            "description" => Value::from(self.description.as_str()),
            "assignedTo" => Value::from(self.assigned_to.as_str()),
            "status" => Value::from(self.status.label()),
            "priority" => Value::from(self.priority.label()),
            "dueDate" => Value::from(temporal::canonical(&self.due_date)),
            "relatedTo" => Value::from(self.related_to.as_str()),
            _ => Value::Null,
        }
    }
}

impl Attachable for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    fn attachments_mut(&mut self) -> &mut Vec<Attachment> {
        &mut self.attachments
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

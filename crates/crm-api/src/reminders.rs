//! # Reminder Engine
//!
//! Keeps each task's reminder in step with the task's writes, serves the
//! reminder listings, and runs the periodic due-reminder scan.
//!
//! The reconcile decision itself lives in `crm_core::reconcile`; this module
//! runs it under the reminder store's write lock so the per-task uniqueness
//! holds under concurrent task writes, then writes the result through.

use chrono::{DateTime, Utc};
use crm_core::reminder::{by_due_time, due_reminders};
use crm_core::{reconcile, ActorId, Reminder, ReminderDirective, ReminderOutcome, Task};
use uuid::Uuid;

use crate::error::AppError;
use crate::mailer::{reminder_email, Mailer};
use crate::state::{AppState, Store};

/// Apply a task write's reminder directive.
///
/// The task write has already succeeded; failures here are logged and never
/// undo it. A task deleted in the meantime gets no reminder: its deletion
/// has already swept the reminder store, so nothing would remove one
/// written now.
pub async fn sync_with_task(
    state: &AppState,
    directive: &ReminderDirective,
    task: &Task,
    owner_id: Option<ActorId>,
) -> ReminderOutcome {
    let now = Utc::now();
    let outcome = state.reminders.with_all(|all| {
        if !state.tasks.contains(&task.id) {
            return None;
        }
        let existing = all.values().find(|r| r.task_id == task.id);
        let outcome = reconcile(directive, task, existing, &state.users, owner_id, now);
        match &outcome {
            ReminderOutcome::Upserted(reminder) => {
                all.insert(reminder.id, reminder.clone());
            }
            ReminderOutcome::Deleted(id) => {
                all.remove(id);
            }
            ReminderOutcome::Unchanged | ReminderOutcome::Skipped(_) => {}
        }
        Some(outcome)
    });
    let Some(outcome) = outcome else {
        tracing::info!(task_id = %task.id, "task deleted, reminder not scheduled");
        return ReminderOutcome::Unchanged;
    };

    match &outcome {
        ReminderOutcome::Upserted(reminder) => {
            tracing::info!(
                task_id = %task.id,
                reminder_id = %reminder.id,
                due = %reminder.reminder_date_time,
                "reminder scheduled"
            );
            if let Err(e) = state.save(reminder).await {
                tracing::error!(task_id = %task.id, error = %e, "reminder not persisted");
            }
        }
        ReminderOutcome::Deleted(id) => {
            tracing::info!(task_id = %task.id, reminder_id = %id, "reminder removed");
            if let Err(e) = state.purge::<Reminder>(*id).await {
                tracing::error!(task_id = %task.id, error = %e, "reminder deletion not persisted");
            }
        }
        ReminderOutcome::Skipped(reason) => {
            tracing::warn!(task_id = %task.id, %reason, "reminder skipped");
        }
        ReminderOutcome::Unchanged => {}
    }
    outcome
}

/// Remove the reminder of a deleted task, if any.
pub async fn remove_for_task(state: &AppState, task_id: Uuid) -> Option<Reminder> {
    let removed = state.reminders.with_all(|all| {
        let id = all.values().find(|r| r.task_id == task_id).map(|r| r.id)?;
        all.remove(&id)
    })?;
    if let Err(e) = state.purge::<Reminder>(removed.id).await {
        tracing::error!(task_id = %task_id, error = %e, "reminder deletion not persisted");
    }
    Some(removed)
}

/// Every reminder, earliest first.
pub fn all(reminders: &Store<Reminder>) -> Vec<Reminder> {
    by_due_time(reminders.list().iter())
}

/// Pending reminders due at `now`, earliest first.
pub fn due(reminders: &Store<Reminder>, now: DateTime<Utc>) -> Vec<Reminder> {
    due_reminders(reminders.list().iter(), now)
}

/// Mark a reminder as sent, whatever its assignee.
pub async fn acknowledge(state: &AppState, reminder_id: Uuid) -> Result<Reminder, AppError> {
    let now = Utc::now();
    let reminder = state
        .reminders
        .try_update(&reminder_id, |r| -> Result<Reminder, AppError> {
            r.mark_sent(now);
            Ok(r.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("reminder {reminder_id} not found")))??;
    state.save(&reminder).await?;
    Ok(reminder)
}

/// Outcome of one scan run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub due: usize,
    pub emailed: usize,
    pub without_email: usize,
    pub failed: usize,
}

/// Email every due reminder that has an assignee email.
///
/// Read-only: statuses change only on acknowledgement. A failed send is
/// logged and the scan moves on.
pub async fn process_due(
    reminders: &Store<Reminder>,
    mailer: &dyn Mailer,
    now: DateTime<Utc>,
) -> ScanReport {
    let due = due(reminders, now);
    let mut report = ScanReport {
        due: due.len(),
        ..ScanReport::default()
    };
    tracing::info!(due = report.due, at = %now, "checked for due reminders");

    for reminder in &due {
        if reminder.assignee_email.trim().is_empty() {
            tracing::info!(
                reminder_id = %reminder.id,
                assignee = %reminder.assignee_name,
                "no email for assignee, skipping notification"
            );
            report.without_email += 1;
            continue;
        }
        match mailer.send(reminder_email(reminder)).await {
            Ok(()) => {
                tracing::info!(reminder_id = %reminder.id, to = %reminder.assignee_email, "reminder email sent");
                report.emailed += 1;
            }
            Err(e) => {
                tracing::error!(reminder_id = %reminder.id, error = %e, "reminder email failed");
                report.failed += 1;
            }
        }
    }
    report
}

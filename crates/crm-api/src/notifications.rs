//! Actor-scoped view of due reminders.

use chrono::Utc;
use crm_core::notification::{pending_for as due_for_actor, PROCESSED_MESSAGE};
use crm_core::Notification;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

/// Due reminders assigned to the caller, as notifications.
pub fn pending_for(state: &AppState, caller: &CallerIdentity) -> Result<Vec<Notification>, AppError> {
    let name = caller.require_name()?;
    let reminders = state.reminders.list();
    Ok(due_for_actor(reminders.iter(), name, state.matcher.as_ref(), Utc::now()))
}

/// Mark the caller's reminder as sent.
///
/// A reminder assigned to someone else is reported as missing and left
/// untouched. The ownership check and the status change happen under one
/// write lock.
pub async fn acknowledge(
    state: &AppState,
    caller: &CallerIdentity,
    reminder_id: Uuid,
) -> Result<&'static str, AppError> {
    let name = caller.require_name()?;
    let not_found = || AppError::NotFound(format!("notification for reminder {reminder_id} not found"));
    let now = Utc::now();

    let reminder = state
        .reminders
        .try_update(&reminder_id, |r| {
            if state.matcher.matches(r, name) {
                r.mark_sent(now);
                Ok(r.clone())
            } else {
                Err(not_found())
            }
        })
        .ok_or_else(not_found)??;

    state.save(&reminder).await?;
    tracing::info!(reminder_id = %reminder_id, actor = name, "notification processed");
    Ok(PROCESSED_MESSAGE)
}

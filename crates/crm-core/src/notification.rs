//! Actor-facing notifications derived from due reminders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::reminder::{due_reminders, AssigneeMatcher, Reminder};
use crate::temporal;

/// Response body of a processed acknowledgement.
pub const PROCESSED_MESSAGE: &str = "Notification marked as processed";

/// One due reminder as shown to its assignee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// `reminder-<reminderId>`.
    pub id: String,
    /// `Reminder: <taskName>`.
    pub title: String,
    /// `<description>. Due: <YYYY-MM-DD>.`
    pub message: String,
    /// The reminder's due instant.
    pub timestamp: DateTime<Utc>,
    /// Always `false`; read state is not tracked.
    pub read: bool,
    /// Task the reminder belongs to.
    pub task_id: Uuid,
    /// Underlying reminder.
    pub reminder_id: Uuid,
}

impl From<&Reminder> for Notification {
    fn from(r: &Reminder) -> Self {
        Self {
            id: format!("reminder-{}", r.id),
            title: format!("Reminder: {}", r.task_name),
            message: format!("{}. Due: {}.", r.description, temporal::date_only(&r.due_date)),
            timestamp: r.reminder_date_time,
            read: false,
            task_id: r.task_id,
            reminder_id: r.id,
        }
    }
}

/// Due reminders belonging to `actor_name`, as notifications, earliest first.
pub fn pending_for<'a>(
    reminders: impl IntoIterator<Item = &'a Reminder>,
    actor_name: &str,
    matcher: &dyn AssigneeMatcher,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    due_reminders(reminders, now)
        .iter()
        .filter(|r| matcher.matches(r, actor_name))
        .map(Notification::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::{derive_due_time, ExactName, ReminderStatus};
    use crate::task::{Task, TaskInput};
    use chrono::TimeZone;
    use serde_json::json;

    fn reminder(assignee: &str, date: &str, time: &str) -> Reminder {
        let input: TaskInput = serde_json::from_value(json!({
            "title": "Call Acme",
            "description": "Quarterly check-in",
            "assignedTo": assignee,
            "dueDate": "2025-01-15"
        }))
        .unwrap();
        let task = Task::create(&input, None, Utc::now()).unwrap();
        let schedule = derive_due_time(date, time).unwrap();
        Reminder::new(&task, schedule, String::new(), None, Utc::now())
    }

    #[test]
    fn notification_shape() {
        let r = reminder("Priya Shah", "2025-01-10", "09:00");
        let n = Notification::from(&r);
        assert_eq!(n.id, format!("reminder-{}", r.id));
        assert_eq!(n.title, "Reminder: Call Acme");
        assert_eq!(n.message, "Quarterly check-in. Due: 2025-01-15.");
        assert_eq!(n.timestamp, Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap());
        assert!(!n.read);
        assert_eq!(n.reminder_id, r.id);
    }

    #[test]
    fn only_due_reminders_of_the_actor() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let mine_late = reminder("Priya Shah", "2025-01-10", "11:00");
        let mine_early = reminder("Priya Shah", "2025-01-10", "08:00");
        let mine_future = reminder("Priya Shah", "2025-01-11", "08:00");
        let theirs = reminder("Sam Ortiz", "2025-01-10", "08:00");
        let mut acknowledged = reminder("Priya Shah", "2025-01-09", "08:00");
        acknowledged.status = ReminderStatus::Sent;

        let all = vec![mine_late.clone(), theirs, mine_future, acknowledged, mine_early.clone()];
        let notes = pending_for(&all, "Priya Shah", &ExactName, now);
        let ids: Vec<_> = notes.iter().map(|n| n.reminder_id).collect();
        assert_eq!(ids, vec![mine_early.id, mine_late.id]);
    }
}

//! Cron-driven due-reminder scan.
//!
//! One job, registered at construction, runs
//! [`process_due`](crate::reminders::process_due) on the configured cron
//! expression. Each run is bounded by a timeout; a timed-out run is logged
//! and the next tick starts fresh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use crm_core::Reminder;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::mailer::Mailer;
use crate::reminders::process_due;
use crate::state::{AppState, Store};

/// Failures setting up or driving the reminder scan.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("reminder scan is already scheduled")]
    ScanActive,

    #[error("reminder scan is not scheduled")]
    ScanInactive,

    #[error("cron runtime unavailable for the reminder scan: {0}")]
    Runtime(String),

    #[error("reminder scan cron expression `{expression}` rejected: {reason}")]
    Cron { expression: String, reason: String },

    #[error("reminder scan could not be scheduled: {0}")]
    Schedule(String),

    #[error("reminder scan did not shut down cleanly: {0}")]
    Shutdown(String),
}

/// Scan settings.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
    /// Upper bound for a single scan.
    pub job_timeout: Duration,
}

impl ScannerConfig {
    pub fn from_app(state: &AppState) -> Self {
        Self {
            cron_expression: state.config.reminder_cron.clone(),
            job_timeout: Duration::from_secs(state.config.reminder_job_timeout_secs),
        }
    }
}

/// Periodic due-reminder scanner.
pub struct ReminderScanner {
    scheduler: JobScheduler,
    job_id: Uuid,
    running: bool,
}

impl std::fmt::Debug for ReminderScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScanner")
            .field("job_id", &self.job_id)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl ReminderScanner {
    /// Build the scheduler and register the scan job. Nothing runs until
    /// [`start`](Self::start).
    pub async fn new(
        config: ScannerConfig,
        reminders: Store<Reminder>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Runtime(format!("{e:?}")))?;

        let job_timeout = config.job_timeout;
        let expression = config.cron_expression.clone();
        let job = Job::new_async(expression.as_str(), move |_id, _lock| {
            let reminders = reminders.clone();
            let mailer = mailer.clone();
            Box::pin(async move {
                let started = Instant::now();
                let scan = process_due(&reminders, mailer.as_ref(), Utc::now());
                match tokio::time::timeout(job_timeout, scan).await {
                    Ok(report) => tracing::debug!(
                        due = report.due,
                        emailed = report.emailed,
                        without_email = report.without_email,
                        failed = report.failed,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "reminder scan finished"
                    ),
                    Err(_) => tracing::warn!(
                        timeout_secs = job_timeout.as_secs(),
                        "reminder scan timed out"
                    ),
                }
            })
        })
        .map_err(|e| SchedulerError::Cron {
            expression: expression.clone(),
            reason: format!("{e:?}"),
        })?;

        let job_id = scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::Schedule(format!("{e:?}")))?;

        tracing::info!(cron = %config.cron_expression, %job_id, "reminder scan registered");
        Ok(Self {
            scheduler,
            job_id,
            running: false,
        })
    }

    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        if self.running {
            return Err(SchedulerError::ScanActive);
        }
        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::Schedule(format!("{e:?}")))?;
        self.running = true;
        tracing::info!("reminder scanner started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        if !self.running {
            return Err(SchedulerError::ScanInactive);
        }
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::Shutdown(format!("{e:?}")))?;
        self.running = false;
        tracing::info!("reminder scanner stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::LogMailer;

    fn config(cron: &str) -> ScannerConfig {
        ScannerConfig {
            cron_expression: cron.into(),
            job_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn lifecycle() {
        let mut scanner = ReminderScanner::new(config("0 * * * * *"), Store::new(), Arc::new(LogMailer))
            .await
            .unwrap();
        assert!(matches!(scanner.stop().await, Err(SchedulerError::ScanInactive)));
        scanner.start().await.unwrap();
        assert!(scanner.is_running());
        assert!(matches!(scanner.start().await, Err(SchedulerError::ScanActive)));
        scanner.stop().await.unwrap();
        assert!(!scanner.is_running());
    }

    async fn err_message(cron: &str) -> String {
        ReminderScanner::new(config(cron), Store::new(), Arc::new(LogMailer))
            .await
            .unwrap_err()
            .to_string()
    }

    #[tokio::test]
    async fn bad_cron_is_rejected() {
        let err = ReminderScanner::new(config("every minute"), Store::new(), Arc::new(LogMailer))
            .await
            .unwrap_err();
        match err {
            SchedulerError::Cron { expression, .. } => assert_eq!(expression, "every minute"),
            other => panic!("expected cron rejection, got {other}"),
        }
        assert!(err_message("every minute").await.contains("`every minute`"));
    }
}

//! # Outgoing Mail
//!
//! Reminder emails from the periodic scan and password-reset links go
//! through the [`Mailer`] trait. [`SmtpMailer`] delivers over SMTP with
//! `lettre`; [`LogMailer`] is used when no SMTP host is configured and only
//! logs what would have been sent.

use async_trait::async_trait;
use crm_core::Reminder;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use zeroize::Zeroizing;

use crate::config::{parsed, ConfigError};

/// Errors delivering mail.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Mail delivery.
#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// SMTP settings.
///
/// Custom `Debug` redacts the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<Zeroizing<String>>,
    /// STARTTLS on `port` when true, implicit TLS otherwise.
    pub starttls: bool,
    /// `From` header.
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("starttls", &self.starttls)
            .field("from", &self.from)
            .finish()
    }
}

impl SmtpConfig {
    /// Read `SMTP_*` and `MAIL_FROM`. `None` when `SMTP_HOST` is unset.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let host = match std::env::var("SMTP_HOST") {
            Ok(h) if !h.trim().is_empty() => h.trim().to_string(),
            _ => return Ok(None),
        };
        let username = std::env::var("SMTP_USERNAME").ok().filter(|u| !u.is_empty());
        let password = std::env::var("SMTP_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty())
            .map(Zeroizing::new);
        if username.is_some() && password.is_none() {
            return Err(ConfigError::Missing {
                var: "SMTP_PASSWORD",
                because: "SMTP_USERNAME",
            });
        }
        Ok(Some(Self {
            host,
            port: parsed("SMTP_PORT", 587)?,
            username,
            password,
            starttls: parsed("SMTP_STARTTLS", true)?,
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "\"Task Reminder\" <noreply@example.com>".to_string()),
        }))
    }
}

/// SMTP delivery through a pooled async transport.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        };
        let builder = builder.port(config.port);
        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.as_str().to_string()))
            }
            _ => builder,
        };
        Ok(Self {
            transport: builder.build(),
            from: config.from.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mail.to.parse()?)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "SMTP not configured; mail logged only");
        Ok(())
    }
}

/// The reminder email for a due reminder.
pub fn reminder_email(reminder: &Reminder) -> OutgoingMail {
    let description = if reminder.description.trim().is_empty() {
        "N/A".to_string()
    } else {
        escape(&reminder.description)
    };
    OutgoingMail {
        to: reminder.assignee_email.clone(),
        subject: format!("Reminder: {}", reminder.task_name),
        html: format!(
            "<h2>Task Reminder</h2>\n\
             <p><strong>Task:</strong> {}</p>\n\
             <p><strong>Description:</strong> {}</p>\n\
             <p><strong>Due Date:</strong> {}</p>\n\
             <p>Please log in to the system to check task details.</p>",
            escape(&reminder.task_name),
            description,
            crm_core::temporal::date_only(&reminder.due_date),
        ),
    }
}

/// The password-reset email carrying `link`.
pub fn reset_email(to: &str, link: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Password Reset".to_string(),
        html: format!(
            "<p>Reset your password here: <a href=\"{0}\">{0}</a></p>\n\
             <p>This link expires in one hour.</p>",
            escape(link)
        ),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn reminder(description: &str) -> Reminder {
        let at = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        Reminder {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            task_name: "Call <Acme>".into(),
            description: description.into(),
            assignee_name: "Dana".into(),
            assignee_email: "dana@example.com".into(),
            due_date: Utc.with_ymd_and_hms(2025, 1, 12, 0, 0, 0).unwrap(),
            reminder_date: at.date_naive(),
            reminder_time: "09:00".into(),
            reminder_date_time: at,
            status: crm_core::ReminderStatus::Pending,
            owner_id: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn reminder_email_shape() {
        let mail = reminder_email(&reminder(""));
        assert_eq!(mail.to, "dana@example.com");
        assert_eq!(mail.subject, "Reminder: Call <Acme>");
        assert!(mail.html.contains("Call &lt;Acme&gt;"));
        assert!(mail.html.contains("<strong>Description:</strong> N/A"));
        assert!(mail.html.contains("2025-01-12"));
    }

    #[test]
    fn reset_email_contains_link() {
        let mail = reset_email("a@b.c", "http://localhost:3000/reset-password/abc");
        assert_eq!(mail.subject, "Password Reset");
        assert!(mail.html.contains("http://localhost:3000/reset-password/abc"));
    }

    #[test]
    fn smtp_debug_redacts_password() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: Some("mailer".into()),
            password: Some(Zeroizing::new("hunter2".into())),
            starttls: true,
            from: "noreply@example.com".into(),
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        assert!(LogMailer.send(reset_email("x@y.z", "link")).await.is_ok());
    }
}

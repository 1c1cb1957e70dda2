//! # Service Configuration
//!
//! Everything is read from environment variables, optionally seeded from a
//! `.env` file by the binary before [`AppConfig::from_env`] runs.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PORT` | 8080 |
//! | `JWT_SECRET` | unset: authentication disabled |
//! | `JWT_TTL_SECS` | 3600 |
//! | `CRM_FALLBACK_ACTOR_ID` | unset |
//! | `CRM_FALLBACK_ACTOR_NAME` | `System User` |
//! | `FRONTEND_URL` | `http://localhost:3000` |
//! | `REQUEST_TIMEOUT_SECS` | 30 |
//! | `REMINDER_CRON` | `0 * * * * *` |
//! | `REMINDER_SCAN_ENABLED` | true |
//! | `REMINDER_JOB_TIMEOUT_SECS` | 50 |

use crm_core::{ActorId, ActorRef, SYSTEM_ACTOR_NAME};
use zeroize::Zeroizing;

use crate::mailer::SmtpConfig;

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
    /// A variable required by another one is missing.
    #[error("{var} is required when {because} is set")]
    Missing {
        var: &'static str,
        because: &'static str,
    },
}

/// Application configuration.
///
/// Custom `Debug` redacts the JWT secret.
#[derive(Clone)]
pub struct AppConfig {
    /// HTTP port.
    pub port: u16,
    /// HS256 signing secret. `None` disables authentication.
    pub jwt_secret: Option<Zeroizing<String>>,
    /// Lifetime of issued tokens, in seconds.
    pub jwt_ttl_secs: u64,
    /// Identity injected into every request while authentication is disabled.
    pub fallback_actor: ActorRef,
    /// Base URL of the web client, used in password-reset links.
    pub frontend_url: String,
    /// Request-level timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Six-field cron expression of the reminder scan.
    pub reminder_cron: String,
    /// Whether the reminder scan runs in this process.
    pub reminder_scan_enabled: bool,
    /// Upper bound on one scan run, in seconds.
    pub reminder_job_timeout_secs: u64,
    /// SMTP settings. `None` logs outgoing mail instead of sending it.
    pub smtp: Option<SmtpConfig>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("jwt_ttl_secs", &self.jwt_ttl_secs)
            .field("fallback_actor", &self.fallback_actor)
            .field("frontend_url", &self.frontend_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("reminder_cron", &self.reminder_cron)
            .field("reminder_scan_enabled", &self.reminder_scan_enabled)
            .field("reminder_job_timeout_secs", &self.reminder_job_timeout_secs)
            .field("smtp", &self.smtp)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            jwt_secret: None,
            jwt_ttl_secs: 3600,
            fallback_actor: ActorRef {
                id: None,
                name: Some(SYSTEM_ACTOR_NAME.to_string()),
            },
            frontend_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            reminder_cron: "0 * * * * *".to_string(),
            reminder_scan_enabled: true,
            reminder_job_timeout_secs: 50,
            smtp: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let fallback_id = match std::env::var("CRM_FALLBACK_ACTOR_ID") {
            Ok(raw) => Some(raw.parse::<ActorId>().map_err(|_| ConfigError::Invalid {
                var: "CRM_FALLBACK_ACTOR_ID",
                value: raw,
            })?),
            Err(_) => None,
        };
        let fallback_name = std::env::var("CRM_FALLBACK_ACTOR_NAME")
            .ok()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| SYSTEM_ACTOR_NAME.to_string());

        Ok(Self {
            port: parsed("PORT", defaults.port)?,
            jwt_secret: std::env::var("JWT_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(Zeroizing::new),
            jwt_ttl_secs: parsed("JWT_TTL_SECS", defaults.jwt_ttl_secs)?,
            fallback_actor: ActorRef {
                id: fallback_id,
                name: Some(fallback_name),
            },
            frontend_url: std::env::var("FRONTEND_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.frontend_url),
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            reminder_cron: std::env::var("REMINDER_CRON").unwrap_or(defaults.reminder_cron),
            reminder_scan_enabled: parsed("REMINDER_SCAN_ENABLED", defaults.reminder_scan_enabled)?,
            reminder_job_timeout_secs: parsed(
                "REMINDER_JOB_TIMEOUT_SECS",
                defaults.reminder_job_timeout_secs,
            )?,
            smtp: SmtpConfig::from_env()?,
        })
    }

    /// Whether bearer tokens are required.
    pub fn auth_enabled(&self) -> bool {
        self.jwt_secret.is_some()
    }
}

/// Parse an optional variable, falling back to `default` when unset.
pub(crate) fn parsed<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

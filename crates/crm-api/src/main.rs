//! # crm-api: Binary Entry Point
//!
//! Loads `.env`, wires the blob store, mailer and optional Postgres pool,
//! starts the reminder scanner and serves the API (default port 8080).

use std::sync::Arc;

use crm_api::config::AppConfig;
use crm_api::mailer::{LogMailer, Mailer, SmtpMailer};
use crm_api::scheduler::{ReminderScanner, ScannerConfig};
use crm_api::state::AppState;
use crm_blob::{BlobConfig, BlobStore, HttpBlobStore, InMemoryBlobStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is normal outside development.
    let dotenv = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Configuration invalid: {e}");
        e
    })?;
    if !config.auth_enabled() {
        tracing::warn!(
            actor = config.fallback_actor.audit_name(),
            "JWT_SECRET not set, authentication disabled"
        );
    }

    let db_pool = crm_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let blobs: Arc<dyn BlobStore> = match BlobConfig::from_env()? {
        Some(blob_config) => {
            tracing::info!(base_url = %blob_config.base_url, bucket = %blob_config.bucket, "blob store configured");
            Arc::new(HttpBlobStore::new(blob_config)?)
        }
        None => {
            tracing::warn!("BLOB_STORE_URL not set, attachments are kept in memory");
            Arc::new(InMemoryBlobStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP configured");
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, outgoing mail is logged only");
            Arc::new(LogMailer)
        }
    };

    let port = config.port;
    let state = AppState::with_services(config, blobs, mailer, db_pool);

    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let mut scanner = None;
    if state.config.reminder_scan_enabled {
        let mut s = ReminderScanner::new(
            ScannerConfig::from_app(&state),
            state.reminders.clone(),
            state.mailer.clone(),
        )
        .await?;
        s.start().await?;
        scanner = Some(s);
    } else {
        tracing::info!("reminder scan disabled");
    }

    let app = crm_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("CRM API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
            }
        })
        .await?;

    if let Some(mut s) = scanner {
        s.stop().await?;
    }
    Ok(())
}

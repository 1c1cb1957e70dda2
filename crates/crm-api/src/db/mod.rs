//! # Database Persistence Layer
//!
//! Optional Postgres persistence via SQLx. When `DATABASE_URL` is set,
//! every collection is written through to a JSONB document table and the
//! audit log to an append-only table. When absent, the API runs in
//! in-memory-only mode (development and tests).

pub mod audit;
pub mod documents;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    drop_legacy_indexes(&pool).await;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Older deployments keyed users by username. The index is dropped on
/// startup; failure is logged and ignored.
async fn drop_legacy_indexes(pool: &PgPool) {
    match sqlx::query("DROP INDEX IF EXISTS users_username_idx")
        .execute(pool)
        .await
    {
        Ok(_) => tracing::debug!("legacy users_username_idx absent or dropped"),
        Err(e) => tracing::warn!(error = %e, "could not drop legacy index users_username_idx"),
    }
}

//! Append-only audit log table.

use chrono::{DateTime, Utc};
use crm_core::AuditEntry;
use sqlx::PgPool;
use uuid::Uuid;

/// Append one entry.
pub async fn append(pool: &PgPool, entry: &AuditEntry) -> Result<(), sqlx::Error> {
    let changes =
        serde_json::to_value(&entry.changes).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query(
        "INSERT INTO audit_log (id, entity_kind, entity_id, actor_id, actor_name,
         action, changes, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(entry.id)
    .bind(entry.entity_kind.as_str())
    .bind(entry.entity_id)
    .bind(entry.actor_id.map(|a| *a.as_uuid()))
    .bind(&entry.actor_name)
    .bind(entry.action.to_string())
    .bind(&changes)
    .bind(entry.timestamp)
    .execute(pool)
    .await?;
    Ok(())
}

type AuditRow = (
    Uuid,
    String,
    Uuid,
    Option<Uuid>,
    String,
    String,
    serde_json::Value,
    DateTime<Utc>,
);

/// Load the whole log, oldest first.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditEntry>, sqlx::Error> {
    let rows: Vec<AuditRow> = sqlx::query_as(
        "SELECT id, entity_kind, entity_id, actor_id, actor_name, action, changes, recorded_at
         FROM audit_log ORDER BY recorded_at ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, kind, entity_id, actor_id, actor_name, action, changes, at)| {
            let value = serde_json::json!({
                "id": id,
                "entityKind": kind,
                "entityId": entity_id,
                "actorId": actor_id,
                "actorName": actor_name,
                "timestamp": at,
                "action": action,
                "changes": changes,
            });
            serde_json::from_value(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .collect()
}

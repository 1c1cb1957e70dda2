//! JSONB document tables, one per collection.
//!
//! Each row is `(id, document, created_at, updated_at)`; the document is the
//! record's own JSON form, so the in-memory and stored shapes never drift.

use sqlx::PgPool;
use uuid::Uuid;

use crate::state::Document;

/// A persisted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Contacts,
    Leads,
    Tasks,
    Chargeables,
    Reminders,
    Users,
}

impl Collection {
    /// Backing table name.
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Leads => "leads",
            Self::Tasks => "tasks",
            Self::Chargeables => "chargeables",
            Self::Reminders => "reminders",
            Self::Users => "users",
        }
    }
}

/// Insert or replace a document.
pub async fn save<D: Document>(pool: &PgPool, doc: &D) -> Result<(), sqlx::Error> {
    let document = serde_json::to_value(doc).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let sql = format!(
        "INSERT INTO {} (id, document, created_at, updated_at)
         VALUES ($1, $2, NOW(), NOW())
         ON CONFLICT (id) DO UPDATE SET
            document = EXCLUDED.document,
            updated_at = NOW()",
        D::COLLECTION.table()
    );
    sqlx::query(&sql)
        .bind(doc.document_id())
        .bind(&document)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a document. Deleting an absent id succeeds.
pub async fn delete(pool: &PgPool, collection: Collection, id: Uuid) -> Result<(), sqlx::Error> {
    let sql = format!("DELETE FROM {} WHERE id = $1", collection.table());
    sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(())
}

/// Load every document of a collection, oldest first.
pub async fn load_all<D: Document>(
    pool: &PgPool,
    collection: Collection,
) -> Result<Vec<D>, sqlx::Error> {
    let sql = format!(
        "SELECT document FROM {} ORDER BY created_at ASC",
        collection.table()
    );
    let rows: Vec<serde_json::Value> = sqlx::query_scalar(&sql).fetch_all(pool).await?;
    rows.into_iter()
        .map(|value| serde_json::from_value(value).map_err(|e| sqlx::Error::Decode(Box::new(e))))
        .collect()
}

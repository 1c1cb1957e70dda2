//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The in-memory [`Store`]s are the primary copy of every collection. When a
//! database pool is configured, each write goes through to Postgres after
//! the in-memory mutation and startup hydrates the stores from it. A failed
//! write-through reverts the in-memory mutation (see `entities::revert`).

use std::collections::HashMap;
use std::sync::Arc;

use crm_blob::{BlobStore, InMemoryBlobStore};
use crm_core::{
    Attachable, AssigneeMatcher, Chargeable, Contact, ExactName, Lead, Reminder, Task, Tracked,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditLogWriter, PgAuditSink};
use crate::config::AppConfig;
use crate::db::documents::Collection;
use crate::directory::User;
use crate::error::AppError;
use crate::mailer::{LogMailer, Mailer};

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because the lock is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// First record matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure runs under a single write lock, so no other writer can
    /// interleave between the read and the update.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Run `f` over the whole map under the write lock. Used for operations
    /// that look up by a secondary key and then write.
    pub fn with_all<R>(&self, f: impl FnOnce(&mut HashMap<Uuid, T>) -> R) -> R {
        f(&mut self.data.write())
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Persisted documents -------------------------------------------------------

/// A record kept in one of the [`AppState`] stores and persisted as a JSONB
/// document.
pub trait Document: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Backing collection.
    const COLLECTION: Collection;

    /// Primary key.
    fn document_id(&self) -> Uuid;

    /// The in-memory store holding this type.
    fn store(state: &AppState) -> &Store<Self>;
}

/// A business entity: persisted, audited and able to carry attachments.
pub trait Resource: Document + Attachable + Tracked + PartialEq {
    /// Singular display name used in messages, e.g. `Contact`.
    fn label() -> &'static str {
        <Self as Attachable>::KIND.label()
    }
}

macro_rules! document {
    ($ty:ty, $collection:ident, $field:ident, |$rec:ident| $id:expr) => {
        impl Document for $ty {
            const COLLECTION: Collection = Collection::$collection;

            fn document_id(&self) -> Uuid {
                let $rec = self;
                $id
            }

            fn store(state: &AppState) -> &Store<Self> {
                &state.$field
            }
        }
    };
}

document!(Contact, Contacts, contacts, |r| r.id);
document!(Lead, Leads, leads, |r| r.id);
document!(Task, Tasks, tasks, |r| r.id);
document!(Chargeable, Chargeables, chargeables, |r| r.id);
document!(Reminder, Reminders, reminders, |r| r.id);
document!(User, Users, users, |r| r.id);

impl Resource for Contact {}
impl Resource for Lead {}
impl Resource for Task {}
impl Resource for Chargeable {}

// -- AppState -------------------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each `Store` and service handle.
#[derive(Clone)]
pub struct AppState {
    pub contacts: Store<Contact>,
    pub leads: Store<Lead>,
    pub tasks: Store<Task>,
    pub chargeables: Store<Chargeable>,
    /// Keyed by reminder id; at most one per task.
    pub reminders: Store<Reminder>,
    pub users: Store<User>,

    pub audit: AuditLogWriter,

    // -- External collaborators --
    pub blobs: Arc<dyn BlobStore>,
    pub mailer: Arc<dyn Mailer>,
    pub matcher: Arc<dyn AssigneeMatcher + Send + Sync>,

    /// PostgreSQL pool. `None` runs in-memory only.
    pub db_pool: Option<PgPool>,

    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("contacts", &self.contacts.len())
            .field("leads", &self.leads.len())
            .field("tasks", &self.tasks.len())
            .field("chargeables", &self.chargeables.len())
            .field("reminders", &self.reminders.len())
            .field("users", &self.users.len())
            .field("blobs", &self.blobs)
            .field("mailer", &self.mailer)
            .field("db_pool", &self.db_pool.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state with an in-memory blob store and a log-only mailer.
    pub fn new(config: AppConfig) -> Self {
        Self::with_services(
            config,
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(LogMailer),
            None,
        )
    }

    /// State wired to the given collaborators.
    pub fn with_services(
        config: AppConfig,
        blobs: Arc<dyn BlobStore>,
        mailer: Arc<dyn Mailer>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let audit = match &db_pool {
            Some(pool) => AuditLogWriter::with_sink(Arc::new(PgAuditSink::new(pool.clone()))),
            None => AuditLogWriter::new(),
        };
        Self {
            contacts: Store::new(),
            leads: Store::new(),
            tasks: Store::new(),
            chargeables: Store::new(),
            reminders: Store::new(),
            users: Store::new(),
            audit,
            blobs,
            mailer,
            matcher: Arc::new(ExactName),
            db_pool,
            config,
        }
    }

    /// Write a document through to Postgres, if configured.
    pub async fn save<D: Document>(&self, doc: &D) -> Result<(), AppError> {
        if let Some(pool) = &self.db_pool {
            if let Err(e) = crate::db::documents::save(pool, doc).await {
                tracing::error!(
                    collection = D::COLLECTION.table(),
                    id = %doc.document_id(),
                    error = %e,
                    "failed to persist document"
                );
                return Err(AppError::Internal(format!(
                    "failed to persist {}: {e}",
                    D::COLLECTION.table()
                )));
            }
        }
        Ok(())
    }

    /// Delete a document from Postgres, if configured.
    pub async fn purge<D: Document>(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(pool) = &self.db_pool {
            if let Err(e) = crate::db::documents::delete(pool, D::COLLECTION, id).await {
                tracing::error!(
                    collection = D::COLLECTION.table(),
                    id = %id,
                    error = %e,
                    "failed to delete document"
                );
                return Err(AppError::Internal(format!(
                    "failed to delete from {}: {e}",
                    D::COLLECTION.table()
                )));
            }
        }
        Ok(())
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let contacts = self.hydrate::<Contact>(pool).await?;
        let leads = self.hydrate::<Lead>(pool).await?;
        let tasks = self.hydrate::<Task>(pool).await?;
        let chargeables = self.hydrate::<Chargeable>(pool).await?;
        let reminders = self.hydrate::<Reminder>(pool).await?;
        let users = self.hydrate::<User>(pool).await?;
        let audit_entries = self
            .audit
            .hydrate(pool)
            .await
            .map_err(|e| format!("failed to load audit log: {e}"))?;

        tracing::info!(
            contacts,
            leads,
            tasks,
            chargeables,
            reminders,
            users,
            audit_entries,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }

    async fn hydrate<D: Document>(&self, pool: &PgPool) -> Result<usize, String> {
        let docs: Vec<D> = crate::db::documents::load_all(pool, D::COLLECTION)
            .await
            .map_err(|e| format!("failed to load {}: {e}", D::COLLECTION.table()))?;
        let count = docs.len();
        let store = D::store(self);
        for doc in docs {
            store.insert(doc.document_id(), doc);
        }
        Ok(count)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        n: u32,
    }

    #[test]
    fn insert_get_remove() {
        let store = Store::new();
        let id = Uuid::new_v4();
        assert!(store.insert(id, Counter { n: 1 }).is_none());
        assert_eq!(store.get(&id), Some(Counter { n: 1 }));
        assert!(store.contains(&id));
        assert_eq!(store.remove(&id), Some(Counter { n: 1 }));
        assert!(store.is_empty());
    }

    #[test]
    fn try_update_missing_is_none() {
        let store: Store<Counter> = Store::new();
        let result = store.try_update(&Uuid::new_v4(), |c| -> Result<(), ()> {
            c.n += 1;
            Ok(())
        });
        assert!(result.is_none());
    }

    #[test]
    fn try_update_error_leaves_record() {
        let store = Store::new();
        let id = Uuid::new_v4();
        store.insert(id, Counter { n: 1 });
        let result = store.try_update(&id, |c| {
            if c.n == 1 {
                Err("locked")
            } else {
                c.n += 1;
                Ok(())
            }
        });
        assert_eq!(result, Some(Err("locked")));
        assert_eq!(store.get(&id).unwrap().n, 1);
    }

    #[test]
    fn find_and_filter() {
        let store = Store::new();
        for n in 0..5 {
            store.insert(Uuid::new_v4(), Counter { n });
        }
        assert_eq!(store.filter(|c| c.n % 2 == 0).len(), 3);
        assert_eq!(store.find(|c| c.n == 4).map(|c| c.n), Some(4));
        assert!(store.find(|c| c.n == 9).is_none());
    }

    #[test]
    fn concurrent_try_update_never_loses_writes() {
        let store = Store::new();
        let id = Uuid::new_v4();
        store.insert(id, Counter { n: 0 });
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.try_update(&id, |c| -> Result<(), ()> {
                            c.n += 1;
                            Ok(())
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(&id).unwrap().n, 800);
    }

    #[test]
    fn default_state_is_empty_and_in_memory() {
        let state = AppState::default();
        assert!(state.db_pool.is_none());
        assert!(state.contacts.is_empty());
        assert!(state.reminders.is_empty());
        assert_eq!(<Task as Document>::COLLECTION.table(), "tasks");
        assert_eq!(Contact::label(), "Contact");
    }
}

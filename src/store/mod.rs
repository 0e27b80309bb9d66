use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::{Config, StorageKind};
use crate::models::{
    EntryPatch, Registry, RegistryEntry, StudentPatch, StudentRecord, UserPatch, UserRecord,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Outcome of a storage call that did not succeed.
///
/// Engine specific error encodings stop at the adapters; everything above the
/// storage layer only sees these variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// A unique key would be duplicated. Which key is not reported.
    #[error("unique constraint violated")]
    UniqueViolation,
    /// The backend could not be reached in time.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Reject a second student carrying an already registered RFID code.
    pub enforce_rfid_uniqueness: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            enforce_rfid_uniqueness: true,
        }
    }
}

/// The storage collaborator behind every route.
///
/// Targeted operations are keyed by the business key of each entity
/// (`student_id`, registry `code`, `username`). The `find_and_*` calls read,
/// merge and write as one atomic step.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert_student(&self, record: StudentRecord) -> Result<StudentRecord>;
    async fn find_all_students(&self) -> Result<Vec<StudentRecord>>;
    async fn find_and_update_student(
        &self,
        student_id: &str,
        patch: &StudentPatch,
    ) -> Result<StudentRecord>;
    async fn find_and_delete_student(&self, student_id: &str) -> Result<StudentRecord>;

    async fn insert_entry(&self, registry: Registry, entry: RegistryEntry)
        -> Result<RegistryEntry>;
    async fn find_all_entries(&self, registry: Registry) -> Result<Vec<RegistryEntry>>;
    async fn find_and_update_entry(
        &self,
        registry: Registry,
        code: &str,
        patch: &EntryPatch,
    ) -> Result<RegistryEntry>;
    async fn find_and_delete_entry(&self, registry: Registry, code: &str)
        -> Result<RegistryEntry>;

    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord>;
    async fn find_all_users(&self) -> Result<Vec<UserRecord>>;
    async fn find_and_update_user(&self, username: &str, patch: &UserPatch) -> Result<UserRecord>;
    async fn find_and_delete_user(&self, username: &str) -> Result<UserRecord>;
}

pub type SharedStore = Arc<dyn Storage>;

/// Opens the configured backend. Failing here is fatal to the process: the
/// server must not accept connections without working storage.
pub async fn connect(config: &Config) -> anyhow::Result<SharedStore> {
    let options = config.store_options();
    match config.storage {
        StorageKind::Memory => {
            log::warn!("Using in-memory storage, records are lost on shutdown");
            Ok(Arc::new(MemoryStore::new(options)))
        }
        StorageKind::Postgres => {
            let url = config.database_url()?;
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
                .connect(url)
                .await
                .context("Could not connect to the database")?;
            let store = PgStore::new(pool, options);
            store
                .prepare()
                .await
                .context("Could not prepare database tables")?;
            log::info!("Connected to PostgreSQL");
            Ok(Arc::new(store))
        }
    }
}

pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::model::{BusinessPatch, BusinessRecord, EnrichmentFilter, StorageError, StoredBusiness};

/// What the persister and enricher need from storage.
pub trait BusinessStore: Send {
    /// Identity is case-insensitive on name and location.
    fn exists_by_identity(&self, name: &str, location: &str) -> Result<bool, StorageError>;

    fn insert(&self, record: &BusinessRecord) -> Result<StoredBusiness, StorageError>;

    /// Newest first.
    fn list_needing_enrichment(&self, filter: EnrichmentFilter) -> Result<Vec<StoredBusiness>, StorageError>;

    /// Writes only the fields set in `patch`.
    fn update_fields(&self, id: i64, patch: &BusinessPatch) -> Result<StoredBusiness, StorageError>;
}

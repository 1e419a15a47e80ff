//! Persistence abstraction over API key records.
//!
//! The manager only talks to [`ApiKeyStore`]. Atomicity of bulk operations
//! and key uniqueness are the store's responsibility.

mod memory;
mod sqlite;

pub use memory::{InMemoryApiKeyStore, MemoryStoreError};
pub use sqlite::SqliteApiKeyStore;

use crate::filter::{ApiKeyFilter, ApiKeyPatch, FindOptions};
use crate::record::{ApiKeyRecord, NewApiKey};

/// Generic create/find/update/delete over API key records.
pub trait ApiKeyStore: Send + Sync {
    /// Error surfaced verbatim by the manager.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert a record, assigning its id and timestamps.
    fn create(&self, new: NewApiKey) -> Result<ApiKeyRecord, Self::Error>;

    /// First record matching `filter`.
    fn find_one(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Option<ApiKeyRecord>, Self::Error>;

    fn find_all(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Vec<ApiKeyRecord>, Self::Error>;

    /// Count matching records; `limit`/`offset` are ignored.
    fn get_total(&self, filter: &ApiKeyFilter, options: &FindOptions) -> Result<u64, Self::Error>;

    /// Persist the mutable fields of an existing record. The soft-delete
    /// marker is left as stored and reflected in the returned record.
    fn save(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, Self::Error>;

    /// Set the soft-delete marker. The row stays in the store.
    fn soft_delete(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, Self::Error>;

    /// Physically remove matching records, returning how many went.
    fn delete_many(&self, filter: &ApiKeyFilter, options: &FindOptions)
    -> Result<u64, Self::Error>;

    /// Apply `patch` to every matching record in one atomic step.
    fn update_many(
        &self,
        filter: &ApiKeyFilter,
        patch: &ApiKeyPatch,
        options: &FindOptions,
    ) -> Result<u64, Self::Error>;
}

impl<S: ApiKeyStore + ?Sized> ApiKeyStore for std::sync::Arc<S> {
    type Error = S::Error;

    fn create(&self, new: NewApiKey) -> Result<ApiKeyRecord, Self::Error> {
        (**self).create(new)
    }

    fn find_one(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Option<ApiKeyRecord>, Self::Error> {
        (**self).find_one(filter, options)
    }

    fn find_all(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Vec<ApiKeyRecord>, Self::Error> {
        (**self).find_all(filter, options)
    }

    fn get_total(&self, filter: &ApiKeyFilter, options: &FindOptions) -> Result<u64, Self::Error> {
        (**self).get_total(filter, options)
    }

    fn save(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, Self::Error> {
        (**self).save(record)
    }

    fn soft_delete(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, Self::Error> {
        (**self).soft_delete(record)
    }

    fn delete_many(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<u64, Self::Error> {
        (**self).delete_many(filter, options)
    }

    fn update_many(
        &self,
        filter: &ApiKeyFilter,
        patch: &ApiKeyPatch,
        options: &FindOptions,
    ) -> Result<u64, Self::Error> {
        (**self).update_many(filter, patch, options)
    }
}

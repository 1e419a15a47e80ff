//! In-memory store, mainly for tests and embedding.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use super::ApiKeyStore;
use crate::filter::{ApiKeyFilter, ApiKeyPatch, Direction, FindOptions, SortField};
use crate::record::{ApiKeyRecord, NewApiKey};

/// Errors raised by [`InMemoryApiKeyStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("API key '{0}' not found")]
    NotFound(Uuid),

    #[error("API key '{0}' already exists")]
    DuplicateKey(String),
}

/// Thread-safe map-backed store. Mirrors the unique constraint on `key`.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    records: RwLock<BTreeMap<Uuid, ApiKeyRecord>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows held, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compare(a: &ApiKeyRecord, b: &ApiKeyRecord, order: Option<(SortField, Direction)>) -> Ordering {
    let (field, direction) = order.unwrap_or((SortField::CreatedAt, Direction::Asc));
    let ordering = match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Name => a.name.cmp(&b.name),
        SortField::EndDate => a.end_date.cmp(&b.end_date),
    }
    .then_with(|| a.id.cmp(&b.id));

    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

fn select(
    records: &BTreeMap<Uuid, ApiKeyRecord>,
    filter: &ApiKeyFilter,
    options: &FindOptions,
) -> Vec<ApiKeyRecord> {
    let mut matched: Vec<ApiKeyRecord> = records
        .values()
        .filter(|r| filter.matches(r, options))
        .cloned()
        .collect();
    matched.sort_by(|a, b| compare(a, b, options.order));

    matched
        .into_iter()
        .skip(options.offset.unwrap_or(0))
        .take(options.limit.unwrap_or(usize::MAX))
        .collect()
}

impl ApiKeyStore for InMemoryApiKeyStore {
    type Error = MemoryStoreError;

    fn create(&self, new: NewApiKey) -> Result<ApiKeyRecord, Self::Error> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        // Uniqueness spans soft-deleted rows, like a database index would.
        if records.values().any(|r| r.key == new.key) {
            return Err(MemoryStoreError::DuplicateKey(new.key));
        }

        let record = new.into_record(Uuid::now_v7(), Utc::now());
        records.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_one(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Option<ApiKeyRecord>, Self::Error> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(select(&records, filter, &options.clone().limit(1))
            .into_iter()
            .next())
    }

    fn find_all(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Vec<ApiKeyRecord>, Self::Error> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(select(&records, filter, options))
    }

    fn get_total(&self, filter: &ApiKeyFilter, options: &FindOptions) -> Result<u64, Self::Error> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .values()
            .filter(|r| filter.matches(r, options))
            .count() as u64)
    }

    fn save(&self, mut record: ApiKeyRecord) -> Result<ApiKeyRecord, Self::Error> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        if records
            .values()
            .any(|r| r.id != record.id && r.key == record.key)
        {
            return Err(MemoryStoreError::DuplicateKey(record.key));
        }

        let slot = records
            .get_mut(&record.id)
            .ok_or(MemoryStoreError::NotFound(record.id))?;
        // A stale copy must not clear the soft-delete marker.
        record.created_at = slot.created_at;
        record.deleted = slot.deleted;
        record.deleted_at = slot.deleted_at;
        record.updated_at = Utc::now();
        *slot = record.clone();
        Ok(record)
    }

    fn soft_delete(&self, mut record: ApiKeyRecord) -> Result<ApiKeyRecord, Self::Error> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let slot = records
            .get_mut(&record.id)
            .ok_or(MemoryStoreError::NotFound(record.id))?;

        let now = Utc::now();
        slot.deleted = true;
        slot.deleted_at = Some(now);
        slot.updated_at = now;

        record.deleted = true;
        record.deleted_at = Some(now);
        record.updated_at = now;
        Ok(record)
    }

    fn delete_many(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<u64, Self::Error> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, r| !filter.matches(r, options));
        Ok((before - records.len()) as u64)
    }

    fn update_many(
        &self,
        filter: &ApiKeyFilter,
        patch: &ApiKeyPatch,
        options: &FindOptions,
    ) -> Result<u64, Self::Error> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        let mut updated = 0;

        for record in records.values_mut().filter(|r| filter.matches(r, options)) {
            patch.apply(record);
            record.updated_at = now;
            updated += 1;
        }

        Ok(updated)
    }
}

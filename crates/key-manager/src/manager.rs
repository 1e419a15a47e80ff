//! Issuance, verification and lifecycle of API keys.

use api_key::{
    compute_hash, generate_key, generate_secret, hashes_equal, parse_header, ApiKeyError,
    ApiKeySecret,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::{end_of_day, start_of_day, Clock, SystemClock};
use crate::filter::{ApiKeyFilter, ApiKeyPatch, FindOptions};
use crate::record::{ApiKeyRecord, ApiKeyType, NewApiKey};
use crate::store::ApiKeyStore;

/// Settings fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Deployment environment, used as the public key prefix.
    pub environment: String,
}

impl ManagerConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }
}

/// Input for [`ApiKeyManager::create`].
#[derive(Debug, Clone)]
pub struct CreateApiKey {
    pub name: String,
    pub key_type: ApiKeyType,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Input for [`ApiKeyManager::create_raw`], with caller-chosen credentials.
#[derive(Debug, Clone)]
pub struct CreateRawApiKey {
    pub name: String,
    pub key: String,
    pub secret: ApiKeySecret,
    pub key_type: ApiKeyType,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UpdateApiKey {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct UpdateApiKeyDate {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// A stored record together with its plaintext secret.
///
/// This is the only place the secret is ever surfaced.
#[derive(Debug)]
pub struct ApiKeyCreated {
    pub record: ApiKeyRecord,
    pub secret: ApiKeySecret,
}

/// Why a presented credential was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Malformed(ApiKeyError),
    /// No active, non-deleted record carries this key.
    UnknownKey,
    NotYetValid,
    Expired,
    InvalidSecret,
}

/// Outcome of [`ApiKeyManager::authenticate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Authentication {
    Granted(ApiKeyRecord),
    Denied(DenyReason),
}

impl Authentication {
    pub fn is_granted(&self) -> bool {
        matches!(self, Authentication::Granted(_))
    }
}

/// Day-aligned validity window, assigned only when both bounds are present.
fn normalize_window(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    match (start_date, end_date) {
        (Some(start), Some(end)) => Some((start_of_day(start), end_of_day(end))),
        _ => None,
    }
}

/// Issues and manages API keys on top of an [`ApiKeyStore`].
///
/// Holds no mutable state; every operation is a single call into the store
/// and store errors are returned unchanged.
pub struct ApiKeyManager<S, C = SystemClock> {
    config: ManagerConfig,
    store: S,
    clock: C,
}

impl<S: ApiKeyStore> ApiKeyManager<S, SystemClock> {
    pub fn new(config: ManagerConfig, store: S) -> Self {
        Self::with_clock(config, store, SystemClock)
    }
}

impl<S: ApiKeyStore, C: Clock> ApiKeyManager<S, C> {
    pub fn with_clock(config: ManagerConfig, store: S, clock: C) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    /// `{environment}_` followed by 25 random upper case characters.
    pub fn create_key(&self) -> String {
        generate_key(&self.config.environment)
    }

    /// 35 random upper case characters.
    pub fn create_secret(&self) -> ApiKeySecret {
        generate_secret()
    }

    pub fn create_hash_api_key(&self, key: &str, secret: &str) -> String {
        compute_hash(key, secret)
    }

    /// Constant-time comparison of two precomputed hashes.
    pub fn validate_hash_api_key(&self, candidate_hash: &str, stored_hash: &str) -> bool {
        hashes_equal(candidate_hash, stored_hash)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn find_all(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Vec<ApiKeyRecord>, S::Error> {
        self.store.find_all(filter, options)
    }

    pub fn find_one_by_id(
        &self,
        id: Uuid,
        options: &FindOptions,
    ) -> Result<Option<ApiKeyRecord>, S::Error> {
        self.store.find_one(&ApiKeyFilter::new().id(id), options)
    }

    pub fn find_one(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Option<ApiKeyRecord>, S::Error> {
        self.store.find_one(filter, options)
    }

    pub fn find_one_by_key(
        &self,
        key: &str,
        options: &FindOptions,
    ) -> Result<Option<ApiKeyRecord>, S::Error> {
        self.store.find_one(&ApiKeyFilter::new().key(key), options)
    }

    /// Like [`find_one_by_key`](Self::find_one_by_key) but only matches active keys.
    pub fn find_one_by_active_key(
        &self,
        key: &str,
        options: &FindOptions,
    ) -> Result<Option<ApiKeyRecord>, S::Error> {
        self.store
            .find_one(&ApiKeyFilter::new().key(key).is_active(true), options)
    }

    pub fn get_total(&self, filter: &ApiKeyFilter, options: &FindOptions) -> Result<u64, S::Error> {
        self.store.get_total(filter, options)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a key with generated credentials.
    ///
    /// The validity window is only set when both dates are given; a single
    /// bound is ignored.
    pub fn create(&self, request: CreateApiKey) -> Result<ApiKeyCreated, S::Error> {
        let key = self.create_key();
        let secret = self.create_secret();

        self.insert(
            request.name,
            key,
            secret,
            request.key_type,
            request.start_date,
            request.end_date,
        )
    }

    /// Create a key from caller-supplied credentials, e.g. when seeding.
    pub fn create_raw(&self, request: CreateRawApiKey) -> Result<ApiKeyCreated, S::Error> {
        self.insert(
            request.name,
            request.key,
            request.secret,
            request.key_type,
            request.start_date,
            request.end_date,
        )
    }

    fn insert(
        &self,
        name: String,
        key: String,
        secret: ApiKeySecret,
        key_type: ApiKeyType,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<ApiKeyCreated, S::Error> {
        let hash = self.create_hash_api_key(&key, secret.expose());
        let window = normalize_window(start_date, end_date);

        let record = self.store.create(NewApiKey {
            name,
            key,
            hash,
            key_type,
            is_active: true,
            start_date: window.map(|(start, _)| start),
            end_date: window.map(|(_, end)| end),
        })?;

        log::info!(
            "Created API key id={} name={} type={}",
            record.id,
            record.name,
            record.key_type
        );

        Ok(ApiKeyCreated { record, secret })
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    pub fn active(&self, mut record: ApiKeyRecord) -> Result<ApiKeyRecord, S::Error> {
        record.is_active = true;
        self.store.save(record)
    }

    pub fn inactive(&self, mut record: ApiKeyRecord) -> Result<ApiKeyRecord, S::Error> {
        record.is_active = false;
        self.store.save(record)
    }

    pub fn update(
        &self,
        mut record: ApiKeyRecord,
        request: UpdateApiKey,
    ) -> Result<ApiKeyRecord, S::Error> {
        record.name = request.name;
        self.store.save(record)
    }

    /// Overwrite the validity window. With only one bound given the window is
    /// left as it was and the record is saved unchanged.
    pub fn update_date(
        &self,
        mut record: ApiKeyRecord,
        request: UpdateApiKeyDate,
    ) -> Result<ApiKeyRecord, S::Error> {
        if let Some((start, end)) = normalize_window(request.start_date, request.end_date) {
            record.start_date = Some(start);
            record.end_date = Some(end);
        }
        self.store.save(record)
    }

    /// Rebind the record's key to `secret`. The old secret stops validating.
    pub fn reset(
        &self,
        mut record: ApiKeyRecord,
        secret: &ApiKeySecret,
    ) -> Result<ApiKeyRecord, S::Error> {
        record.hash = self.create_hash_api_key(&record.key, secret.expose());
        let record = self.store.save(record)?;

        log::info!("Reset secret of API key id={}", record.id);
        Ok(record)
    }

    /// Generate a new secret, [`reset`](Self::reset) to it and hand it back once.
    pub fn reset_secret(&self, record: ApiKeyRecord) -> Result<ApiKeyCreated, S::Error> {
        let secret = self.create_secret();
        let record = self.reset(record, &secret)?;
        Ok(ApiKeyCreated { record, secret })
    }

    /// Soft-delete: the row is kept but hidden from default queries.
    pub fn delete(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, S::Error> {
        let record = self.store.soft_delete(record)?;
        log::info!("Deleted API key id={}", record.id);
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Bulk
    // ------------------------------------------------------------------

    /// Hard-delete every matching record.
    pub fn delete_many(&self, filter: &ApiKeyFilter, options: &FindOptions) -> Result<u64, S::Error> {
        let deleted = self.store.delete_many(filter, options)?;
        log::info!("Purged {} API keys", deleted);
        Ok(deleted)
    }

    /// Deactivate every active key whose end date has passed.
    pub fn inactive_many_by_end_date(&self, options: &FindOptions) -> Result<u64, S::Error> {
        let now = self.clock.now();
        let filter = ApiKeyFilter::new().is_active(true).end_date_lte(now);
        let patch = ApiKeyPatch::new().is_active(false);

        let updated = self.store.update_many(&filter, &patch, options)?;
        if updated > 0 {
            log::info!("Deactivated {} expired API keys (now={})", updated, now);
        }
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Request boundary
    // ------------------------------------------------------------------

    /// Check an `x-api-key` header value (`key:secret`).
    ///
    /// The key must belong to an active record whose window contains now, and
    /// `SHA256(key:secret)` must match the stored hash.
    pub fn authenticate(&self, header_value: &str) -> Result<Authentication, S::Error> {
        let parsed = match parse_header(header_value) {
            Ok(parsed) => parsed,
            Err(e) => return Ok(Authentication::Denied(DenyReason::Malformed(e))),
        };

        let Some(record) = self.find_one_by_active_key(&parsed.key, &FindOptions::default())?
        else {
            log::debug!("Rejected unknown or inactive API key");
            return Ok(Authentication::Denied(DenyReason::UnknownKey));
        };

        let now = self.clock.now();
        if !record.is_within_window(now) {
            let reason = if record.start_date.is_some_and(|start| now < start) {
                DenyReason::NotYetValid
            } else {
                DenyReason::Expired
            };
            log::debug!("Rejected API key id={} outside its window: {:?}", record.id, reason);
            return Ok(Authentication::Denied(reason));
        }

        let candidate = self.create_hash_api_key(&parsed.key, parsed.secret().expose());
        if !self.validate_hash_api_key(&candidate, &record.hash) {
            log::debug!("Rejected API key id={} with invalid secret", record.id);
            return Ok(Authentication::Denied(DenyReason::InvalidSecret));
        }

        Ok(Authentication::Granted(record))
    }
}

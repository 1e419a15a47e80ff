//! API key issuance and lifecycle management.
//!
//! [`ApiKeyManager`] creates keys, rotates their secrets, tracks validity
//! windows and soft deletion, and sweeps expired keys. Persistence goes
//! through the [`ApiKeyStore`] trait, with SQLite and in-memory
//! implementations provided.

pub mod clock;
pub mod configuration;
pub mod filter;
pub mod manager;
pub mod record;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, FixedClock, SystemClock};
pub use filter::{ApiKeyFilter, ApiKeyPatch, Direction, FindOptions, SortField};
pub use manager::{
    ApiKeyCreated, ApiKeyManager, Authentication, CreateApiKey, CreateRawApiKey, DenyReason,
    ManagerConfig, UpdateApiKey, UpdateApiKeyDate,
};
pub use record::{ApiKeyRecord, ApiKeyType, NewApiKey};
pub use store::{ApiKeyStore, InMemoryApiKeyStore, MemoryStoreError, SqliteApiKeyStore};
pub use sweeper::ExpirySweeper;

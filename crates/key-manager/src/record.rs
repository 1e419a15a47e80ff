//! API key records as persisted by a store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-supplied classification of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiKeyType {
    Default,
    System,
}

impl ApiKeyType {
    /// Stored/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyType::Default => "DEFAULT",
            ApiKeyType::System => "SYSTEM",
        }
    }
}

impl fmt::Display for ApiKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown key type.
#[derive(Debug, thiserror::Error)]
#[error("Unknown API key type: {0}")]
pub struct UnknownApiKeyType(pub String);

impl FromStr for ApiKeyType {
    type Err = UnknownApiKeyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(ApiKeyType::Default),
            "SYSTEM" => Ok(ApiKeyType::System),
            _ => Err(UnknownApiKeyType(s.to_string())),
        }
    }
}

/// A persisted API key.
///
/// The secret is never part of a record, only `hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub name: String,
    /// Public identifier, `{environment}_{random}`.
    pub key: String,
    /// Lowercase hex SHA-256 of `key:secret`.
    pub hash: String,
    #[serde(rename = "type")]
    pub key_type: ApiKeyType,
    pub is_active: bool,
    /// Day-aligned start of the validity window (00:00:00.000).
    pub start_date: Option<DateTime<Utc>>,
    /// Day-aligned end of the validity window (23:59:59.999).
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Whether `now` falls inside the validity window. Unset bounds are open.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_date.is_none_or(|start| start <= now)
            && self.end_date.is_none_or(|end| now <= end)
    }
}

/// Fields supplied when inserting a record. The store assigns `id`,
/// timestamps and the soft-delete marker.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApiKey {
    pub name: String,
    pub key: String,
    pub hash: String,
    pub key_type: ApiKeyType,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl NewApiKey {
    /// Materialize into a record with store-assigned fields.
    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> ApiKeyRecord {
        ApiKeyRecord {
            id,
            name: self.name,
            key: self.key,
            hash: self.hash,
            key_type: self.key_type,
            is_active: self.is_active,
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: now,
            updated_at: now,
            deleted: false,
            deleted_at: None,
        }
    }
}

//! Typed query predicates and option bags for store operations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::record::{ApiKeyRecord, ApiKeyType};

/// Field matcher over API key records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiKeyFilter {
    pub id: Option<Uuid>,
    pub key: Option<String>,
    pub name_contains: Option<String>,
    pub key_type: Option<ApiKeyType>,
    pub is_active: Option<bool>,
    /// Matches records whose `end_date` is set and `<=` this instant.
    pub end_date_lte: Option<DateTime<Utc>>,
    /// Explicit soft-delete state. Only meaningful together with
    /// [`FindOptions::with_deleted`], since deleted rows are hidden otherwise.
    pub deleted: Option<bool>,
}

impl ApiKeyFilter {
    /// A filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn key_type(mut self, key_type: ApiKeyType) -> Self {
        self.key_type = Some(key_type);
        self
    }

    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn end_date_lte(mut self, at: DateTime<Utc>) -> Self {
        self.end_date_lte = Some(at);
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// Evaluate the filter against a record, honoring the soft-delete
    /// visibility of `options`.
    pub fn matches(&self, record: &ApiKeyRecord, options: &FindOptions) -> bool {
        if record.deleted && !options.with_deleted {
            return false;
        }
        if self.id.is_some_and(|id| id != record.id) {
            return false;
        }
        if self.key.as_ref().is_some_and(|key| *key != record.key) {
            return false;
        }
        if self
            .name_contains
            .as_ref()
            .is_some_and(|fragment| !record.name.contains(fragment.as_str()))
        {
            return false;
        }
        if self.key_type.is_some_and(|t| t != record.key_type) {
            return false;
        }
        if self.is_active.is_some_and(|active| active != record.is_active) {
            return false;
        }
        if let Some(at) = self.end_date_lte {
            match record.end_date {
                Some(end) if end <= at => {}
                _ => return false,
            }
        }
        if self.deleted.is_some_and(|deleted| deleted != record.deleted) {
            return false;
        }
        true
    }
}

/// Partial update applied by bulk operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiKeyPatch {
    pub is_active: Option<bool>,
    pub name: Option<String>,
}

impl ApiKeyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.is_active.is_none() && self.name.is_none()
    }

    /// Apply the patch in place.
    pub fn apply(&self, record: &mut ApiKeyRecord) {
        if let Some(is_active) = self.is_active {
            record.is_active = is_active;
        }
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
    }
}

/// Sortable record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Name,
    EndDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Options shared by store reads and bulk writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Include soft-deleted records.
    pub with_deleted: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Defaults to creation order.
    pub order: Option<(SortField, Direction)>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that also see soft-deleted records.
    pub fn with_deleted() -> Self {
        Self {
            with_deleted: true,
            ..Self::default()
        }
    }

    pub fn include_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, field: SortField, direction: Direction) -> Self {
        self.order = Some((field, direction));
        self
    }
}

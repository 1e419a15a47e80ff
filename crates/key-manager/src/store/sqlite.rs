//! SQLite-backed store.
//!
//! Dates are stored as Unix milliseconds so range filters compare as
//! integers; ids are UUIDv7 blobs.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use super::ApiKeyStore;
use crate::filter::{ApiKeyFilter, ApiKeyPatch, Direction, FindOptions, SortField};
use crate::record::{ApiKeyRecord, ApiKeyType, NewApiKey};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ApiKeys (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL,
    "key" TEXT NOT NULL UNIQUE,
    hash TEXT NOT NULL,
    "type" TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    start_date INTEGER,
    end_date INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted BOOLEAN NOT NULL DEFAULT 0,
    deleted_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_apikeys_active_end_date ON ApiKeys (is_active, end_date);
"#;

const COLUMNS: &str = r#"id, name, "key", hash, "type", is_active, start_date, end_date, created_at, updated_at, deleted, deleted_at"#;

impl ToSql for ApiKeyType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ApiKeyType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Current time at the precision the table stores.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

fn opt_from_millis(idx: usize, millis: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    millis.map(|m| from_millis(idx, m)).transpose()
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    Ok(ApiKeyRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        key: row.get(2)?,
        hash: row.get(3)?,
        key_type: row.get(4)?,
        is_active: row.get(5)?,
        start_date: opt_from_millis(6, row.get(6)?)?,
        end_date: opt_from_millis(7, row.get(7)?)?,
        created_at: from_millis(8, row.get(8)?)?,
        updated_at: from_millis(9, row.get(9)?)?,
        deleted: row.get(10)?,
        deleted_at: opt_from_millis(11, row.get(11)?)?,
    })
}

/// Translate a filter into a `WHERE` clause and its positional parameters.
fn where_clause(filter: &ApiKeyFilter, options: &FindOptions) -> (String, Vec<Value>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if !options.with_deleted {
        conditions.push("deleted = 0");
    }
    if let Some(id) = filter.id {
        conditions.push("id = ?");
        values.push(Value::Blob(id.as_bytes().to_vec()));
    }
    if let Some(key) = &filter.key {
        conditions.push(r#""key" = ?"#);
        values.push(Value::Text(key.clone()));
    }
    if let Some(fragment) = &filter.name_contains {
        conditions.push("instr(name, ?) > 0");
        values.push(Value::Text(fragment.clone()));
    }
    if let Some(key_type) = filter.key_type {
        conditions.push(r#""type" = ?"#);
        values.push(Value::Text(key_type.as_str().to_string()));
    }
    if let Some(is_active) = filter.is_active {
        conditions.push("is_active = ?");
        values.push(Value::Integer(is_active as i64));
    }
    if let Some(at) = filter.end_date_lte {
        conditions.push("end_date IS NOT NULL AND end_date <= ?");
        values.push(Value::Integer(to_millis(at)));
    }
    if let Some(deleted) = filter.deleted {
        conditions.push("deleted = ?");
        values.push(Value::Integer(deleted as i64));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn order_clause(options: &FindOptions) -> String {
    let (field, direction) = options
        .order
        .unwrap_or((SortField::CreatedAt, Direction::Asc));
    let column = match field {
        SortField::CreatedAt => "created_at",
        SortField::Name => "name",
        SortField::EndDate => "end_date",
    };
    let direction = match direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    };
    format!(" ORDER BY {column} {direction}, id {direction}")
}

fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Store persisting records in a single SQLite database file.
pub struct SqliteApiKeyStore {
    conn: Mutex<Connection>,
}

impl SqliteApiKeyStore {
    /// Open (or create) the database at `db_path` and apply the schema.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Vec<ApiKeyRecord>, rusqlite::Error> {
        let (where_sql, mut values) = where_clause(filter, options);
        let mut sql = format!("SELECT {COLUMNS} FROM ApiKeys{where_sql}{}", order_clause(options));

        if options.limit.is_some() || options.offset.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
            // SQLite treats a negative limit as unbounded
            values.push(Value::Integer(options.limit.map(to_sql_count).unwrap_or(-1)));
            values.push(Value::Integer(options.offset.map(to_sql_count).unwrap_or(0)));
        }

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl ApiKeyStore for SqliteApiKeyStore {
    type Error = rusqlite::Error;

    fn create(&self, new: NewApiKey) -> Result<ApiKeyRecord, Self::Error> {
        let record = new.into_record(Uuid::now_v7(), now_millis());

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            &format!(
                "INSERT INTO ApiKeys ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                record.id,
                record.name,
                record.key,
                record.hash,
                record.key_type,
                record.is_active,
                record.start_date.map(to_millis),
                record.end_date.map(to_millis),
                to_millis(record.created_at),
                to_millis(record.updated_at),
                record.deleted,
                record.deleted_at.map(to_millis),
            ],
        )?;

        Ok(record)
    }

    fn find_one(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Option<ApiKeyRecord>, Self::Error> {
        let (where_sql, values) = where_clause(filter, options);
        let sql = format!(
            "SELECT {COLUMNS} FROM ApiKeys{where_sql}{} LIMIT 1",
            order_clause(options)
        );

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.query_row(&sql, params_from_iter(values.iter()), row_to_record)
            .optional()
    }

    fn find_all(
        &self,
        filter: &ApiKeyFilter,
        options: &FindOptions,
    ) -> Result<Vec<ApiKeyRecord>, Self::Error> {
        self.query(filter, options)
    }

    fn get_total(&self, filter: &ApiKeyFilter, options: &FindOptions) -> Result<u64, Self::Error> {
        let (where_sql, values) = where_clause(filter, options);
        let sql = format!("SELECT COUNT(*) FROM ApiKeys{where_sql}");

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let total: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(total as u64)
    }

    fn save(&self, mut record: ApiKeyRecord) -> Result<ApiKeyRecord, Self::Error> {
        record.updated_at = now_millis();

        // The soft-delete marker is owned by soft_delete; a stale copy must not clear it.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = conn.query_row(
            r#"UPDATE ApiKeys SET name = ?1, "key" = ?2, hash = ?3, "type" = ?4, is_active = ?5,
                start_date = ?6, end_date = ?7, updated_at = ?8
             WHERE id = ?9
             RETURNING created_at, deleted, deleted_at"#,
            params![
                record.name,
                record.key,
                record.hash,
                record.key_type,
                record.is_active,
                record.start_date.map(to_millis),
                record.end_date.map(to_millis),
                to_millis(record.updated_at),
                record.id,
            ],
            |row| {
                Ok((
                    from_millis(0, row.get(0)?)?,
                    row.get::<_, bool>(1)?,
                    opt_from_millis(2, row.get(2)?)?,
                ))
            },
        )?;

        (record.created_at, record.deleted, record.deleted_at) = stored;
        Ok(record)
    }

    fn soft_delete(&self, mut record: ApiKeyRecord) -> Result<ApiKeyRecord, Self::Error> {
        let now = now_millis();

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = conn.execute(
            "UPDATE ApiKeys SET deleted = 1, deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![to_millis(now), record.id],
        )?;

        if changed == 0 {
            return Err(rusqlite::Error::QueryReturnedNoRows);
        }

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
        let (where_sql, values) = where_clause(filter, options);
        let sql = format!("DELETE FROM ApiKeys{where_sql}");

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let deleted = conn.execute(&sql, params_from_iter(values.iter()))?;
        log::debug!("Deleted {} API key rows", deleted);
        Ok(deleted as u64)
    }

    fn update_many(
        &self,
        filter: &ApiKeyFilter,
        patch: &ApiKeyPatch,
        options: &FindOptions,
    ) -> Result<u64, Self::Error> {
        let mut assignments = vec!["updated_at = ?"];
        let mut values = vec![Value::Integer(to_millis(now_millis()))];

        if let Some(is_active) = patch.is_active {
            assignments.push("is_active = ?");
            values.push(Value::Integer(is_active as i64));
        }
        if let Some(name) = &patch.name {
            assignments.push("name = ?");
            values.push(Value::Text(name.clone()));
        }

        let (where_sql, where_values) = where_clause(filter, options);
        values.extend(where_values);
        let sql = format!("UPDATE ApiKeys SET {}{where_sql}", assignments.join(", "));

        // One statement, so the filter and the write cannot interleave with other writers.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let updated = conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(updated as u64)
    }
}

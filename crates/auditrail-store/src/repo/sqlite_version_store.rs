//! SQLite-backed `VersionStore`
//!
//! One row per version in the `versions` table. Snapshot columns are JSON
//! documents; `created_at` is stored as Unix milliseconds, so timestamps
//! read back are truncated to millisecond precision.

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{from_rusqlite, serialization_error, Result};
use crate::migrations::apply_migrations;
use auditrail_core::errors::{ExError, ExErrorKind};
use auditrail_core::snapshot::codec;
use auditrail_core::{NewVersion, SortOrder, VersionEvent, VersionQuery, VersionRecord, VersionStore};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::path::Path;

const SELECT_COLUMNS: &str = "SELECT id, item_type, item_id, event, object, object_changes,
            additional_objects, additional_objects_changes, whodunnit, metadata, created_at
     FROM versions";

/// Version store over one SQLite connection
pub struct SqliteVersionStore {
    conn: Connection,
}

impl SqliteVersionStore {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = db::open(path)?;
        Self::from_connection(conn)
    }

    /// Fresh in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, configuring it and applying migrations
    pub fn from_connection(mut conn: Connection) -> Result<Self> {
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl VersionStore for SqliteVersionStore {
    fn create_version(&mut self, version: NewVersion) -> Result<i64> {
        let object = codec::encode(&version.object).map_err(|e| serialization_error("object", e))?;
        let object_changes = codec::encode(&version.object_changes)
            .map_err(|e| serialization_error("object_changes", e))?;
        let additional_objects = codec::encode(&version.additional_objects)
            .map_err(|e| serialization_error("additional_objects", e))?;
        let additional_objects_changes = codec::encode(&version.additional_objects_changes)
            .map_err(|e| serialization_error("additional_objects_changes", e))?;
        let metadata =
            codec::encode(&version.metadata).map_err(|e| serialization_error("metadata", e))?;

        let tx = self.conn.transaction().map_err(from_rusqlite)?;
        tx.execute(
            "INSERT INTO versions (item_type, item_id, event, object, object_changes,
                additional_objects, additional_objects_changes, whodunnit, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                version.item_type,
                version.item_id,
                version.event.as_str(),
                object,
                object_changes,
                additional_objects,
                additional_objects_changes,
                version.whodunnit,
                metadata,
                version.created_at.timestamp_millis(),
            ],
        )
        .map_err(|e| {
            from_rusqlite(e)
                .with_op("create_version")
                .with_item_type(version.item_type.clone())
                .with_item_id(version.item_id.clone())
        })?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(from_rusqlite)?;

        tracing::debug!(
            version_id = id,
            item_type = %version.item_type,
            item_id = %version.item_id,
            version_event = version.event.as_str(),
            "Version persisted"
        );
        Ok(id)
    }

    fn query_versions(&self, query: &VersionQuery) -> Result<Vec<VersionRecord>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE item_type = ?");
        let mut params: Vec<SqlValue> = vec![SqlValue::Text(query.item_type.clone())];

        if let Some(item_id) = &query.item_id {
            sql.push_str(" AND item_id = ?");
            params.push(SqlValue::Text(item_id.clone()));
        }
        sql.push_str(match query.order {
            SortOrder::NewestFirst => " ORDER BY created_at DESC, id DESC",
            SortOrder::OldestFirst => " ORDER BY created_at ASC, id ASC",
        });
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows: Vec<VersionRow> = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok(VersionRow {
                    id: row.get(0)?,
                    item_type: row.get(1)?,
                    item_id: row.get(2)?,
                    event: row.get(3)?,
                    object: row.get(4)?,
                    object_changes: row.get(5)?,
                    additional_objects: row.get(6)?,
                    additional_objects_changes: row.get(7)?,
                    whodunnit: row.get(8)?,
                    metadata: row.get(9)?,
                    created_at: row.get(10)?,
                })
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        rows.into_iter().map(VersionRow::into_record).collect()
    }
}

/// Raw column values of one `versions` row
struct VersionRow {
    id: i64,
    item_type: String,
    item_id: String,
    event: String,
    object: Option<String>,
    object_changes: Option<String>,
    additional_objects: Option<String>,
    additional_objects_changes: Option<String>,
    whodunnit: Option<String>,
    metadata: Option<String>,
    created_at: i64,
}

impl VersionRow {
    fn into_record(self) -> Result<VersionRecord> {
        let event: VersionEvent = self
            .event
            .parse()
            .map_err(|e| serialization_error("event", e))?;
        let created_at: DateTime<Utc> = Utc
            .timestamp_millis_opt(self.created_at)
            .single()
            .ok_or_else(|| {
                ExError::new(ExErrorKind::Serialization)
                    .with_op("version_codec")
                    .with_message(format!("Invalid created_at {}", self.created_at))
            })?;

        Ok(VersionRecord {
            id: self.id,
            item_type: self.item_type,
            item_id: self.item_id,
            event,
            object: codec::decode(self.object.as_deref())
                .map_err(|e| serialization_error("object", e))?,
            object_changes: codec::decode(self.object_changes.as_deref())
                .map_err(|e| serialization_error("object_changes", e))?,
            additional_objects: codec::decode(self.additional_objects.as_deref())
                .map_err(|e| serialization_error("additional_objects", e))?,
            additional_objects_changes: codec::decode(self.additional_objects_changes.as_deref())
                .map_err(|e| serialization_error("additional_objects_changes", e))?,
            whodunnit: self.whodunnit,
            metadata: codec::decode(self.metadata.as_deref())
                .map_err(|e| serialization_error("metadata", e))?,
            created_at,
        })
    }
}

//! Row mapping for the history index and the change-event log.
//!
//! Functions take a plain connection so callers can run them inside a
//! transaction.

use crate::{StorageError, StorageResult};
use cadtrail_snapshot::{ChangeEvent, ChangeKind, HistoryIndexEntry, SnapshotId, SnapshotKind};
use cadtrail_util::path::document_key;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Aggregate numbers for one document's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub snapshot_count: usize,
    pub event_count: usize,
    /// Sum of compressed blob sizes.
    pub total_blob_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Fixed-width RFC 3339, so text order is chronological order.
pub(crate) fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_time(text: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::corrupt(format!("invalid timestamp '{text}': {e}")))
}

const ENTRY_COLUMNS: &str = "snapshot_id, document_path, timestamp, description, kind, version, \
     feature_count, blob_size, blob_location, parent_id, tags_json";

struct EntryRow {
    snapshot_id: String,
    document_path: String,
    timestamp: String,
    description: String,
    kind: String,
    version: i64,
    feature_count: i64,
    blob_size: i64,
    blob_location: String,
    parent_id: Option<String>,
    tags_json: String,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            snapshot_id: row.get(0)?,
            document_path: row.get(1)?,
            timestamp: row.get(2)?,
            description: row.get(3)?,
            kind: row.get(4)?,
            version: row.get(5)?,
            feature_count: row.get(6)?,
            blob_size: row.get(7)?,
            blob_location: row.get(8)?,
            parent_id: row.get(9)?,
            tags_json: row.get(10)?,
        })
    }

    fn into_entry(self) -> StorageResult<HistoryIndexEntry> {
        let kind = self
            .kind
            .parse::<SnapshotKind>()
            .map_err(StorageError::corrupt)?;
        Ok(HistoryIndexEntry {
            snapshot_id: SnapshotId::from_string(self.snapshot_id),
            document_path: PathBuf::from(self.document_path),
            timestamp: decode_time(&self.timestamp)?,
            description: self.description,
            kind,
            version: u32::try_from(self.version)
                .map_err(|_| StorageError::corrupt(format!("invalid version {}", self.version)))?,
            feature_count: usize::try_from(self.feature_count).unwrap_or_default(),
            blob_size: u64::try_from(self.blob_size).unwrap_or_default(),
            blob_location: PathBuf::from(self.blob_location),
            parent_snapshot_id: self.parent_id.map(SnapshotId::from_string),
            tags: serde_json::from_str(&self.tags_json)?,
        })
    }
}

/// Insert or replace an index row.
pub fn insert_entry(conn: &Connection, entry: &HistoryIndexEntry) -> StorageResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO snapshots (snapshot_id, document_key, document_path, timestamp, \
         description, kind, version, feature_count, blob_size, blob_location, parent_id, tags_json) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            entry.snapshot_id.as_str(),
            document_key(&entry.document_path),
            entry.document_path.to_string_lossy(),
            encode_time(&entry.timestamp),
            entry.description,
            entry.kind.as_str(),
            i64::from(entry.version),
            entry.feature_count as i64,
            entry.blob_size as i64,
            entry.blob_location.to_string_lossy(),
            entry.parent_snapshot_id.as_ref().map(SnapshotId::as_str),
            serde_json::to_string(&entry.tags)?,
        ],
    )?;
    Ok(())
}

/// Index rows of a document, most recent first.
pub fn entries_for(conn: &Connection, document: &Path) -> StorageResult<Vec<HistoryIndexEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM snapshots WHERE document_key = ?1 \
         ORDER BY timestamp DESC, version DESC"
    ))?;
    let rows = stmt
        .query_map([document_key(document)], EntryRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(EntryRow::into_entry).collect()
}

/// Index row of one snapshot.
pub fn entry(conn: &Connection, id: &SnapshotId) -> StorageResult<Option<HistoryIndexEntry>> {
    let row = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM snapshots WHERE snapshot_id = ?1"),
            [id.as_str()],
            EntryRow::from_row,
        )
        .optional()?;
    row.map(EntryRow::into_entry).transpose()
}

/// Delete an index row, returns the number of rows removed.
pub fn delete_entry(conn: &Connection, id: &SnapshotId) -> StorageResult<usize> {
    Ok(conn.execute("DELETE FROM snapshots WHERE snapshot_id = ?1", [id.as_str()])?)
}

/// Append change events. Events already logged are skipped.
///
/// Returns how many rows were inserted.
pub fn insert_events(conn: &Connection, events: &[ChangeEvent]) -> StorageResult<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO change_events (document_key, document_path, timestamp, kind, \
         feature_name, new_state_json, old_state_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    let mut inserted = 0;
    for event in events {
        let old_state = event
            .old_state
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        inserted += stmt.execute(params![
            document_key(&event.document_path),
            event.document_path.to_string_lossy(),
            encode_time(&event.timestamp),
            event.kind.as_str(),
            event.feature_name(),
            serde_json::to_string(&event.new_state)?,
            old_state,
        ])?;
    }
    Ok(inserted)
}

struct EventRow {
    document_path: String,
    timestamp: String,
    kind: String,
    new_state_json: String,
    old_state_json: Option<String>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            document_path: row.get(0)?,
            timestamp: row.get(1)?,
            kind: row.get(2)?,
            new_state_json: row.get(3)?,
            old_state_json: row.get(4)?,
        })
    }

    fn into_event(self) -> StorageResult<ChangeEvent> {
        Ok(ChangeEvent {
            kind: self.kind.parse::<ChangeKind>().map_err(StorageError::corrupt)?,
            timestamp: decode_time(&self.timestamp)?,
            document_path: PathBuf::from(self.document_path),
            new_state: serde_json::from_str(&self.new_state_json)?,
            old_state: self
                .old_state_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        })
    }
}

/// Change events of a document in chronological order, optionally only
/// those of one feature.
pub fn events_for(
    conn: &Connection,
    document: &Path,
    feature: Option<&str>,
) -> StorageResult<Vec<ChangeEvent>> {
    const COLUMNS: &str = "document_path, timestamp, kind, new_state_json, old_state_json";
    let key = document_key(document);

    let rows = match feature {
        Some(feature) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM change_events WHERE document_key = ?1 AND feature_name = ?2 \
                 ORDER BY timestamp, event_id"
            ))?;
            let rows = stmt
                .query_map(params![key, feature], EventRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM change_events WHERE document_key = ?1 \
                 ORDER BY timestamp, event_id"
            ))?;
            let rows = stmt
                .query_map([key], EventRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };

    rows.into_iter().map(EventRow::into_event).collect()
}

/// Remove every snapshot row and change event of a document.
///
/// Returns `(snapshots, events)` removed.
pub fn delete_document(conn: &Connection, document: &Path) -> StorageResult<(usize, usize)> {
    let key = document_key(document);
    let snapshots = conn.execute("DELETE FROM snapshots WHERE document_key = ?1", [&key])?;
    let events = conn.execute("DELETE FROM change_events WHERE document_key = ?1", [&key])?;
    Ok((snapshots, events))
}

/// Counts and sizes for a document.
pub fn stats_for(conn: &Connection, document: &Path) -> StorageResult<HistoryStats> {
    let key = document_key(document);
    let (snapshot_count, total_blob_bytes, oldest, newest): (i64, i64, Option<String>, Option<String>) =
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(blob_size), 0), MIN(timestamp), MAX(timestamp) \
             FROM snapshots WHERE document_key = ?1",
            [&key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
    let event_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM change_events WHERE document_key = ?1",
        [&key],
        |row| row.get(0),
    )?;

    Ok(HistoryStats {
        snapshot_count: usize::try_from(snapshot_count).unwrap_or_default(),
        event_count: usize::try_from(event_count).unwrap_or_default(),
        total_blob_bytes: u64::try_from(total_blob_bytes).unwrap_or_default(),
        oldest: oldest.as_deref().map(decode_time).transpose()?,
        newest: newest.as_deref().map(decode_time).transpose()?,
    })
}

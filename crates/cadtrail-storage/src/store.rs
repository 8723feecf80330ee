//! The persistent history store.

use crate::blob;
use crate::db::{self, INDEX_DB_FILE};
use crate::index::{self, HistoryStats};
use crate::legacy::{self, LegacyHistory, MigrationReport};
use crate::{StorageError, StorageResult};
use cadtrail_snapshot::{ChangeEvent, DocumentSnapshot, HistoryIndexEntry, SnapshotId};
use cadtrail_util::path::history_dir;
use cadtrail_util::{Operation, TimingGuard};
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// What a purge removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub snapshots: usize,
    pub events: usize,
    pub folder_removed: bool,
}

/// Snapshot blobs on disk plus the SQLite index and change-event log.
///
/// One connection is shared behind a mutex; every database call takes the
/// lock, so the poll loop, user commands and the migration task never write
/// concurrently.
pub struct HistoryStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    history_root: Option<PathBuf>,
}

impl HistoryStore {
    /// Open the store with its database at `db_path`.
    ///
    /// Blob folders go under `history_root` when given, otherwise into a
    /// `.cadtrail` folder next to each document.
    pub fn open(db_path: impl Into<PathBuf>, history_root: Option<PathBuf>) -> StorageResult<Self> {
        let db_path = db_path.into();
        let conn = db::open_index(&db_path)?;
        debug!(path = %db_path.display(), "Opened history index");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            history_root,
        })
    }

    /// Open the store inside a data directory.
    pub fn open_in(data_dir: &Path, history_root: Option<PathBuf>) -> StorageResult<Self> {
        Self::open(data_dir.join(INDEX_DB_FILE), history_root)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }

    /// Folder holding a document's blobs.
    pub fn history_dir(&self, document: &Path) -> PathBuf {
        history_dir(self.history_root.as_deref(), document)
    }

    /// Compress a snapshot into its document's history folder.
    ///
    /// Returns the blob location and compressed size.
    pub fn save_blob(&self, snapshot: &DocumentSnapshot) -> StorageResult<(PathBuf, u64)> {
        blob::write_blob(&self.history_dir(&snapshot.document_path), snapshot)
    }

    pub fn load_blob(&self, location: &Path) -> StorageResult<DocumentSnapshot> {
        blob::read_blob(location)
    }

    /// Save a snapshot's blob and register its index row.
    pub fn save_snapshot(&self, snapshot: &DocumentSnapshot) -> StorageResult<HistoryIndexEntry> {
        let (location, size) = self.save_blob(snapshot)?;
        let entry = HistoryIndexEntry::for_snapshot(snapshot, &location, size);
        self.register(&entry)?;
        Ok(entry)
    }

    /// Add or replace an index row.
    pub fn register(&self, entry: &HistoryIndexEntry) -> StorageResult<()> {
        index::insert_entry(&*self.lock()?, entry)
    }

    /// Index rows of a document, most recent first.
    pub fn history(&self, document: &Path) -> StorageResult<Vec<HistoryIndexEntry>> {
        index::entries_for(&*self.lock()?, document)
    }

    pub fn index_entry(&self, id: &SnapshotId) -> StorageResult<Option<HistoryIndexEntry>> {
        index::entry(&*self.lock()?, id)
    }

    /// Load a snapshot through its index row.
    pub fn load_snapshot(&self, id: &SnapshotId) -> StorageResult<DocumentSnapshot> {
        let entry = self
            .index_entry(id)?
            .ok_or_else(|| StorageError::not_found(id.as_str()))?;
        let snapshot = self.load_blob(&entry.blob_location)?;
        if snapshot.id != *id {
            return Err(StorageError::corrupt(format!(
                "blob {} holds snapshot {} instead of {}",
                entry.blob_location.display(),
                snapshot.id,
                id
            )));
        }
        Ok(snapshot)
    }

    /// Remove a snapshot's blob file(s) and its index row.
    ///
    /// The indexed location is tried first; the document's history folder
    /// is then scanned for stray files carrying the snapshot's short id.
    /// Returns the number of files removed.
    pub fn delete_blob(&self, document: &Path, id: &SnapshotId) -> StorageResult<usize> {
        let mut removed = 0;

        if let Some(entry) = self.index_entry(id)? {
            if blob::remove_blob(&entry.blob_location)? {
                removed += 1;
            }
            index::delete_entry(&*self.lock()?, id)?;
        }

        for path in blob::find_blobs(&self.history_dir(document), id)? {
            if blob::remove_blob(&path)? {
                removed += 1;
            }
        }

        debug!(snapshot_id = %id, removed, "Deleted snapshot blob");
        Ok(removed)
    }

    /// Append change events inside one transaction.
    pub fn append_change_events(&self, events: &[ChangeEvent]) -> StorageResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = index::insert_events(&tx, events)?;
        tx.commit()?;
        debug!(inserted, "Appended change events");
        Ok(inserted)
    }

    /// Change events of a document, oldest first.
    pub fn load_change_events(&self, document: &Path) -> StorageResult<Vec<ChangeEvent>> {
        index::events_for(&*self.lock()?, document, None)
    }

    /// Change events of one feature, oldest first.
    pub fn feature_events(&self, document: &Path, feature: &str) -> StorageResult<Vec<ChangeEvent>> {
        index::events_for(&*self.lock()?, document, Some(feature))
    }

    pub fn history_stats(&self, document: &Path) -> StorageResult<HistoryStats> {
        index::stats_for(&*self.lock()?, document)
    }

    /// Delete a document's history folder, index rows and change events.
    pub fn purge_history(&self, document: &Path) -> StorageResult<PurgeReport> {
        // Blobs may live outside the current history folder if the root changed
        let entries = self.history(document)?;
        for entry in &entries {
            blob::remove_blob(&entry.blob_location)?;
        }

        let folder = self.history_dir(document);
        let folder_removed = match fs::remove_dir_all(&folder) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let (snapshots, events) = {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            let removed = index::delete_document(&tx, document)?;
            tx.commit()?;
            removed
        };

        info!(
            document = %document.display(),
            snapshots,
            events,
            folder_removed,
            "Purged document history"
        );
        Ok(PurgeReport {
            snapshots,
            events,
            folder_removed,
        })
    }

    /// Import every pending legacy file in `legacy_dir`.
    ///
    /// Safe to run repeatedly: imported files are renamed, snapshots already
    /// indexed are skipped and duplicate events are ignored. A file that
    /// fails to import is left in place and counted in `failed`.
    pub fn migrate_legacy(&self, legacy_dir: &Path) -> StorageResult<MigrationReport> {
        let _timing = TimingGuard::new(Operation::Migration, legacy_dir.display().to_string());
        let mut report = MigrationReport::default();

        let entries = match fs::read_dir(legacy_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| legacy::is_pending(path))
            .collect();
        files.sort();

        for file in files {
            match self.import_legacy_file(&file) {
                Ok((snapshots, events)) => {
                    fs::rename(&file, legacy::migrated_path(&file))?;
                    report.files += 1;
                    report.snapshots += snapshots;
                    report.events += events;
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Failed to migrate legacy history");
                    report.failed += 1;
                }
            }
        }

        if !report.is_empty() {
            info!(
                files = report.files,
                snapshots = report.snapshots,
                events = report.events,
                failed = report.failed,
                "Migrated legacy history"
            );
        }
        Ok(report)
    }

    fn import_legacy_file(&self, file: &Path) -> StorageResult<(usize, usize)> {
        let content = fs::read_to_string(file)?;
        let history: LegacyHistory = serde_json::from_str(&content)?;

        let mut snapshots = 0;
        for snapshot in &history.snapshots {
            if self.index_entry(&snapshot.id)?.is_some() {
                continue;
            }
            self.save_snapshot(snapshot)?;
            snapshots += 1;
        }

        let events = self.append_change_events(&history.changes)?;
        debug!(
            file = %file.display(),
            document = %history.document_path.display(),
            snapshots,
            events,
            "Imported legacy history file"
        );
        Ok((snapshots, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::legacy_file;
    use cadtrail_snapshot::{FeatureState, SnapshotKind};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        store: HistoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store =
                HistoryStore::open_in(&dir.path().join("data"), Some(dir.path().join("history")))
                    .unwrap();
            Self { dir, store }
        }

        fn document(&self) -> PathBuf {
            self.dir.path().join("parts").join("bracket.sldprt")
        }

        fn snapshot(&self, version: u32, kind: SnapshotKind) -> DocumentSnapshot {
            DocumentSnapshot::new(self.document(), format!("v{version}"), kind, version).with_features(
                vec![
                    FeatureState::new("Sketch1", "ProfileFeature", false),
                    FeatureState::new("Boss-Extrude1", "Extrusion", false).with_parameter("depth", 10.0),
                ],
            )
        }
    }

    #[test]
    fn saved_snapshot_loads_field_for_field() {
        let fx = Fixture::new();
        let snapshot = fx.snapshot(1, SnapshotKind::Initial);

        let entry = fx.store.save_snapshot(&snapshot).unwrap();
        assert!(entry.blob_location.starts_with(fx.store.history_dir(&fx.document())));
        assert_eq!(entry.feature_count, 2);
        assert_eq!(fx.store.load_snapshot(&snapshot.id).unwrap(), snapshot);
        assert_eq!(fx.store.load_blob(&entry.blob_location).unwrap(), snapshot);
    }

    #[test]
    fn history_is_most_recent_first() {
        let fx = Fixture::new();
        let first = fx.snapshot(1, SnapshotKind::Initial);
        let second = fx.snapshot(2, SnapshotKind::Manual);
        fx.store.save_snapshot(&first).unwrap();
        fx.store.save_snapshot(&second).unwrap();

        let ids: Vec<SnapshotId> = fx
            .store
            .history(&fx.document())
            .unwrap()
            .into_iter()
            .map(|e| e.snapshot_id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn delete_blob_removes_file_and_row() {
        let fx = Fixture::new();
        let snapshot = fx.snapshot(1, SnapshotKind::Initial);
        let entry = fx.store.save_snapshot(&snapshot).unwrap();

        assert_eq!(fx.store.delete_blob(&fx.document(), &snapshot.id).unwrap(), 1);
        assert!(!entry.blob_location.exists());
        assert!(fx.store.index_entry(&snapshot.id).unwrap().is_none());
        assert!(matches!(
            fx.store.load_snapshot(&snapshot.id),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn delete_blob_finds_unindexed_files() {
        let fx = Fixture::new();
        let snapshot = fx.snapshot(1, SnapshotKind::Auto);
        let (location, _) = fx.store.save_blob(&snapshot).unwrap();

        assert_eq!(fx.store.delete_blob(&fx.document(), &snapshot.id).unwrap(), 1);
        assert!(!location.exists());
    }

    #[test]
    fn purge_removes_everything_for_document() {
        let fx = Fixture::new();
        let doc = fx.document();
        fx.store.save_snapshot(&fx.snapshot(1, SnapshotKind::Initial)).unwrap();
        fx.store
            .append_change_events(&[ChangeEvent::added(&doc, FeatureState::new("Fillet1", "Fillet", false))])
            .unwrap();

        let report = fx.store.purge_history(&doc).unwrap();
        assert_eq!(
            report,
            PurgeReport {
                snapshots: 1,
                events: 1,
                folder_removed: true
            }
        );
        assert!(!fx.store.history_dir(&doc).exists());
        assert!(fx.store.load_change_events(&doc).unwrap().is_empty());
        assert_eq!(fx.store.history_stats(&doc).unwrap(), HistoryStats::default());
    }

    #[test]
    fn legacy_migration_imports_once() {
        let fx = Fixture::new();
        let doc = fx.document();
        let legacy_dir = fx.dir.path().join("legacy");
        fs::create_dir_all(&legacy_dir).unwrap();

        let history = LegacyHistory {
            document_path: doc.clone(),
            snapshots: vec![fx.snapshot(1, SnapshotKind::Initial), fx.snapshot(2, SnapshotKind::Manual)],
            changes: vec![ChangeEvent::added(&doc, FeatureState::new("Fillet1", "Fillet", false))],
        };
        let file = legacy_file(&legacy_dir, &doc);
        fs::write(&file, serde_json::to_string_pretty(&history).unwrap()).unwrap();
        fs::write(legacy_dir.join("broken.json"), "{ not json").unwrap();

        let report = fx.store.migrate_legacy(&legacy_dir).unwrap();
        assert_eq!(
            report,
            MigrationReport {
                files: 1,
                snapshots: 2,
                events: 1,
                failed: 1
            }
        );
        assert!(!file.exists());
        assert!(legacy::migrated_path(&file).exists());
        assert!(legacy_dir.join("broken.json").exists());

        assert_eq!(fx.store.history(&doc).unwrap().len(), 2);
        assert_eq!(fx.store.load_change_events(&doc).unwrap(), history.changes);

        let again = fx.store.migrate_legacy(&legacy_dir).unwrap();
        assert_eq!(again.files, 0);
        assert_eq!(fx.store.history(&doc).unwrap().len(), 2);
    }

    #[test]
    fn migrating_missing_dir_is_a_no_op() {
        let fx = Fixture::new();
        let report = fx.store.migrate_legacy(&fx.dir.path().join("absent")).unwrap();
        assert!(report.is_empty());
    }
}

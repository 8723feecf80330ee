//! Snapshot chain management: commit, load and resolve.
//!
//! The in-memory chain is authoritative for the session. Persistence
//! failures are logged and the chain keeps the snapshot.

use crate::error::{CoreError, CoreResult};
use crate::session::{SnapshotChain, TrackingSession};
use cadtrail_host::{capture_document, DocumentHost, InspectorSet};
use cadtrail_snapshot::{DocumentSnapshot, SnapshotId, SnapshotKind};
use cadtrail_storage::{HistoryStore, StorageError};
use cadtrail_util::path::document_key;
use cadtrail_util::{Operation, TimingGuard};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Description of the snapshot committed when a document has no history.
pub const INITIAL_DESCRIPTION: &str = "Initial snapshot";

/// Commits snapshots to a session's chain and the store.
#[derive(Clone)]
pub struct SnapshotManager {
    store: Arc<HistoryStore>,
    inspectors: Arc<InspectorSet>,
    max_snapshots: usize,
}

impl SnapshotManager {
    pub fn new(store: Arc<HistoryStore>, inspectors: Arc<InspectorSet>, max_snapshots: usize) -> Self {
        Self {
            store,
            inspectors,
            max_snapshots: max_snapshots.max(1),
        }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Capture the live document and append it to the chain.
    ///
    /// Committing while positioned before the tail discards the redo
    /// branch first. Only a failed capture is an error.
    pub fn commit(
        &self,
        session: &mut TrackingSession,
        host: &dyn DocumentHost,
        description: &str,
        kind: SnapshotKind,
        tags: Vec<String>,
    ) -> CoreResult<DocumentSnapshot> {
        let _timing = TimingGuard::new(Operation::Commit, session.document_path.display().to_string());
        let captured = capture_document(host, &self.inspectors)?;

        let discarded = session.chain.truncate_after_current();
        if !discarded.is_empty() {
            debug!(count = discarded.len(), "Discarding redo branch");
            self.delete_blobs(&session.document_path, &discarded);
        }

        let parent = session.chain.current().map(|s| s.id.clone());
        let version = session.chain.next_version();
        let mut snapshot = DocumentSnapshot::new(&session.document_path, description, kind, version)
            .with_features(captured.features)
            .with_parent(parent)
            .with_tags(tags);
        snapshot.document_properties = captured.properties;

        session.chain.push(snapshot.clone());

        if let Err(e) = self.store.save_snapshot(&snapshot) {
            warn!(
                snapshot = %snapshot.id,
                error = %e,
                "Failed to persist snapshot, keeping it in memory only"
            );
        }

        let evicted = session.chain.evict_over(self.max_snapshots);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), max = self.max_snapshots, "Evicting oldest snapshots");
            self.delete_blobs(&session.document_path, &evicted);
        }

        session.events_since_snapshot = 0;

        info!(
            document = %session.document_path.display(),
            snapshot = %snapshot.id,
            version = snapshot.version,
            kind = %snapshot.kind,
            features = snapshot.features.len(),
            "Committed snapshot"
        );
        Ok(snapshot)
    }

    /// Rebuild a session's chain from the store.
    ///
    /// Blobs that fail to load are skipped. When nothing loads, an initial
    /// snapshot is committed and returned.
    pub fn load(
        &self,
        session: &mut TrackingSession,
        host: &dyn DocumentHost,
    ) -> CoreResult<Option<DocumentSnapshot>> {
        let entries = self.store.history(&session.document_path).unwrap_or_else(|e| {
            warn!(
                document = %session.document_path.display(),
                error = %e,
                "Failed to read history index, starting with an empty chain"
            );
            Vec::new()
        });

        let mut snapshots = Vec::with_capacity(entries.len());
        // The index lists newest first
        for entry in entries.iter().rev() {
            match self.store.load_blob(&entry.blob_location) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!(
                    snapshot = %entry.snapshot_id,
                    location = %entry.blob_location.display(),
                    error = %e,
                    "Skipping unreadable snapshot"
                ),
            }
        }

        session.chain = SnapshotChain::from_snapshots(snapshots);
        let evicted = session.chain.evict_over(self.max_snapshots);
        if !evicted.is_empty() {
            self.delete_blobs(&session.document_path, &evicted);
        }

        if session.chain.is_empty() {
            let initial = self.commit(session, host, INITIAL_DESCRIPTION, SnapshotKind::Initial, Vec::new())?;
            return Ok(Some(initial));
        }

        debug!(
            document = %session.document_path.display(),
            snapshots = session.chain.len(),
            "Loaded snapshot chain"
        );
        Ok(None)
    }

    /// Find a snapshot of the session's document, in the chain or the store.
    pub fn resolve(&self, session: &TrackingSession, id: &SnapshotId) -> CoreResult<DocumentSnapshot> {
        if let Some(snapshot) = session.chain.find(id) {
            return Ok(snapshot.clone());
        }
        self.load_for(&session.document_path, id)
    }

    /// Load a snapshot from the store, rejecting other documents' snapshots.
    pub fn load_for(&self, document: &Path, id: &SnapshotId) -> CoreResult<DocumentSnapshot> {
        let snapshot = match self.store.load_snapshot(id) {
            Ok(snapshot) => snapshot,
            Err(StorageError::NotFound(_)) => return Err(CoreError::snapshot_not_found(id.as_str())),
            Err(e) => return Err(e.into()),
        };
        if document_key(&snapshot.document_path) != document_key(document) {
            return Err(CoreError::snapshot_not_found(id.as_str()));
        }
        Ok(snapshot)
    }

    fn delete_blobs(&self, document: &Path, snapshots: &[DocumentSnapshot]) {
        for snapshot in snapshots {
            if let Err(e) = self.store.delete_blob(document, &snapshot.id) {
                warn!(snapshot = %snapshot.id, error = %e, "Failed to delete snapshot blob");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadtrail_test_utils::{fixtures, MockFeature, TestHistory};

    fn manager(history: &TestHistory, max: usize) -> SnapshotManager {
        let store = HistoryStore::open_in(&history.data_dir(), Some(history.history_root())).unwrap();
        SnapshotManager::new(Arc::new(store), Arc::new(InspectorSet::default()), max)
    }

    #[test]
    fn first_load_commits_initial_snapshot() {
        let history = TestHistory::new();
        let manager = manager(&history, 50);
        let path = history.document("bracket.sldprt");
        let doc = fixtures::bracket_document(&path);
        let mut session = TrackingSession::new(&path);

        let initial = manager.load(&mut session, &doc).unwrap().unwrap();
        assert_eq!(initial.kind, SnapshotKind::Initial);
        assert_eq!(initial.version, 1);
        assert_eq!(initial.parent_snapshot_id, None);
        assert_eq!(initial.features.len(), 2);
        assert_eq!(initial.document_properties.get("PartNo").map(String::as_str), Some("BR-001"));
        assert_eq!(manager.store().history(&path).unwrap().len(), 1);
    }

    #[test]
    fn reload_restores_chain_in_order() {
        let history = TestHistory::new();
        let manager = manager(&history, 50);
        let path = history.document("bracket.sldprt");
        let doc = fixtures::bracket_document(&path);

        let mut session = TrackingSession::new(&path);
        manager.load(&mut session, &doc).unwrap();
        doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        let second = manager
            .commit(&mut session, &doc, "With fillet", SnapshotKind::Manual, vec!["review".into()])
            .unwrap();

        let mut reloaded = TrackingSession::new(&path);
        assert!(manager.load(&mut reloaded, &doc).unwrap().is_none());
        let versions: Vec<u32> = reloaded.chain.snapshots().iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(reloaded.chain.current().map(|s| &s.id), Some(&second.id));
        assert_eq!(reloaded.chain.current().map(|s| s.tags.clone()), Some(vec!["review".to_string()]));
    }

    #[test]
    fn commit_links_parent_and_resets_counter() {
        let history = TestHistory::new();
        let manager = manager(&history, 50);
        let path = history.document("bracket.sldprt");
        let doc = fixtures::bracket_document(&path);
        let mut session = TrackingSession::new(&path);
        let initial = manager.load(&mut session, &doc).unwrap().unwrap();

        session.events_since_snapshot = 7;
        let next = manager
            .commit(&mut session, &doc, "Manual", SnapshotKind::Manual, Vec::new())
            .unwrap();
        assert_eq!(next.parent_snapshot_id, Some(initial.id));
        assert_eq!(next.version, 2);
        assert_eq!(session.events_since_snapshot, 0);
    }

    #[test]
    fn commit_behind_tail_discards_redo_branch() {
        let history = TestHistory::new();
        let manager = manager(&history, 50);
        let path = history.document("bracket.sldprt");
        let doc = fixtures::bracket_document(&path);
        let mut session = TrackingSession::new(&path);
        manager.load(&mut session, &doc).unwrap();
        let dropped = manager
            .commit(&mut session, &doc, "Second", SnapshotKind::Manual, Vec::new())
            .unwrap();

        session.chain.set_current(0);
        let branch = manager
            .commit(&mut session, &doc, "Branch", SnapshotKind::Manual, Vec::new())
            .unwrap();

        assert_eq!(session.chain.len(), 2);
        assert_eq!(branch.version, 2);
        assert_eq!(branch.parent_snapshot_id, session.chain.get(0).map(|s| s.id.clone()));
        assert!(session.chain.find(&dropped.id).is_none());
        assert!(manager.store().index_entry(&dropped.id).unwrap().is_none());
    }

    #[test]
    fn eviction_removes_oldest_from_disk() {
        let history = TestHistory::new();
        let manager = manager(&history, 2);
        let path = history.document("bracket.sldprt");
        let doc = fixtures::bracket_document(&path);
        let mut session = TrackingSession::new(&path);
        let initial = manager.load(&mut session, &doc).unwrap().unwrap();

        manager.commit(&mut session, &doc, "Two", SnapshotKind::Auto, Vec::new()).unwrap();
        let third = manager.commit(&mut session, &doc, "Three", SnapshotKind::Auto, Vec::new()).unwrap();

        assert_eq!(session.chain.len(), 2);
        assert_eq!(third.version, 3);
        assert!(manager.store().index_entry(&initial.id).unwrap().is_none());
        assert_eq!(manager.store().history(&path).unwrap().len(), 2);
    }

    #[test]
    fn resolve_falls_back_to_store() {
        let history = TestHistory::new();
        let manager = manager(&history, 50);
        let path = history.document("bracket.sldprt");
        let doc = fixtures::bracket_document(&path);
        let mut session = TrackingSession::new(&path);
        let initial = manager.load(&mut session, &doc).unwrap().unwrap();

        let fresh = TrackingSession::new(&path);
        assert_eq!(manager.resolve(&fresh, &initial.id).unwrap().id, initial.id);

        let other = TrackingSession::new(history.document("other.sldprt"));
        assert!(matches!(
            manager.resolve(&other, &initial.id),
            Err(CoreError::SnapshotNotFound { .. })
        ));
        assert!(matches!(
            manager.resolve(&fresh, &SnapshotId::new()),
            Err(CoreError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn unsaved_document_cannot_be_committed() {
        let history = TestHistory::new();
        let manager = manager(&history, 50);
        let doc = cadtrail_test_utils::MockDocument::unsaved();
        let mut session = TrackingSession::new(history.document("ghost.sldprt"));

        assert!(manager
            .commit(&mut session, &doc, "Nope", SnapshotKind::Manual, Vec::new())
            .is_err());
        assert!(session.chain.is_empty());
    }

    #[test]
    fn unwritable_history_keeps_chain_in_memory() {
        let history = TestHistory::new();
        let blocked_root = history.path().join("not-a-folder");
        std::fs::write(&blocked_root, b"").unwrap();
        let store = HistoryStore::open_in(&history.data_dir(), Some(blocked_root)).unwrap();
        let manager = SnapshotManager::new(Arc::new(store), Arc::new(InspectorSet::default()), 50);

        let path = history.document("bracket.sldprt");
        let doc = fixtures::bracket_document(&path);
        let mut session = TrackingSession::new(&path);

        let initial = manager.load(&mut session, &doc).unwrap().unwrap();
        let manual = manager
            .commit(&mut session, &doc, "Manual", SnapshotKind::Manual, Vec::new())
            .unwrap();

        assert_eq!(session.chain.len(), 2);
        assert_eq!(manual.parent_snapshot_id, Some(initial.id));
        assert_eq!(session.chain.current().map(|s| &s.id), Some(&manual.id));
        assert!(manager.store().history(&path).unwrap().is_empty());
    }
}

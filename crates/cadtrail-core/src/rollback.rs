//! Rollback of the live document to a stored snapshot.
//!
//! A rollback first captures a `BeforeRollback` snapshot when the live
//! document has drifted from the current snapshot, so every rollback can be
//! undone. Features created after the target are deleted; features present
//! in both are restored in place. Deleted features cannot be re-created, so
//! rolling forward over a deletion leaves that feature missing.

use crate::detector::ChangeDetector;
use crate::error::{CoreError, CoreResult};
use crate::manager::SnapshotManager;
use crate::session::TrackingSession;
use cadtrail_host::{is_system_feature, DocumentHost, FeatureHandle, HostResult, InspectorSet};
use cadtrail_snapshot::{DocumentSnapshot, FeatureState, SnapshotId, SnapshotKind};
use cadtrail_util::{Operation, TimingGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a rollback, undo or redo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub success: bool,
    pub message: String,
    /// Features restored without error.
    pub restored_count: usize,
    /// Live features deleted because the target does not have them.
    pub deleted_count: usize,
    pub failed_count: usize,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub target_snapshot_id: Option<SnapshotId>,
    /// Safety snapshot committed before the document was touched.
    #[serde(default)]
    pub guard_snapshot: Option<DocumentSnapshot>,
}

impl RollbackOutcome {
    /// An outcome for a rollback that never touched the document.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            errors: vec![message.clone()],
            message,
            ..Default::default()
        }
    }
}

/// Applies snapshots to the live document.
#[derive(Clone)]
pub struct RollbackEngine {
    manager: SnapshotManager,
    detector: ChangeDetector,
    inspectors: Arc<InspectorSet>,
}

impl RollbackEngine {
    pub fn new(manager: SnapshotManager, detector: ChangeDetector, inspectors: Arc<InspectorSet>) -> Self {
        Self {
            manager,
            detector,
            inspectors,
        }
    }

    /// Roll the document back (or forward) to a snapshot.
    ///
    /// Failures are reported in the outcome; nothing here returns an error.
    pub fn rollback_to(
        &self,
        session: &mut TrackingSession,
        host: &mut dyn DocumentHost,
        id: &SnapshotId,
    ) -> RollbackOutcome {
        let _timing = TimingGuard::new(Operation::Rollback, id.as_str());

        let target = match self.manager.resolve(session, id) {
            Ok(target) => target,
            Err(e) => {
                warn!(snapshot = %id, error = %e, "Rollback target unavailable");
                return RollbackOutcome::failed(e.to_string());
            }
        };

        let guard = match self.guard(session, &*host, &target) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(snapshot = %id, error = %e, "Rollback aborted before touching the document");
                return RollbackOutcome::failed(e.to_string());
            }
        };

        let mut outcome = self.apply(host, &target);
        outcome.target_snapshot_id = Some(target.id.clone());
        outcome.guard_snapshot = guard;

        match session.chain.position(&target.id) {
            Some(index) => {
                session.chain.set_current(index);
            }
            None => warn!(
                snapshot = %target.id,
                "Rollback target is no longer in the chain, position left at the tail"
            ),
        }

        // Edits made by the rollback itself are not user changes
        if let Err(e) = self.detector.prime(session, &*host) {
            warn!(error = %e, "Failed to refresh feature cache after rollback");
        }

        info!(
            document = %session.document_path.display(),
            snapshot = %target.id,
            version = target.version,
            restored = outcome.restored_count,
            deleted = outcome.deleted_count,
            failed = outcome.failed_count,
            "Rolled back"
        );
        outcome
    }

    /// Step back one snapshot.
    pub fn undo(&self, session: &mut TrackingSession, host: &mut dyn DocumentHost) -> RollbackOutcome {
        if !session.chain.can_undo() {
            return RollbackOutcome::failed("Nothing to undo");
        }
        let Some(target) = session.chain.current_index().and_then(|i| session.chain.get(i - 1)) else {
            return RollbackOutcome::failed("Nothing to undo");
        };
        let id = target.id.clone();
        self.rollback_to(session, host, &id)
    }

    /// Step forward one snapshot.
    pub fn redo(&self, session: &mut TrackingSession, host: &mut dyn DocumentHost) -> RollbackOutcome {
        if !session.chain.can_redo() {
            return RollbackOutcome::failed("Nothing to redo");
        }
        let Some(target) = session.chain.current_index().and_then(|i| session.chain.get(i + 1)) else {
            return RollbackOutcome::failed("Nothing to redo");
        };
        let id = target.id.clone();
        self.rollback_to(session, host, &id)
    }

    /// Commit a `BeforeRollback` snapshot if the live document is dirty.
    ///
    /// A guard commit drops the redo branch, so rolling forward over
    /// unsaved edits is refused instead.
    fn guard(
        &self,
        session: &mut TrackingSession,
        host: &dyn DocumentHost,
        target: &DocumentSnapshot,
    ) -> CoreResult<Option<DocumentSnapshot>> {
        let live = self.detector.capture(host)?;
        if !session.is_dirty(&live, self.detector.tolerance()) {
            debug!("Live document matches the current snapshot, no guard needed");
            return Ok(None);
        }

        let current = session.chain.current_index();
        let target_index = session.chain.position(&target.id);
        if let (Some(current), Some(target_index)) = (current, target_index) {
            if target_index > current {
                return Err(CoreError::DirtyDocument);
            }
        }

        let description = format!("Before rollback to v{}", target.version);
        let guard = self
            .manager
            .commit(session, host, &description, SnapshotKind::BeforeRollback, Vec::new())?;
        Ok(Some(guard))
    }

    fn apply(&self, host: &mut dyn DocumentHost, target: &DocumentSnapshot) -> RollbackOutcome {
        let mut outcome = RollbackOutcome::default();

        let handles = match host.features() {
            Ok(handles) => handles,
            Err(e) => {
                let mut failed = RollbackOutcome::failed(format!("Failed to enumerate features: {e}"));
                failed.failed_count = 1;
                return failed;
            }
        };

        let mut kept = Vec::with_capacity(handles.len());
        for handle in handles {
            let type_name = host.feature_type(&handle).unwrap_or_default();
            if is_system_feature(&type_name, &handle.name) {
                continue;
            }
            match target.feature(&handle.name) {
                Some(state) => kept.push((handle, state)),
                None => match host.delete_feature(&handle) {
                    Ok(()) => {
                        debug!(feature = %handle.name, "Deleted feature absent from target");
                        outcome.deleted_count += 1;
                    }
                    Err(e) => {
                        outcome.failed_count += 1;
                        outcome.errors.push(format!("{}: {e}", handle.name));
                    }
                },
            }
        }

        for (handle, state) in kept {
            match self.restore_feature(host, &handle, state) {
                Ok(()) => outcome.restored_count += 1,
                Err(e) => {
                    warn!(feature = %handle.name, error = %e, "Failed to restore feature");
                    outcome.failed_count += 1;
                    outcome.errors.push(format!("{}: {e}", handle.name));
                }
            }
        }

        let rebuilt = match host.rebuild() {
            Ok(()) => true,
            Err(e) => {
                outcome.errors.push(format!("rebuild: {e}"));
                false
            }
        };

        outcome.success = rebuilt && outcome.failed_count == 0;
        outcome.message = if outcome.success {
            format!(
                "Rolled back to v{}: {} restored, {} deleted",
                target.version, outcome.restored_count, outcome.deleted_count
            )
        } else {
            format!(
                "Rolled back to v{} with errors: {} restored, {} deleted, {} failed",
                target.version, outcome.restored_count, outcome.deleted_count, outcome.failed_count
            )
        };
        outcome
    }

    /// Restore suppression, sketch dimensions and writable parameters.
    fn restore_feature(
        &self,
        host: &mut dyn DocumentHost,
        handle: &FeatureHandle,
        target: &FeatureState,
    ) -> HostResult<()> {
        host.set_suppressed(handle, target.is_suppressed)?;

        let live_dims = host.sketch_dimensions(handle)?;
        for dim in &target.sketch_dimensions {
            if live_dims.iter().any(|live| live.name == dim.name) {
                host.set_dimension_value(handle, &dim.name, dim.value)?;
            }
        }

        self.inspectors
            .for_type(&target.type_name)
            .restore(host, handle, target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadtrail_snapshot::DEFAULT_TOLERANCE;
    use cadtrail_storage::HistoryStore;
    use cadtrail_test_utils::{fixtures, MockDocument, MockFeature, TestHistory};

    struct Harness {
        _history: TestHistory,
        engine: RollbackEngine,
        manager: SnapshotManager,
        detector: ChangeDetector,
        session: TrackingSession,
        doc: MockDocument,
    }

    impl Harness {
        fn new() -> Self {
            let history = TestHistory::new();
            let path = history.document("bracket.sldprt");
            let store = Arc::new(
                HistoryStore::open_in(&history.data_dir(), Some(history.history_root())).unwrap(),
            );
            let inspectors = Arc::new(InspectorSet::default());
            let manager = SnapshotManager::new(store.clone(), inspectors.clone(), 50);
            let detector = ChangeDetector::new(store, inspectors.clone(), DEFAULT_TOLERANCE, 10);
            let engine = RollbackEngine::new(manager.clone(), detector.clone(), inspectors);

            let doc = fixtures::bracket_document(&path).with_parameter_writes();
            let mut session = TrackingSession::new(&path);
            detector.prime(&mut session, &doc).unwrap();
            manager.load(&mut session, &doc).unwrap();

            Self {
                _history: history,
                engine,
                manager,
                detector,
                session,
                doc,
            }
        }

        fn commit(&mut self, description: &str) -> DocumentSnapshot {
            self.manager
                .commit(&mut self.session, &self.doc, description, SnapshotKind::Manual, Vec::new())
                .unwrap()
        }

        fn rollback_to(&mut self, id: &SnapshotId) -> RollbackOutcome {
            let mut host = self.doc.clone();
            self.engine.rollback_to(&mut self.session, &mut host, id)
        }

        fn initial_id(&self) -> SnapshotId {
            self.session.chain.get(0).unwrap().id.clone()
        }
    }

    #[test]
    fn rollback_deletes_newer_features_and_guards_edits() {
        let mut h = Harness::new();
        h.doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        h.commit("With fillet");
        h.doc.set_fillet_radius("Fillet1", 3.0);

        let initial = h.initial_id();
        let outcome = h.rollback_to(&initial);

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(outcome.restored_count, 2);
        assert_eq!(outcome.failed_count, 0);
        assert!(!h.doc.has_feature("Fillet1"));
        assert_eq!(h.doc.rebuild_count(), 1);

        let guard = outcome.guard_snapshot.unwrap();
        assert_eq!(guard.kind, SnapshotKind::BeforeRollback);
        assert_eq!(guard.description, "Before rollback to v1");
        assert_eq!(
            guard.feature("Fillet1").and_then(|f| f.parameters.get("radius")).and_then(|v| v.as_f64()),
            Some(3.0)
        );
        assert_eq!(h.session.chain.len(), 3);
        assert_eq!(h.session.chain.current_index(), Some(0));
    }

    #[test]
    fn clean_document_skips_guard() {
        let mut h = Harness::new();
        h.doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        h.commit("With fillet");

        let outcome = h.rollback_to(&h.initial_id());
        assert!(outcome.guard_snapshot.is_none());
        assert_eq!(h.session.chain.len(), 2);
    }

    #[test]
    fn restores_dimensions_suppression_and_parameters() {
        let mut h = Harness::new();
        h.doc.set_dimension("Sketch1", "D1@Sketch1", 25.0);
        h.doc.set_extrude_depth("Boss-Extrude1", 40.0);
        h.doc.suppress("Boss-Extrude1", true);

        let outcome = h.rollback_to(&h.initial_id());

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(h.doc.dimension("Sketch1", "D1@Sketch1"), Some(10.0));
        let extrude = h.doc.feature("Boss-Extrude1").unwrap();
        assert!(!extrude.suppressed);
        assert_eq!(extrude.extrude.map(|e| e.depth), Some(10.0));
    }

    #[test]
    fn system_features_are_never_deleted() {
        let mut h = Harness::new();
        let outcome = h.rollback_to(&h.initial_id());
        assert!(outcome.success);
        assert_eq!(outcome.deleted_count, 0);
        assert!(h.doc.has_feature("Front Plane"));
        assert!(h.doc.deleted_features().is_empty());
    }

    #[test]
    fn restore_failure_is_counted_not_fatal() {
        let mut h = Harness::new();
        h.doc.set_dimension("Sketch1", "D1@Sketch1", 25.0);
        h.doc.fail_restore("Sketch1");

        let outcome = h.rollback_to(&h.initial_id());
        assert!(!outcome.success);
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.restored_count, 1);
        assert!(outcome.errors[0].starts_with("Sketch1:"));
        assert_eq!(h.doc.rebuild_count(), 1);
    }

    #[test]
    fn unknown_target_leaves_document_untouched() {
        let mut h = Harness::new();
        h.doc.add_feature(MockFeature::fillet("Fillet1", 2.0));

        let outcome = h.rollback_to(&SnapshotId::new());
        assert!(!outcome.success);
        assert!(outcome.message.contains("not found"));
        assert!(h.doc.has_feature("Fillet1"));
        assert_eq!(h.session.chain.len(), 1);
        assert_eq!(h.doc.rebuild_count(), 0);
    }

    #[test]
    fn undo_and_redo_walk_the_chain() {
        let mut h = Harness::new();
        h.doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        h.commit("With fillet");

        let mut host = h.doc.clone();
        let undo = h.engine.undo(&mut h.session, &mut host);
        assert!(undo.success);
        assert_eq!(h.session.chain.current_index(), Some(0));
        assert!(h.session.chain.can_redo());

        let redo = h.engine.redo(&mut h.session, &mut host);
        assert!(redo.success);
        assert_eq!(h.session.chain.current_index(), Some(1));
        // Deleted features are not re-created
        assert!(!h.doc.has_feature("Fillet1"));

        assert_eq!(h.engine.redo(&mut h.session, &mut host).message, "Nothing to redo");
    }

    #[test]
    fn redo_over_dirty_document_is_refused() {
        let mut h = Harness::new();
        h.commit("Second");
        let mut host = h.doc.clone();
        h.engine.undo(&mut h.session, &mut host);

        h.doc.set_extrude_depth("Boss-Extrude1", 99.0);
        let outcome = h.engine.redo(&mut h.session, &mut host);
        assert!(!outcome.success);
        assert_eq!(h.session.chain.len(), 2);
        assert_eq!(h.session.chain.current_index(), Some(0));
        assert_eq!(h.doc.feature("Boss-Extrude1").and_then(|f| f.extrude).map(|e| e.depth), Some(99.0));
    }

    #[test]
    fn rollback_refreshes_detection_baseline() {
        let mut h = Harness::new();
        h.doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        h.rollback_to(&h.initial_id());

        let events = h.detector.poll(&mut h.session, &h.doc).unwrap();
        assert!(events.is_empty());
    }
}

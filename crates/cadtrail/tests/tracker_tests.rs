//! End-to-end tracking tests against a mock document.

use cadtrail_core::{Tracker, TrackerSettings};
use cadtrail_snapshot::{ChangeKind, DocumentSnapshot, FeatureState, SnapshotKind};
use cadtrail_storage::{legacy_file, LegacyHistory};
use cadtrail_test_utils::{fixtures, MockDocument, MockFeature, TestHistory};
use std::time::Duration;

fn settings(history: &TestHistory) -> TrackerSettings {
    let mut settings = TrackerSettings::with_data_dir(history.data_dir());
    settings.history_root = Some(history.history_root());
    settings.legacy_dir = history.legacy_dir();
    settings.poll_interval = Duration::from_secs(3600);
    settings
}

fn part(history: &TestHistory) -> MockDocument {
    MockDocument::new(history.document("bracket.sldprt"))
        .with_feature(MockFeature::origin())
        .with_feature(MockFeature::plane("Front Plane"))
        .with_feature(MockFeature::sketch("Sketch1").with_dimension("D1@Sketch1", 10.0))
        .with_feature(MockFeature::extrude("Boss-Extrude1", 10.0))
        .with_parameter_writes()
}

fn radius(state: &FeatureState) -> Option<f64> {
    state.parameters.get("radius").and_then(|v| v.as_f64())
}

#[tokio::test]
async fn fillet_edit_rollback_and_redo() {
    let history = TestHistory::new();
    let tracker = Tracker::new(settings(&history)).await.unwrap();
    let doc = part(&history);

    let info = tracker.start_tracking(Box::new(doc.clone())).await.unwrap();
    assert_eq!(info.snapshot_count, 1);
    let initial = tracker.current_snapshot().await.unwrap().unwrap();
    assert_eq!(initial.kind, SnapshotKind::Initial);
    let names: Vec<&str> = initial.features.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Sketch1", "Boss-Extrude1"]);

    doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
    let report = tracker.poll().await.unwrap();
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].kind, ChangeKind::Added);
    assert_eq!(report.events[0].feature_name(), "Fillet1");

    let manual = tracker
        .create_manual_snapshot("before fillet tweak", vec![])
        .await
        .unwrap();
    assert_eq!(manual.version, 2);

    doc.set_fillet_radius("Fillet1", 3.0);
    let report = tracker.poll().await.unwrap();
    assert_eq!(report.events.len(), 1);
    let modified = &report.events[0];
    assert_eq!(modified.kind, ChangeKind::Modified);
    assert_eq!(modified.old_state.as_ref().and_then(radius), Some(2.0));
    assert_eq!(radius(&modified.new_state), Some(3.0));

    let outcome = tracker.rollback_to(&initial.id).await.unwrap();
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.deleted_count, 1);
    assert_eq!(outcome.restored_count, 2);
    assert!(!doc.has_feature("Fillet1"));

    // The edited radius is kept in the guard snapshot
    let guard = outcome.guard_snapshot.unwrap();
    assert_eq!(guard.kind, SnapshotKind::BeforeRollback);
    assert_eq!(guard.feature("Fillet1").and_then(radius), Some(3.0));

    let chain = tracker.chain().await.unwrap();
    assert_eq!(chain.len(), 3);
    assert!(!tracker.can_undo().await.unwrap());
    assert!(tracker.can_redo().await.unwrap());

    // One step forward is the manual snapshot
    let outcome = tracker.redo().await.unwrap();
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.target_snapshot_id, Some(manual.id.clone()));
    let current = tracker.current_snapshot().await.unwrap().unwrap();
    assert_eq!(current.id, manual.id);
    assert_eq!(current.feature("Fillet1").and_then(radius), Some(2.0));
    // Deleted features are not re-created
    assert!(!doc.has_feature("Fillet1"));

    tracker.stop_tracking().await.unwrap();
    let events = tracker
        .events_for(&history.document("bracket.sldprt"), Some("Fillet1"))
        .await
        .unwrap();
    let kinds: Vec<ChangeKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Added, ChangeKind::Modified]);
}

#[tokio::test]
async fn suppression_rollback_is_reversible() {
    let history = TestHistory::new();
    let tracker = Tracker::new(settings(&history)).await.unwrap();
    let doc = part(&history);
    tracker.start_tracking(Box::new(doc.clone())).await.unwrap();
    let initial = tracker.current_snapshot().await.unwrap().unwrap();

    doc.suppress("Boss-Extrude1", true);
    let suppressed = tracker.create_manual_snapshot("suppressed", vec![]).await.unwrap();

    tracker.rollback_to(&initial.id).await.unwrap();
    assert!(!doc.feature("Boss-Extrude1").unwrap().suppressed);

    tracker.rollback_to(&suppressed.id).await.unwrap();
    assert!(doc.feature("Boss-Extrude1").unwrap().suppressed);
}

#[tokio::test]
async fn history_survives_restart() {
    let history = TestHistory::new();
    let doc = part(&history);

    {
        let tracker = Tracker::new(settings(&history)).await.unwrap();
        tracker.start_tracking(Box::new(doc.clone())).await.unwrap();
        doc.set_extrude_depth("Boss-Extrude1", 20.0);
        tracker.create_manual_snapshot("deeper", vec!["v2".into()]).await.unwrap();
        tracker.stop_tracking().await.unwrap();
    }

    let tracker = Tracker::new(settings(&history)).await.unwrap();
    let info = tracker.start_tracking(Box::new(doc.clone())).await.unwrap();
    assert_eq!(info.snapshot_count, 2);

    let entries = tracker.get_history().await.unwrap();
    assert_eq!(entries[0].description, "deeper");
    assert_eq!(entries[0].tags, vec!["v2"]);
    assert_eq!(entries[1].kind, SnapshotKind::Initial);

    let outcome = tracker.undo().await.unwrap();
    assert!(outcome.success);
    assert_eq!(
        doc.feature("Boss-Extrude1").and_then(|f| f.extrude).map(|e| e.depth),
        Some(10.0)
    );
}

#[tokio::test]
async fn legacy_history_is_loaded_before_tracking() {
    let history = TestHistory::new();
    let path = history.document("bracket.sldprt");
    let doc = fixtures::bracket_document(&path);

    let legacy_snapshot = DocumentSnapshot::new(&path, "Imported", SnapshotKind::Manual, 1)
        .with_features(vec![FeatureState::new("Sketch1", "ProfileFeature", false)]);
    let legacy = LegacyHistory {
        document_path: path.clone(),
        snapshots: vec![legacy_snapshot.clone()],
        changes: Vec::new(),
    };
    std::fs::write(
        legacy_file(&history.legacy_dir(), &path),
        serde_json::to_string(&legacy).unwrap(),
    )
    .unwrap();

    let tracker = Tracker::new(settings(&history)).await.unwrap();
    let info = tracker.start_tracking(Box::new(doc)).await.unwrap();

    // The imported snapshot replaces the initial capture
    assert_eq!(info.snapshot_count, 1);
    assert_eq!(info.current_snapshot_id, Some(legacy_snapshot.id));
}

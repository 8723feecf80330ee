//! The tracker: async entry point tying detection, snapshots and rollback
//! together for one live document at a time.
//!
//! Host calls and storage I/O are blocking, so every operation runs on the
//! blocking pool while holding the session lock. The poll loop takes the
//! same lock, which keeps a poll from interleaving with a rollback.
//!
//! # Example
//!
//! ```ignore
//! let tracker = Tracker::new(settings).await?;
//! tracker.start_tracking(Box::new(document)).await?;
//!
//! let snapshot = tracker.create_manual_snapshot("Before fillets", vec![]).await?;
//! // ... the user edits the part ...
//! let outcome = tracker.rollback_to(&snapshot.id).await?;
//!
//! tracker.stop_tracking().await?;
//! ```

use crate::bus::{
    Bus, FeaturesChanged, RollbackCompleted, SnapshotCreated, TrackingStarted, TrackingStopped,
};
use crate::config::TrackerSettings;
use crate::detector::ChangeDetector;
use crate::error::{CoreError, CoreResult};
use crate::manager::SnapshotManager;
use crate::migration::{MigrationGate, MigrationStatus};
use crate::rollback::{RollbackEngine, RollbackOutcome};
use crate::scheduler::Poller;
use crate::session::TrackingSession;
use cadtrail_host::{DocumentHost, InspectorSet};
use cadtrail_snapshot::{
    compare, ChangeEvent, DocumentSnapshot, FeatureDiff, HistoryIndexEntry, SnapshotId,
    SnapshotKind,
};
use cadtrail_storage::{HistoryStats, HistoryStore, PurgeReport, StorageError};
use cadtrail_util::path::document_key;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Summary of the session started by [`Tracker::start_tracking`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub document_path: PathBuf,
    pub snapshot_count: usize,
    pub current_snapshot_id: Option<SnapshotId>,
}

/// What one poll found.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    pub events: Vec<ChangeEvent>,
    /// Snapshot committed because the change threshold was reached.
    pub auto_snapshot: Option<DocumentSnapshot>,
}

/// Components shared by the tracker and its poll loop.
#[derive(Clone)]
struct Engine {
    detector: ChangeDetector,
    manager: SnapshotManager,
    rollback: RollbackEngine,
    auto_snapshot_threshold: usize,
}

struct ActiveSession {
    session: TrackingSession,
    host: Box<dyn DocumentHost>,
}

type SharedSession = Arc<Mutex<ActiveSession>>;

struct Tracking {
    shared: SharedSession,
    poller: Poller,
    session_id: String,
    document_path: PathBuf,
}

/// Tracks one document at a time.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    settings: TrackerSettings,
    store: Arc<HistoryStore>,
    engine: Engine,
    bus: Bus,
    gate: MigrationGate,
    active: tokio::sync::Mutex<Option<Tracking>>,
}

impl Tracker {
    /// Open the history store and start the legacy migration.
    pub async fn new(settings: TrackerSettings) -> CoreResult<Self> {
        Self::with_inspectors(settings, InspectorSet::default()).await
    }

    pub async fn with_inspectors(
        settings: TrackerSettings,
        inspectors: InspectorSet,
    ) -> CoreResult<Self> {
        let data_dir = settings.data_dir.clone();
        let history_root = settings.history_root.clone();
        let store = tokio::task::spawn_blocking(move || HistoryStore::open_in(&data_dir, history_root))
            .await??;
        let store = Arc::new(store);
        let inspectors = Arc::new(inspectors);

        let detector = ChangeDetector::new(
            store.clone(),
            inspectors.clone(),
            settings.tolerance,
            settings.event_batch_size,
        );
        let manager = SnapshotManager::new(store.clone(), inspectors.clone(), settings.max_snapshots);
        let rollback = RollbackEngine::new(manager.clone(), detector.clone(), inspectors);
        let engine = Engine {
            detector,
            manager,
            rollback,
            auto_snapshot_threshold: settings.auto_snapshot_threshold,
        };

        let gate = MigrationGate::spawn(store.clone(), settings.legacy_dir.clone());

        info!(
            db = %store.db_path().display(),
            poll_interval_ms = settings.poll_interval.as_millis() as u64,
            "Tracker ready"
        );

        Ok(Self {
            inner: Arc::new(TrackerInner {
                settings,
                store,
                engine,
                bus: Bus::new(),
                gate,
                active: tokio::sync::Mutex::new(None),
            }),
        })
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.inner.settings
    }

    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.inner.store
    }

    /// Wait for the startup migration and return how it ended.
    pub async fn migration(&self) -> MigrationStatus {
        self.inner.gate.wait().await
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Start tracking the document behind `host`, replacing any current
    /// session.
    ///
    /// Loads the document's chain, committing an initial snapshot when it
    /// has no history, then starts the poll loop.
    pub async fn start_tracking(&self, host: Box<dyn DocumentHost>) -> CoreResult<SessionInfo> {
        let mut slot = self.inner.active.lock().await;
        if let Some(previous) = slot.take() {
            self.shutdown(previous).await;
        }

        if let MigrationStatus::Failed(message) = self.inner.gate.wait().await {
            warn!(error = %message, "Tracking without migrated legacy history");
        }

        let engine = self.inner.engine.clone();
        let (active, initial) = tokio::task::spawn_blocking(move || -> CoreResult<_> {
            let path = host
                .document_path()?
                .ok_or(CoreError::MissingDocumentPath)?;
            let mut session = TrackingSession::new(path);
            engine.detector.prime(&mut session, &*host)?;
            let initial = engine.manager.load(&mut session, &*host)?;
            Ok((ActiveSession { session, host }, initial))
        })
        .await??;

        let info = SessionInfo {
            session_id: active.session.id.clone(),
            document_path: active.session.document_path.clone(),
            snapshot_count: active.session.chain.len(),
            current_snapshot_id: active.session.chain.current().map(|s| s.id.clone()),
        };

        let shared = Arc::new(Mutex::new(active));
        let poller = self.spawn_poller(shared.clone(), info.document_path.clone());
        *slot = Some(Tracking {
            shared,
            poller,
            session_id: info.session_id.clone(),
            document_path: info.document_path.clone(),
        });
        drop(slot);

        info!(
            session = %info.session_id,
            document = %info.document_path.display(),
            snapshots = info.snapshot_count,
            "Tracking started"
        );

        if let Some(initial) = &initial {
            self.inner
                .bus
                .publish(SnapshotCreated::from_snapshot(initial))
                .await;
        }
        self.inner
            .bus
            .publish(TrackingStarted {
                session_id: info.session_id.clone(),
                document_path: info.document_path.clone(),
                snapshot_count: info.snapshot_count,
            })
            .await;

        Ok(info)
    }

    /// Stop the poll loop and flush buffered events.
    ///
    /// Returns `false` when nothing was being tracked.
    pub async fn stop_tracking(&self) -> CoreResult<bool> {
        let previous = self.inner.active.lock().await.take();
        match previous {
            Some(tracking) => {
                self.shutdown(tracking).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn is_tracking(&self) -> bool {
        self.inner.active.lock().await.is_some()
    }

    /// Path of the tracked document.
    pub async fn current_document(&self) -> Option<PathBuf> {
        self.inner
            .active
            .lock()
            .await
            .as_ref()
            .map(|t| t.document_path.clone())
    }

    async fn shutdown(&self, tracking: Tracking) {
        if !tracking.poller.is_running() {
            debug!(session = %tracking.session_id, "Poll loop had already ended");
        }
        tracking.poller.stop().await;

        let result = run_blocking(
            tracking.shared.clone(),
            self.inner.engine.clone(),
            |engine, active| {
                engine.detector.flush(&mut active.session, true);
                Ok(active.session.pending_events.len())
            },
        )
        .await;
        match result {
            Ok(0) => {}
            Ok(unsaved) => warn!(
                document = %tracking.document_path.display(),
                unsaved,
                "Change events could not be written before stopping"
            ),
            Err(e) => warn!(error = %e, "Failed to flush change events on stop"),
        }

        info!(
            session = %tracking.session_id,
            document = %tracking.document_path.display(),
            "Tracking stopped"
        );
        self.inner
            .bus
            .publish(TrackingStopped {
                session_id: tracking.session_id,
                document_path: tracking.document_path,
            })
            .await;
    }

    fn spawn_poller(&self, shared: SharedSession, document_path: PathBuf) -> Poller {
        let engine = self.inner.engine.clone();
        let bus = self.inner.bus.clone();

        Poller::spawn(self.inner.settings.poll_interval, move || {
            let shared = shared.clone();
            let engine = engine.clone();
            let bus = bus.clone();
            let document_path = document_path.clone();
            async move {
                match run_blocking(shared, engine, poll_once).await {
                    Ok(report) => {
                        publish_poll(&bus, &document_path, &report).await;
                        true
                    }
                    Err(e @ CoreError::LockPoisoned(_)) => {
                        warn!(error = %e, "Session lock poisoned, stopping poll loop");
                        false
                    }
                    Err(e) => {
                        warn!(document = %document_path.display(), error = %e, "Poll failed");
                        true
                    }
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Operations on the tracked document
    // ------------------------------------------------------------------

    async fn active_session(&self) -> CoreResult<(SharedSession, PathBuf)> {
        let slot = self.inner.active.lock().await;
        let tracking = slot.as_ref().ok_or(CoreError::NoActiveSession)?;
        Ok((tracking.shared.clone(), tracking.document_path.clone()))
    }

    async fn with_session<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Engine, &mut ActiveSession) -> CoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (shared, _) = self.active_session().await?;
        run_blocking(shared, self.inner.engine.clone(), f).await
    }

    /// Run one detection pass now, outside the poll schedule.
    pub async fn poll(&self) -> CoreResult<PollReport> {
        let (shared, document_path) = self.active_session().await?;
        let report = run_blocking(shared, self.inner.engine.clone(), poll_once).await?;
        publish_poll(&self.inner.bus, &document_path, &report).await;
        Ok(report)
    }

    /// Commit a snapshot of the live document.
    pub async fn create_manual_snapshot(
        &self,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> CoreResult<DocumentSnapshot> {
        let description = description.into();
        let snapshot = self
            .with_session(move |engine, active| {
                let ActiveSession { session, host } = active;
                engine.manager.commit(
                    session,
                    &**host,
                    &description,
                    SnapshotKind::Manual,
                    tags,
                )
            })
            .await?;
        self.inner
            .bus
            .publish(SnapshotCreated::from_snapshot(&snapshot))
            .await;
        Ok(snapshot)
    }

    /// Restore the tracked document to a snapshot.
    ///
    /// Edits made since the current snapshot are saved as a `BeforeRollback`
    /// snapshot first. That commit would drop every snapshot after the
    /// current one, so rolling forward over unsaved edits is refused: the
    /// outcome fails with a "document has changes" message and the document
    /// is left as it was.
    pub async fn rollback_to(&self, id: &SnapshotId) -> CoreResult<RollbackOutcome> {
        let id = id.clone();
        self.navigate(move |engine, session, host| engine.rollback.rollback_to(session, host, &id))
            .await
    }

    /// Step back to the previous snapshot.
    pub async fn undo(&self) -> CoreResult<RollbackOutcome> {
        self.navigate(|engine, session, host| engine.rollback.undo(session, host))
            .await
    }

    /// Step forward to the next snapshot.
    ///
    /// Refused while the document has edits since the current snapshot, as
    /// described on [`Tracker::rollback_to`].
    pub async fn redo(&self) -> CoreResult<RollbackOutcome> {
        self.navigate(|engine, session, host| engine.rollback.redo(session, host))
            .await
    }

    async fn navigate<F>(&self, step: F) -> CoreResult<RollbackOutcome>
    where
        F: FnOnce(&Engine, &mut TrackingSession, &mut dyn DocumentHost) -> RollbackOutcome
            + Send
            + 'static,
    {
        let (shared, document_path) = self.active_session().await?;
        let outcome = run_blocking(shared, self.inner.engine.clone(), move |engine, active| {
            let ActiveSession { session, host } = active;
            Ok(step(engine, session, &mut **host))
        })
        .await?;

        if let Some(guard) = &outcome.guard_snapshot {
            self.inner
                .bus
                .publish(SnapshotCreated::from_snapshot(guard))
                .await;
        }
        if let Some(target) = &outcome.target_snapshot_id {
            self.inner
                .bus
                .publish(RollbackCompleted {
                    document_path,
                    target_snapshot_id: target.clone(),
                    outcome: outcome.clone(),
                })
                .await;
        }
        Ok(outcome)
    }

    pub async fn can_undo(&self) -> CoreResult<bool> {
        self.with_session(|_, active| Ok(active.session.chain.can_undo()))
            .await
    }

    pub async fn can_redo(&self) -> CoreResult<bool> {
        self.with_session(|_, active| Ok(active.session.chain.can_redo()))
            .await
    }

    /// Snapshots of the tracked document's chain, oldest first.
    pub async fn chain(&self) -> CoreResult<Vec<DocumentSnapshot>> {
        self.with_session(|_, active| Ok(active.session.chain.snapshots().to_vec()))
            .await
    }

    /// The snapshot the tracked document was last committed or rolled to.
    pub async fn current_snapshot(&self) -> CoreResult<Option<DocumentSnapshot>> {
        self.with_session(|_, active| Ok(active.session.chain.current().cloned()))
            .await
    }

    /// Persisted history of the tracked document, most recent first.
    pub async fn get_history(&self) -> CoreResult<Vec<HistoryIndexEntry>> {
        let (_, document_path) = self.active_session().await?;
        self.history_for(&document_path).await
    }

    /// Change events of the tracked document, including buffered ones.
    pub async fn change_events(&self) -> CoreResult<Vec<ChangeEvent>> {
        self.flush_pending().await?;
        let (_, document_path) = self.active_session().await?;
        self.events_for(&document_path, None).await
    }

    /// Change events of one feature of the tracked document.
    pub async fn feature_events(&self, feature: &str) -> CoreResult<Vec<ChangeEvent>> {
        self.flush_pending().await?;
        let (_, document_path) = self.active_session().await?;
        self.events_for(&document_path, Some(feature)).await
    }

    async fn flush_pending(&self) -> CoreResult<usize> {
        self.with_session(|engine, active| Ok(engine.detector.flush(&mut active.session, true)))
            .await
    }

    // ------------------------------------------------------------------
    // Queries on any document's stored history
    // ------------------------------------------------------------------

    async fn with_store<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&HistoryStore) -> CoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.gate.wait().await;
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    /// Persisted history of a document, most recent first.
    pub async fn history_for(&self, document: &Path) -> CoreResult<Vec<HistoryIndexEntry>> {
        let document = document.to_path_buf();
        self.with_store(move |store| Ok(store.history(&document)?))
            .await
    }

    /// Logged change events of a document, optionally for one feature.
    pub async fn events_for(
        &self,
        document: &Path,
        feature: Option<&str>,
    ) -> CoreResult<Vec<ChangeEvent>> {
        let document = document.to_path_buf();
        let feature = feature.map(str::to_string);
        self.with_store(move |store| {
            let events = match feature {
                Some(feature) => store.feature_events(&document, &feature)?,
                None => store.load_change_events(&document)?,
            };
            Ok(events)
        })
        .await
    }

    /// Load a snapshot, from the tracked chain when possible.
    pub async fn snapshot(&self, id: &SnapshotId) -> CoreResult<DocumentSnapshot> {
        let id = id.clone();
        if let Ok((shared, _)) = self.active_session().await {
            let lookup = id.clone();
            let cached = run_blocking(shared, self.inner.engine.clone(), move |_, active| {
                Ok(active.session.chain.find(&lookup).cloned())
            })
            .await?;
            if let Some(snapshot) = cached {
                return Ok(snapshot);
            }
        }
        self.with_store(move |store| load_stored(store, &id)).await
    }

    /// Feature-level differences from snapshot `a` to snapshot `b`.
    pub async fn compare(&self, a: &SnapshotId, b: &SnapshotId) -> CoreResult<Vec<FeatureDiff>> {
        let old = self.snapshot(a).await?;
        let new = self.snapshot(b).await?;
        Ok(compare(&old, &new, self.inner.settings.tolerance))
    }

    pub async fn history_stats(&self, document: &Path) -> CoreResult<HistoryStats> {
        let document = document.to_path_buf();
        self.with_store(move |store| Ok(store.history_stats(&document)?))
            .await
    }

    /// Delete every snapshot and event of a document.
    ///
    /// Tracking stops first when the document is the tracked one.
    pub async fn purge_history(&self, document: &Path) -> CoreResult<PurgeReport> {
        let tracked = self
            .current_document()
            .await
            .is_some_and(|current| document_key(&current) == document_key(document));
        if tracked {
            debug!(document = %document.display(), "Stopping tracking before purge");
            self.stop_tracking().await?;
        }

        let document = document.to_path_buf();
        self.with_store(move |store| Ok(store.purge_history(&document)?))
            .await
    }
}

async fn run_blocking<T, F>(shared: SharedSession, engine: Engine, f: F) -> CoreResult<T>
where
    F: FnOnce(&Engine, &mut ActiveSession) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut active = shared
            .lock()
            .map_err(|e| CoreError::LockPoisoned(e.to_string()))?;
        f(&engine, &mut active)
    })
    .await?
}

/// One detection pass, committing an automatic snapshot at the threshold.
fn poll_once(engine: &Engine, active: &mut ActiveSession) -> CoreResult<PollReport> {
    let ActiveSession { session, host } = active;
    let events = engine.detector.poll(session, &**host)?;

    let threshold = engine.auto_snapshot_threshold;
    let mut auto_snapshot = None;
    if threshold > 0 && session.events_since_snapshot >= threshold {
        let description = format!("Auto snapshot after {} changes", session.events_since_snapshot);
        match engine
            .manager
            .commit(session, &**host, &description, SnapshotKind::Auto, Vec::new())
        {
            Ok(snapshot) => auto_snapshot = Some(snapshot),
            Err(e) => warn!(error = %e, "Failed to commit automatic snapshot"),
        }
    }

    Ok(PollReport {
        events,
        auto_snapshot,
    })
}

async fn publish_poll(bus: &Bus, document_path: &Path, report: &PollReport) {
    if !report.events.is_empty() {
        bus.publish(FeaturesChanged::from_events(document_path, &report.events))
            .await;
    }
    if let Some(snapshot) = &report.auto_snapshot {
        bus.publish(SnapshotCreated::from_snapshot(snapshot)).await;
    }
}

fn load_stored(store: &HistoryStore, id: &SnapshotId) -> CoreResult<DocumentSnapshot> {
    match store.load_snapshot(id) {
        Ok(snapshot) => Ok(snapshot),
        Err(StorageError::NotFound(_)) => Err(CoreError::snapshot_not_found(id.as_str())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadtrail_snapshot::{ChangeKind, DiffKind};
    use cadtrail_test_utils::{fixtures, MockDocument, MockFeature, TestHistory};
    use std::time::Duration;

    fn settings(history: &TestHistory) -> TrackerSettings {
        let mut settings = TrackerSettings::with_data_dir(history.data_dir());
        settings.history_root = Some(history.history_root());
        settings.legacy_dir = history.legacy_dir();
        // Tests drive detection through `poll`
        settings.poll_interval = Duration::from_secs(3600);
        settings
    }

    async fn tracking(history: &TestHistory) -> (Tracker, MockDocument) {
        let tracker = Tracker::new(settings(history)).await.unwrap();
        let doc = fixtures::bracket_document(history.document("bracket.sldprt"));
        tracker.start_tracking(Box::new(doc.clone())).await.unwrap();
        (tracker, doc)
    }

    #[tokio::test]
    async fn start_commits_initial_snapshot_and_publishes() {
        let history = TestHistory::new();
        let tracker = Tracker::new(settings(&history)).await.unwrap();
        let mut started = tracker.bus().subscribe::<TrackingStarted>().await;
        let mut created = tracker.bus().subscribe::<SnapshotCreated>().await;

        let doc = fixtures::bracket_document(history.document("bracket.sldprt"));
        let info = tracker.start_tracking(Box::new(doc)).await.unwrap();

        assert_eq!(info.snapshot_count, 1);
        assert!(info.session_id.starts_with("trk_"));
        assert_eq!(started.recv().await.unwrap().snapshot_count, 1);
        assert_eq!(created.recv().await.unwrap().kind, SnapshotKind::Initial);
        assert!(tracker.is_tracking().await);
    }

    #[tokio::test]
    async fn unsaved_document_is_rejected() {
        let history = TestHistory::new();
        let tracker = Tracker::new(settings(&history)).await.unwrap();

        let result = tracker.start_tracking(Box::new(MockDocument::unsaved())).await;
        assert!(matches!(result, Err(CoreError::MissingDocumentPath)));
        assert!(!tracker.is_tracking().await);
    }

    #[tokio::test]
    async fn operations_need_a_session() {
        let history = TestHistory::new();
        let tracker = Tracker::new(settings(&history)).await.unwrap();

        assert!(matches!(tracker.undo().await, Err(CoreError::NoActiveSession)));
        assert!(matches!(tracker.get_history().await, Err(CoreError::NoActiveSession)));
        assert!(!tracker.stop_tracking().await.unwrap());
    }

    #[tokio::test]
    async fn poll_reports_and_logs_changes() {
        let history = TestHistory::new();
        let (tracker, doc) = tracking(&history).await;
        let mut changed = tracker.bus().subscribe::<FeaturesChanged>().await;

        doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        let report = tracker.poll().await.unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(changed.recv().await.unwrap().added, vec!["Fillet1"]);

        let events = tracker.feature_events("Fillet1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Added);
    }

    #[tokio::test]
    async fn auto_snapshot_at_threshold() {
        let history = TestHistory::new();
        let mut settings = settings(&history);
        settings.auto_snapshot_threshold = 2;
        let tracker = Tracker::new(settings).await.unwrap();
        let doc = fixtures::bracket_document(history.document("bracket.sldprt"));
        tracker.start_tracking(Box::new(doc.clone())).await.unwrap();

        doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        assert!(tracker.poll().await.unwrap().auto_snapshot.is_none());

        doc.set_fillet_radius("Fillet1", 3.0);
        let auto = tracker.poll().await.unwrap().auto_snapshot.unwrap();
        assert_eq!(auto.kind, SnapshotKind::Auto);
        assert_eq!(auto.version, 2);
        assert_eq!(tracker.chain().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn restart_reloads_chain_at_tail() {
        let history = TestHistory::new();
        let (tracker, doc) = tracking(&history).await;
        let manual = tracker.create_manual_snapshot("Checkpoint", vec![]).await.unwrap();
        tracker.stop_tracking().await.unwrap();

        let info = tracker.start_tracking(Box::new(doc)).await.unwrap();
        assert_eq!(info.snapshot_count, 2);
        assert_eq!(info.current_snapshot_id, Some(manual.id));
        assert!(tracker.can_undo().await.unwrap());
        assert!(!tracker.can_redo().await.unwrap());
    }

    #[tokio::test]
    async fn rollback_publishes_guard_and_completion() {
        let history = TestHistory::new();
        let (tracker, doc) = tracking(&history).await;
        let initial = tracker.current_snapshot().await.unwrap().unwrap();
        let mut created = tracker.bus().subscribe::<SnapshotCreated>().await;
        let mut completed = tracker.bus().subscribe::<RollbackCompleted>().await;

        doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        let outcome = tracker.rollback_to(&initial.id).await.unwrap();

        assert!(outcome.success);
        assert_eq!(created.recv().await.unwrap().kind, SnapshotKind::BeforeRollback);
        assert_eq!(completed.recv().await.unwrap().target_snapshot_id, initial.id);
        assert!(tracker.can_redo().await.unwrap());
    }

    #[tokio::test]
    async fn compare_resolves_from_chain_and_store() {
        let history = TestHistory::new();
        let (tracker, doc) = tracking(&history).await;
        let initial = tracker.current_snapshot().await.unwrap().unwrap();
        doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        let second = tracker.create_manual_snapshot("Fillet", vec![]).await.unwrap();

        let diffs = tracker.compare(&initial.id, &second.id).await.unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::Added);

        tracker.stop_tracking().await.unwrap();
        let diffs = tracker.compare(&second.id, &initial.id).await.unwrap();
        assert_eq!(diffs[0].kind, DiffKind::Removed);

        assert!(matches!(
            tracker.snapshot(&SnapshotId::new()).await,
            Err(CoreError::SnapshotNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn purge_of_tracked_document_stops_tracking() {
        let history = TestHistory::new();
        let (tracker, _doc) = tracking(&history).await;
        let path = history.document("bracket.sldprt");

        let report = tracker.purge_history(&path).await.unwrap();
        assert_eq!(report.snapshots, 1);
        assert!(!tracker.is_tracking().await);
        assert!(tracker.history_for(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_flushes_pending_events() {
        let history = TestHistory::new();
        let (tracker, doc) = tracking(&history).await;
        let path = history.document("bracket.sldprt");

        doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        tracker.poll().await.unwrap();
        assert!(tracker.events_for(&path, None).await.unwrap().is_empty());

        tracker.stop_tracking().await.unwrap();
        assert_eq!(tracker.events_for(&path, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn starting_another_document_replaces_session() {
        let history = TestHistory::new();
        let (tracker, _doc) = tracking(&history).await;
        let mut stopped = tracker.bus().subscribe::<TrackingStopped>().await;

        let other = fixtures::bracket_document(history.document("other.sldprt"));
        tracker.start_tracking(Box::new(other)).await.unwrap();

        assert_eq!(
            stopped.recv().await.unwrap().document_path,
            history.document("bracket.sldprt")
        );
        assert_eq!(
            tracker.current_document().await,
            Some(history.document("other.sldprt"))
        );
    }

    #[tokio::test]
    async fn redo_over_unsaved_edits_is_refused() {
        let history = TestHistory::new();
        let (tracker, doc) = tracking(&history).await;
        doc.set_dimension("Sketch1", "D1@Sketch1", 20.0);
        tracker.create_manual_snapshot("Wider", vec![]).await.unwrap();

        let undone = tracker.undo().await.unwrap();
        assert!(undone.success);
        assert_eq!(doc.dimension("Sketch1", "D1@Sketch1"), Some(10.0));

        doc.set_dimension("Sketch1", "D1@Sketch1", 99.0);
        let outcome = tracker.redo().await.unwrap();

        assert!(!outcome.success);
        assert!(outcome.message.contains("document has changes"));
        assert!(outcome.guard_snapshot.is_none());
        assert_eq!(doc.dimension("Sketch1", "D1@Sketch1"), Some(99.0));
        assert_eq!(tracker.chain().await.unwrap().len(), 2);
        assert!(tracker.can_redo().await.unwrap());
    }
}

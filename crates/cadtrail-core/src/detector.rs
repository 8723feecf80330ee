//! Change detection by polling the live document.
//!
//! Every poll captures the full feature set, classifies it against the
//! previous poll's cache and then replaces the cache, so detection is always
//! relative to the immediately preceding poll.

use crate::error::CoreResult;
use crate::session::TrackingSession;
use cadtrail_host::{capture_features, DocumentHost, InspectorSet};
use cadtrail_snapshot::{has_changed, ChangeEvent, ChangeKind, FeatureState};
use cadtrail_storage::HistoryStore;
use cadtrail_util::{Operation, TimingGuard};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Classify a fresh capture against the cached one.
///
/// Added and modified features follow the fresh tree order; deletions
/// follow, in name order.
pub fn detect(
    document_path: &Path,
    cache: &BTreeMap<String, FeatureState>,
    fresh: &[FeatureState],
    tolerance: f64,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for state in fresh {
        match cache.get(&state.name) {
            None => events.push(ChangeEvent::added(document_path, state.clone())),
            Some(old) if has_changed(old, state, tolerance) => {
                events.push(ChangeEvent::modified(document_path, old.clone(), state.clone()))
            }
            Some(_) => {}
        }
    }

    for (name, old) in cache {
        if !fresh.iter().any(|f| &f.name == name) {
            events.push(ChangeEvent::deleted(document_path, old.clone()));
        }
    }

    events
}

/// Polls a document and feeds the change-event log.
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<HistoryStore>,
    inspectors: Arc<InspectorSet>,
    tolerance: f64,
    batch_size: usize,
}

impl ChangeDetector {
    pub fn new(
        store: Arc<HistoryStore>,
        inspectors: Arc<InspectorSet>,
        tolerance: f64,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            inspectors,
            tolerance,
            batch_size: batch_size.max(1),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Capture every tracked feature of the live document.
    pub fn capture(&self, host: &dyn DocumentHost) -> CoreResult<Vec<FeatureState>> {
        let _timing = TimingGuard::new(Operation::Capture, "live document");
        Ok(capture_features(host, &self.inspectors)?)
    }

    /// Seed the cache without emitting events.
    pub fn prime(&self, session: &mut TrackingSession, host: &dyn DocumentHost) -> CoreResult<()> {
        let features = self.capture(host)?;
        session.replace_cache(features);
        Ok(())
    }

    /// Capture, classify and buffer change events.
    ///
    /// Returns the events detected by this poll. Buffered events are flushed
    /// once a batch is full or when a deletion is seen.
    pub fn poll(
        &self,
        session: &mut TrackingSession,
        host: &dyn DocumentHost,
    ) -> CoreResult<Vec<ChangeEvent>> {
        let fresh = self.capture(host)?;
        let events = detect(&session.document_path, &session.feature_cache, &fresh, self.tolerance);
        session.replace_cache(fresh);

        if events.is_empty() {
            return Ok(events);
        }

        debug!(
            document = %session.document_path.display(),
            count = events.len(),
            "Detected feature changes"
        );
        session.pending_events.extend(events.iter().cloned());
        session.events_since_snapshot += events.len();

        let has_deletion = events.iter().any(|e| e.kind == ChangeKind::Deleted);
        self.flush(session, has_deletion);
        Ok(events)
    }

    /// Write buffered events to the log.
    ///
    /// Without `force` only a full batch is written. A failed write keeps
    /// the events buffered for the next attempt. Returns how many events
    /// left the buffer.
    pub fn flush(&self, session: &mut TrackingSession, force: bool) -> usize {
        let pending = session.pending_events.len();
        if pending == 0 || (!force && pending < self.batch_size) {
            return 0;
        }

        match self.store.append_change_events(&session.pending_events) {
            Ok(_) => {
                session.pending_events.clear();
                pending
            }
            Err(e) => {
                warn!(
                    document = %session.document_path.display(),
                    pending,
                    error = %e,
                    "Failed to write change events, keeping them buffered"
                );
                0
            }
        }
    }
}

//! Per-document tracking state.

use cadtrail_snapshot::{ChangeEvent, DocumentSnapshot, FeatureState, SnapshotId};
use cadtrail_util::Identifier;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Linear snapshot history of one document with a current position.
///
/// `current` always indexes a snapshot while the chain is non-empty.
#[derive(Debug, Clone, Default)]
pub struct SnapshotChain {
    snapshots: Vec<DocumentSnapshot>,
    current: usize,
}

impl SnapshotChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from snapshots in chronological order, positioned at
    /// the tail.
    pub fn from_snapshots(snapshots: Vec<DocumentSnapshot>) -> Self {
        let current = snapshots.len().saturating_sub(1);
        Self { snapshots, current }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[DocumentSnapshot] {
        &self.snapshots
    }

    /// Current position, `None` for an empty chain.
    pub fn current_index(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.current)
    }

    pub fn current(&self) -> Option<&DocumentSnapshot> {
        self.snapshots.get(self.current)
    }

    pub fn get(&self, index: usize) -> Option<&DocumentSnapshot> {
        self.snapshots.get(index)
    }

    pub fn position(&self, id: &SnapshotId) -> Option<usize> {
        self.snapshots.iter().position(|s| &s.id == id)
    }

    pub fn find(&self, id: &SnapshotId) -> Option<&DocumentSnapshot> {
        self.snapshots.iter().find(|s| &s.id == id)
    }

    pub fn can_undo(&self) -> bool {
        !self.is_empty() && self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.is_empty() && self.current + 1 < self.snapshots.len()
    }

    /// Version for the next committed snapshot.
    ///
    /// `len + 1`, but never at or below the tail's version so numbers stay
    /// increasing after eviction.
    pub fn next_version(&self) -> u32 {
        let by_length = u32::try_from(self.snapshots.len() + 1).unwrap_or(u32::MAX);
        let after_tail = self
            .snapshots
            .last()
            .map_or(1, |s| s.version.saturating_add(1));
        by_length.max(after_tail)
    }

    /// Drop every snapshot after the current position and return them.
    pub fn truncate_after_current(&mut self) -> Vec<DocumentSnapshot> {
        if self.is_empty() || self.current + 1 >= self.snapshots.len() {
            return Vec::new();
        }
        self.snapshots.split_off(self.current + 1)
    }

    /// Append at the tail and move the position there.
    pub fn push(&mut self, snapshot: DocumentSnapshot) {
        self.snapshots.push(snapshot);
        self.current = self.snapshots.len() - 1;
    }

    /// Evict from the head until at most `max` snapshots remain, shifting
    /// the position with them. Returns the evicted snapshots.
    pub fn evict_over(&mut self, max: usize) -> Vec<DocumentSnapshot> {
        let excess = self.snapshots.len().saturating_sub(max.max(1));
        if excess == 0 {
            return Vec::new();
        }
        let evicted: Vec<DocumentSnapshot> = self.snapshots.drain(..excess).collect();
        self.current = self.current.saturating_sub(excess);
        evicted
    }

    /// Move the position; ignored when out of range.
    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.snapshots.len() {
            self.current = index;
            true
        } else {
            false
        }
    }
}

/// Live tracking state of one document.
#[derive(Debug)]
pub struct TrackingSession {
    pub id: String,
    pub document_path: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Features seen by the latest poll, keyed by name.
    pub feature_cache: BTreeMap<String, FeatureState>,
    pub last_feature_count: usize,
    pub chain: SnapshotChain,
    /// Detected events not yet written to the change log.
    pub pending_events: Vec<ChangeEvent>,
    /// Events detected since the last committed snapshot.
    pub events_since_snapshot: usize,
}

impl TrackingSession {
    pub fn new(document_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Identifier::session(),
            document_path: document_path.into(),
            started_at: Utc::now(),
            feature_cache: BTreeMap::new(),
            last_feature_count: 0,
            chain: SnapshotChain::new(),
            pending_events: Vec::new(),
            events_since_snapshot: 0,
        }
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Replace the cache with a fresh capture.
    pub fn replace_cache(&mut self, features: Vec<FeatureState>) {
        self.last_feature_count = features.len();
        self.feature_cache = features.into_iter().map(|f| (f.name.clone(), f)).collect();
    }

    /// Whether the live features differ from the current snapshot's.
    ///
    /// An empty chain is dirty as soon as anything is tracked.
    pub fn is_dirty(&self, live: &[FeatureState], tolerance: f64) -> bool {
        match self.chain.current() {
            Some(current) => features_differ(&current.features, live, tolerance),
            None => !live.is_empty(),
        }
    }
}

/// Compare two feature sets by name, ignoring capture timestamps.
pub fn features_differ(a: &[FeatureState], b: &[FeatureState], tolerance: f64) -> bool {
    if a.len() != b.len() {
        return true;
    }
    a.iter().any(|f| {
        b.iter().find(|other| other.name == f.name).map_or(true, |other| {
            !cadtrail_snapshot::diff::property_changes(f, other, tolerance).is_empty()
        })
    })
}

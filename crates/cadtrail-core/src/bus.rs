//! Event bus for tracker notifications.
//!
//! The surrounding application subscribes to typed events (or to every event
//! as JSON) to refresh its history views without polling the tracker.
//!
//! # Example
//!
//! ```ignore
//! let bus = Bus::new();
//!
//! let mut rx = bus.subscribe::<SnapshotCreated>().await;
//! tokio::spawn(async move {
//!     while let Ok(event) = rx.recv().await {
//!         println!("New snapshot: {}", event.snapshot_id);
//!     }
//! });
//! ```

use crate::rollback::RollbackOutcome;
use cadtrail_snapshot::{ChangeEvent, ChangeKind, DocumentSnapshot, SnapshotId, SnapshotKind};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Trait for events that can be published on the bus.
pub trait Event: Clone + Send + Sync + 'static {
    /// Event type name for serialization/logging.
    fn event_type() -> &'static str;
}

/// The event bus for pub/sub communication.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    /// Typed channels by TypeId.
    channels: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    /// Wildcard subscribers (receive all events as JSON).
    wildcard: broadcast::Sender<BusEvent>,
}

/// A serialized event for wildcard subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl Bus {
    pub fn new() -> Self {
        let (wildcard, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                wildcard,
            }),
        }
    }

    /// Publish an event to all subscribers.
    pub async fn publish<E: Event + Serialize>(&self, event: E) {
        let type_id = TypeId::of::<E>();

        let channels = self.inner.channels.read().await;
        if let Some(sender) = channels.get(&type_id) {
            if let Some(tx) = sender.downcast_ref::<broadcast::Sender<E>>() {
                // No receivers is fine
                let _ = tx.send(event.clone());
            }
        }
        drop(channels);

        if let Ok(payload) = serde_json::to_value(&event) {
            let bus_event = BusEvent {
                event_type: E::event_type().to_string(),
                payload,
            };
            let _ = self.inner.wildcard.send(bus_event);
        }
    }

    /// Subscribe to events of type E.
    pub async fn subscribe<E: Event>(&self) -> broadcast::Receiver<E> {
        let type_id = TypeId::of::<E>();

        {
            let channels = self.inner.channels.read().await;
            if let Some(sender) = channels.get(&type_id) {
                if let Some(tx) = sender.downcast_ref::<broadcast::Sender<E>>() {
                    return tx.subscribe();
                }
            }
        }

        let mut channels = self.inner.channels.write().await;
        // Another subscriber may have created it between the two locks
        if let Some(tx) = channels
            .get(&type_id)
            .and_then(|sender| sender.downcast_ref::<broadcast::Sender<E>>())
        {
            return tx.subscribe();
        }
        let (tx, rx) = broadcast::channel::<E>(DEFAULT_CAPACITY);
        channels.insert(type_id, Box::new(tx));
        rx
    }

    /// Subscribe to all events (wildcard).
    pub fn subscribe_all(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.wildcard.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tracker events
// ============================================================================

/// A document started being tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStarted {
    pub session_id: String,
    pub document_path: PathBuf,
    /// Snapshots in the loaded chain.
    pub snapshot_count: usize,
}

impl Event for TrackingStarted {
    fn event_type() -> &'static str {
        "tracking.started"
    }
}

/// Tracking of a document ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStopped {
    pub session_id: String,
    pub document_path: PathBuf,
}

impl Event for TrackingStopped {
    fn event_type() -> &'static str {
        "tracking.stopped"
    }
}

/// A poll detected changes in the live document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesChanged {
    pub document_path: PathBuf,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<String>,
}

impl FeaturesChanged {
    /// Summarize a batch of change events.
    pub fn from_events(document_path: impl Into<PathBuf>, events: &[ChangeEvent]) -> Self {
        let mut changed = Self {
            document_path: document_path.into(),
            ..Default::default()
        };
        for event in events {
            let name = event.feature_name().to_string();
            match event.kind {
                ChangeKind::Added => changed.added.push(name),
                ChangeKind::Deleted => changed.deleted.push(name),
                ChangeKind::Modified => changed.modified.push(name),
            }
        }
        changed
    }
}

impl Event for FeaturesChanged {
    fn event_type() -> &'static str {
        "features.changed"
    }
}

/// A snapshot was committed to the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCreated {
    pub document_path: PathBuf,
    pub snapshot_id: SnapshotId,
    pub kind: SnapshotKind,
    pub version: u32,
    pub description: String,
}

impl SnapshotCreated {
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Self {
        Self {
            document_path: snapshot.document_path.clone(),
            snapshot_id: snapshot.id.clone(),
            kind: snapshot.kind,
            version: snapshot.version,
            description: snapshot.description.clone(),
        }
    }
}

impl Event for SnapshotCreated {
    fn event_type() -> &'static str {
        "snapshot.created"
    }
}

/// A rollback, undo or redo finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackCompleted {
    pub document_path: PathBuf,
    pub target_snapshot_id: SnapshotId,
    pub outcome: RollbackOutcome,
}

impl Event for RollbackCompleted {
    fn event_type() -> &'static str {
        "rollback.completed"
    }
}

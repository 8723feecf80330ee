//! Snapshot data structures.

use crate::FeatureState;
use cadtrail_util::Identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Unique identifier for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    /// Create a new snapshot ID.
    pub fn new() -> Self {
        Self(Identifier::snapshot())
    }

    /// Create a snapshot ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in blob file names.
    pub fn short(&self) -> &str {
        Identifier::short(&self.0)
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What triggered a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// First snapshot of a document's history.
    Initial,
    /// Committed automatically after enough detected changes.
    Auto,
    /// Requested by the user.
    Manual,
    /// Safety capture taken right before a rollback.
    BeforeRollback,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Initial => "initial",
            SnapshotKind::Auto => "auto",
            SnapshotKind::Manual => "manual",
            SnapshotKind::BeforeRollback => "before_rollback",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(SnapshotKind::Initial),
            "auto" => Ok(SnapshotKind::Auto),
            "manual" => Ok(SnapshotKind::Manual),
            "before_rollback" => Ok(SnapshotKind::BeforeRollback),
            other => Err(format!("unknown snapshot kind: {other}")),
        }
    }
}

/// A complete capture of a document's feature tree at one point in time.
///
/// Snapshots are immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub id: SnapshotId,
    pub document_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub kind: SnapshotKind,
    /// 1-based sequence number within the document's chain.
    pub version: u32,
    pub features: Vec<FeatureState>,
    #[serde(default)]
    pub document_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub parent_snapshot_id: Option<SnapshotId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DocumentSnapshot {
    /// Create an empty snapshot with a fresh ID.
    pub fn new(
        document_path: impl Into<PathBuf>,
        description: impl Into<String>,
        kind: SnapshotKind,
        version: u32,
    ) -> Self {
        Self {
            id: SnapshotId::new(),
            document_path: document_path.into(),
            timestamp: Utc::now(),
            description: description.into(),
            kind,
            version,
            features: Vec::new(),
            document_properties: BTreeMap::new(),
            parent_snapshot_id: None,
            tags: Vec::new(),
        }
    }

    /// Set the captured features.
    pub fn with_features(mut self, features: Vec<FeatureState>) -> Self {
        self.features = features;
        self
    }

    /// Set the parent snapshot.
    pub fn with_parent(mut self, parent: Option<SnapshotId>) -> Self {
        self.parent_snapshot_id = parent;
        self
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Look up a feature by name.
    pub fn feature(&self, name: &str) -> Option<&FeatureState> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Check if this snapshot includes a feature.
    pub fn contains_feature(&self, name: &str) -> bool {
        self.feature(name).is_some()
    }
}

/// Lightweight metadata for a snapshot, queryable without decompressing
/// its blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryIndexEntry {
    pub snapshot_id: SnapshotId,
    pub document_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub kind: SnapshotKind,
    pub version: u32,
    pub feature_count: usize,
    /// Compressed size of the blob in bytes.
    pub blob_size: u64,
    pub blob_location: PathBuf,
    #[serde(default)]
    pub parent_snapshot_id: Option<SnapshotId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl HistoryIndexEntry {
    /// Build the index entry for a snapshot persisted at `blob_location`.
    pub fn for_snapshot(snapshot: &DocumentSnapshot, blob_location: &Path, blob_size: u64) -> Self {
        Self {
            snapshot_id: snapshot.id.clone(),
            document_path: snapshot.document_path.clone(),
            timestamp: snapshot.timestamp,
            description: snapshot.description.clone(),
            kind: snapshot.kind,
            version: snapshot.version,
            feature_count: snapshot.features.len(),
            blob_size,
            blob_location: blob_location.to_path_buf(),
            parent_snapshot_id: snapshot.parent_snapshot_id.clone(),
            tags: snapshot.tags.clone(),
        }
    }
}

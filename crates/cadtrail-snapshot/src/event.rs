//! Fine-grained change events produced by the change detector.

use crate::FeatureState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Classification of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(ChangeKind::Added),
            "deleted" => Ok(ChangeKind::Deleted),
            "modified" => Ok(ChangeKind::Modified),
            other => Err(format!("unknown change kind: {other}")),
        }
    }
}

/// One feature's addition, deletion or modification.
///
/// For `Deleted` events `new_state` carries the last state seen before the
/// feature disappeared. `old_state` is only set for `Modified` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
    pub document_path: PathBuf,
    pub new_state: FeatureState,
    #[serde(default)]
    pub old_state: Option<FeatureState>,
}

impl ChangeEvent {
    pub fn added(document_path: impl Into<PathBuf>, state: FeatureState) -> Self {
        Self::build(ChangeKind::Added, document_path.into(), state, None)
    }

    pub fn deleted(document_path: impl Into<PathBuf>, last_state: FeatureState) -> Self {
        Self::build(ChangeKind::Deleted, document_path.into(), last_state, None)
    }

    pub fn modified(
        document_path: impl Into<PathBuf>,
        old_state: FeatureState,
        new_state: FeatureState,
    ) -> Self {
        Self::build(
            ChangeKind::Modified,
            document_path.into(),
            new_state,
            Some(old_state),
        )
    }

    fn build(
        kind: ChangeKind,
        document_path: PathBuf,
        new_state: FeatureState,
        old_state: Option<FeatureState>,
    ) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            document_path,
            new_state,
            old_state,
        }
    }

    /// Name of the feature this event is about.
    pub fn feature_name(&self) -> &str {
        &self.new_state.name
    }
}

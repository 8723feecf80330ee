//! Structured comparison between two snapshots.

use crate::{DocumentSnapshot, FeatureState, ParameterValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a feature differs between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Present only in the newer snapshot.
    Added,
    /// Present only in the older snapshot.
    Removed,
    /// Present in both with different values.
    Modified,
}

/// One property that changed on a modified feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChange {
    /// `suppressed`, `parameter:<key>` or `dimension:<name>`.
    pub property: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Difference entry for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDiff {
    pub feature_name: String,
    pub type_name: String,
    pub kind: DiffKind,
    #[serde(default)]
    pub changes: Vec<PropertyChange>,
}

/// Compare snapshot `a` (older) against snapshot `b` (newer).
///
/// Entries follow `b`'s feature order (additions and modifications),
/// followed by features only present in `a` in `a`'s order. Unchanged
/// features produce no entry.
pub fn compare(a: &DocumentSnapshot, b: &DocumentSnapshot, tolerance: f64) -> Vec<FeatureDiff> {
    let a_map: HashMap<&str, &FeatureState> =
        a.features.iter().map(|f| (f.name.as_str(), f)).collect();
    let b_map: HashMap<&str, &FeatureState> =
        b.features.iter().map(|f| (f.name.as_str(), f)).collect();

    let mut diffs = Vec::new();

    for feature in &b.features {
        match a_map.get(feature.name.as_str()) {
            None => diffs.push(FeatureDiff {
                feature_name: feature.name.clone(),
                type_name: feature.type_name.clone(),
                kind: DiffKind::Added,
                changes: Vec::new(),
            }),
            Some(old) => {
                let changes = property_changes(old, feature, tolerance);
                if !changes.is_empty() {
                    diffs.push(FeatureDiff {
                        feature_name: feature.name.clone(),
                        type_name: feature.type_name.clone(),
                        kind: DiffKind::Modified,
                        changes,
                    });
                }
            }
        }
    }

    for feature in &a.features {
        if !b_map.contains_key(feature.name.as_str()) {
            diffs.push(FeatureDiff {
                feature_name: feature.name.clone(),
                type_name: feature.type_name.clone(),
                kind: DiffKind::Removed,
                changes: Vec::new(),
            });
        }
    }

    diffs
}

/// List every property that differs between two states of one feature.
pub fn property_changes(old: &FeatureState, new: &FeatureState, tolerance: f64) -> Vec<PropertyChange> {
    let mut changes = Vec::new();

    if old.is_suppressed != new.is_suppressed {
        changes.push(PropertyChange {
            property: "suppressed".to_string(),
            old_value: Some(old.is_suppressed.to_string()),
            new_value: Some(new.is_suppressed.to_string()),
        });
    }

    // BTreeMap iteration keeps these sorted by key
    for (key, old_value) in &old.parameters {
        match new.parameters.get(key) {
            Some(new_value) if old_value.approx_eq(new_value, tolerance) => {}
            new_value => changes.push(PropertyChange {
                property: format!("parameter:{key}"),
                old_value: Some(old_value.to_string()),
                new_value: new_value.map(ParameterValue::to_string),
            }),
        }
    }
    for (key, new_value) in &new.parameters {
        if !old.parameters.contains_key(key) {
            changes.push(PropertyChange {
                property: format!("parameter:{key}"),
                old_value: None,
                new_value: Some(new_value.to_string()),
            });
        }
    }

    for old_dim in &old.sketch_dimensions {
        match new.dimension(&old_dim.name) {
            Some(new_dim) if (old_dim.value - new_dim.value).abs() <= tolerance => {}
            new_dim => changes.push(PropertyChange {
                property: format!("dimension:{}", old_dim.name),
                old_value: Some(old_dim.value.to_string()),
                new_value: new_dim.map(|d| d.value.to_string()),
            }),
        }
    }
    for new_dim in &new.sketch_dimensions {
        if old.dimension(&new_dim.name).is_none() {
            changes.push(PropertyChange {
                property: format!("dimension:{}", new_dim.name),
                old_value: None,
                new_value: Some(new_dim.value.to_string()),
            });
        }
    }

    changes
}

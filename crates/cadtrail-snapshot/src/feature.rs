//! Per-feature state captured from the live document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tolerance used when comparing numeric values captured from the host.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// A single type-specific parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl ParameterValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(n) => Some(*n),
            ParameterValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Compare two values, allowing `tolerance` of drift between numbers.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        match (self, other) {
            (ParameterValue::Number(_), _) | (_, ParameterValue::Number(_)) => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => (a - b).abs() <= tolerance,
                    _ => false,
                }
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(b) => write!(f, "{b}"),
            ParameterValue::Integer(i) => write!(f, "{i}"),
            ParameterValue::Number(n) => write!(f, "{n}"),
            ParameterValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Number(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

/// Kind of a sketch dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    #[default]
    Linear,
    Angular,
    Radial,
    Diameter,
    Other,
}

/// A named numeric dimension owned by a feature's sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchDimension {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub kind: DimensionKind,
}

impl SketchDimension {
    pub fn new(name: impl Into<String>, value: f64, kind: DimensionKind) -> Self {
        Self {
            name: name.into(),
            value,
            kind,
        }
    }
}

/// State of one live feature at capture time.
///
/// The feature name is the identity key; it is unique within a document at
/// a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureState {
    pub name: String,
    pub type_name: String,
    pub timestamp: DateTime<Utc>,
    pub is_suppressed: bool,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
    #[serde(default)]
    pub sketch_dimensions: Vec<SketchDimension>,
}

impl FeatureState {
    /// Create a state with only the generic fields populated.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, is_suppressed: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            timestamp: Utc::now(),
            is_suppressed,
            parameters: BTreeMap::new(),
            sketch_dimensions: Vec::new(),
        }
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Add a sketch dimension.
    pub fn with_dimension(mut self, dimension: SketchDimension) -> Self {
        self.sketch_dimensions.push(dimension);
        self
    }

    /// Look up a sketch dimension by name.
    pub fn dimension(&self, name: &str) -> Option<&SketchDimension> {
        self.sketch_dimensions.iter().find(|d| d.name == name)
    }
}

/// Whether `new` differs from `old` for change detection.
///
/// A feature counts as modified when its suppression flag flips, its
/// parameter count changes, a parameter present in both differs, or a sketch
/// dimension present in both (matched by name) moved by more than
/// `tolerance`.
pub fn has_changed(old: &FeatureState, new: &FeatureState, tolerance: f64) -> bool {
    if old.is_suppressed != new.is_suppressed {
        return true;
    }

    if old.parameters.len() != new.parameters.len() {
        return true;
    }

    let parameter_changed = old.parameters.iter().any(|(key, old_value)| {
        new.parameters
            .get(key)
            .is_some_and(|new_value| !old_value.approx_eq(new_value, tolerance))
    });
    if parameter_changed {
        return true;
    }

    old.sketch_dimensions.iter().any(|old_dim| {
        new.dimension(&old_dim.name)
            .is_some_and(|new_dim| (old_dim.value - new_dim.value).abs() > tolerance)
    })
}

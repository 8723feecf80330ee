//! Feature families and the system-feature denylist.

use serde::{Deserialize, Serialize};

/// Feature family, decides which inspector extracts type-specific data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFamily {
    Extrude,
    Revolve,
    Fillet,
    Generic,
}

impl FeatureFamily {
    /// Classify a host type name.
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "Extrusion" | "Boss" | "BossThin" | "Cut" | "CutThin" | "ICE" => FeatureFamily::Extrude,
            "Revolution" | "RevolutionThin" | "RevCut" | "RevCutThin" => FeatureFamily::Revolve,
            "Fillet" | "VarFillet" | "FilletAdv" | "ConstRadiusFillet" => FeatureFamily::Fillet,
            _ => FeatureFamily::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureFamily::Extrude => "extrude",
            FeatureFamily::Revolve => "revolve",
            FeatureFamily::Fillet => "fillet",
            FeatureFamily::Generic => "generic",
        }
    }
}

/// Type-specific data of an extrusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrudeDefinition {
    pub depth: f64,
    /// Direction flipped relative to the sketch normal.
    pub reversed: bool,
    /// End condition such as `Blind`, `ThroughAll` or `UpToSurface`.
    pub end_condition: String,
    #[serde(default)]
    pub second_direction_depth: Option<f64>,
}

/// Type-specific data of a revolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevolveDefinition {
    /// Angle in degrees.
    pub angle: f64,
    pub reversed: bool,
    pub end_condition: String,
}

/// Type-specific data of a fillet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilletDefinition {
    pub radius: f64,
    #[serde(default)]
    pub tangent_propagation: bool,
}

/// Host type names that never represent user history.
const SYSTEM_TYPE_NAMES: &[&str] = &[
    "RefPlane",
    "RefAxis",
    "RefPoint",
    "OriginProfileFeature",
    "MaterialFolder",
    "HistoryFolder",
    "SensorFolder",
    "DocsFolder",
    "CommentsFolder",
    "FavoriteFolder",
    "SelectionSetFolder",
    "DetailCabinet",
    "EqnFolder",
    "InkMarkupFolder",
    "SolidBodyFolder",
    "SurfaceBodyFolder",
    "MateReferenceFolder",
    "EnvFolder",
    "LiveSectionFolder",
];

/// Names of built-in tree nodes, matched exactly.
const SYSTEM_NAMES: &[&str] = &[
    "Origin",
    "Annotations",
    "Lights, Cameras and Scene",
    "Equations",
    "Sensors",
    "History",
    "Comments",
    "Favorites",
    "Selection Sets",
    "Front Plane",
    "Top Plane",
    "Right Plane",
];

/// The material node's name embeds the material, e.g. `Material <not specified>`.
const MATERIAL_NODE_PREFIX: &str = "Material <";

/// Whether a feature is excluded from tracking entirely.
pub fn is_system_feature(type_name: &str, name: &str) -> bool {
    SYSTEM_TYPE_NAMES.contains(&type_name)
        || SYSTEM_NAMES.contains(&name)
        || name.starts_with(MATERIAL_NODE_PREFIX)
}

//! Host CAD document boundary for cadtrail.
//!
//! The host application (the CAD program's automation surface) is only
//! reachable through the [`DocumentHost`] capability trait. Everything the
//! tracker needs from a live document goes through it:
//! - enumerate features in tree order, read their type and suppression
//! - read family-specific definitions (extrude, revolve, fillet)
//! - enumerate and edit sketch dimensions
//! - delete features and trigger a rebuild
//!
//! Feature-specific extraction is done by [`FeatureInspector`]s, one per
//! [`FeatureFamily`]. Adding support for a new feature type means adding a
//! family variant and an inspector, not branching on type names elsewhere.

pub mod capture;
mod error;
pub mod family;
pub mod inspector;

pub use capture::{capture_document, capture_features, CapturedDocument};
pub use error::{HostError, HostResult};
pub use family::{
    is_system_feature, ExtrudeDefinition, FeatureFamily, FilletDefinition, RevolveDefinition,
};
pub use inspector::{FeatureInspector, InspectorSet};

use cadtrail_snapshot::{ParameterValue, SketchDimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Handle to a live feature, as handed out by the host.
///
/// The name is the feature's identity; `index` is its position in the tree
/// at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureHandle {
    pub name: String,
    pub index: usize,
}

impl FeatureHandle {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// Capability set consumed from the host CAD application.
///
/// Implementations wrap the host's automation API. All calls are made from a
/// single thread at a time; the tracker serializes access.
pub trait DocumentHost: Send {
    /// Path of the open document, `None` for a never-saved document.
    fn document_path(&self) -> HostResult<Option<PathBuf>>;

    /// Enumerate features in tree order.
    fn features(&self) -> HostResult<Vec<FeatureHandle>>;

    /// Host type name of a feature (e.g. `Extrusion`, `Fillet`).
    fn feature_type(&self, feature: &FeatureHandle) -> HostResult<String>;

    fn is_suppressed(&self, feature: &FeatureHandle) -> HostResult<bool>;

    fn set_suppressed(&mut self, feature: &FeatureHandle, suppressed: bool) -> HostResult<()>;

    fn extrude_definition(&self, feature: &FeatureHandle) -> HostResult<ExtrudeDefinition> {
        Err(HostError::unsupported(format!("extrude definition of {}", feature.name)))
    }

    fn revolve_definition(&self, feature: &FeatureHandle) -> HostResult<RevolveDefinition> {
        Err(HostError::unsupported(format!("revolve definition of {}", feature.name)))
    }

    fn fillet_definition(&self, feature: &FeatureHandle) -> HostResult<FilletDefinition> {
        Err(HostError::unsupported(format!("fillet definition of {}", feature.name)))
    }

    /// Write back one type-specific parameter.
    fn set_feature_parameter(
        &mut self,
        feature: &FeatureHandle,
        key: &str,
        _value: &ParameterValue,
    ) -> HostResult<()> {
        Err(HostError::unsupported(format!("set {key} on {}", feature.name)))
    }

    /// Dimensions of the sketches owned by a feature.
    fn sketch_dimensions(&self, feature: &FeatureHandle) -> HostResult<Vec<SketchDimension>>;

    fn set_dimension_value(
        &mut self,
        feature: &FeatureHandle,
        dimension: &str,
        value: f64,
    ) -> HostResult<()>;

    /// Select and delete a feature.
    fn delete_feature(&mut self, feature: &FeatureHandle) -> HostResult<()>;

    /// Force a full rebuild of the document.
    fn rebuild(&mut self) -> HostResult<()>;

    fn custom_properties(&self) -> HostResult<BTreeMap<String, String>>;
}

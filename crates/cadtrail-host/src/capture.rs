//! Fault-isolated capture of the live feature tree.
//!
//! A failure while reading one feature never aborts the scan: the feature
//! degrades to a state with only its generic fields, and the remaining
//! features are still captured.

use crate::{is_system_feature, DocumentHost, FeatureHandle, HostError, HostResult, InspectorSet};
use cadtrail_snapshot::FeatureState;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Type name recorded when the host cannot report one.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// Full capture of an open document.
#[derive(Debug, Clone)]
pub struct CapturedDocument {
    pub path: PathBuf,
    pub features: Vec<FeatureState>,
    pub properties: BTreeMap<String, String>,
}

/// Capture every tracked feature in tree order.
///
/// Only a failure to enumerate the tree is an error; per-feature failures
/// are logged and degraded.
pub fn capture_features(
    host: &dyn DocumentHost,
    inspectors: &InspectorSet,
) -> HostResult<Vec<FeatureState>> {
    let handles = host.features()?;
    let mut states = Vec::with_capacity(handles.len());

    for handle in &handles {
        if let Some(state) = capture_feature(host, inspectors, handle) {
            states.push(state);
        }
    }

    debug!(
        enumerated = handles.len(),
        captured = states.len(),
        "Captured feature tree"
    );
    Ok(states)
}

/// Capture one feature, `None` if it is a system feature.
fn capture_feature(
    host: &dyn DocumentHost,
    inspectors: &InspectorSet,
    handle: &FeatureHandle,
) -> Option<FeatureState> {
    let type_name = match host.feature_type(handle) {
        Ok(t) => t,
        Err(e) => {
            warn!(feature = %handle.name, error = %e, "Failed to read feature type");
            UNKNOWN_TYPE.to_string()
        }
    };

    if is_system_feature(&type_name, &handle.name) {
        return None;
    }

    let is_suppressed = match host.is_suppressed(handle) {
        Ok(s) => s,
        Err(e) => {
            warn!(feature = %handle.name, error = %e, "Failed to read suppression state");
            false
        }
    };

    let mut state = FeatureState {
        name: handle.name.clone(),
        type_name,
        timestamp: Utc::now(),
        is_suppressed,
        parameters: BTreeMap::new(),
        sketch_dimensions: Vec::new(),
    };

    let inspector = inspectors.for_type(&state.type_name);
    match inspector.inspect(host, handle) {
        Ok(params) => state.parameters = params,
        Err(e) => warn!(
            feature = %handle.name,
            family = inspector.family().as_str(),
            error = %e,
            "Failed to read feature parameters, keeping generic fields"
        ),
    }

    match host.sketch_dimensions(handle) {
        Ok(dims) => state.sketch_dimensions = dims,
        Err(e) => warn!(feature = %handle.name, error = %e, "Failed to read sketch dimensions"),
    }

    Some(state)
}

/// Capture the document path, its features and its custom properties.
pub fn capture_document(
    host: &dyn DocumentHost,
    inspectors: &InspectorSet,
) -> HostResult<CapturedDocument> {
    let path = host.document_path()?.ok_or(HostError::NoDocument)?;
    let features = capture_features(host, inspectors)?;
    let properties = host.custom_properties().unwrap_or_else(|e| {
        warn!(document = %path.display(), error = %e, "Failed to read custom properties");
        BTreeMap::new()
    });

    Ok(CapturedDocument {
        path,
        features,
        properties,
    })
}

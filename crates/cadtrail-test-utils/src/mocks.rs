//! In-memory host document.
//!
//! [`MockDocument`] implements [`DocumentHost`] over a shared feature list.
//! Clones share state, so a test can hand one clone to the tracker and keep
//! editing the "live" document through another.

use crate::MockFeature;
use cadtrail_host::{
    DocumentHost, ExtrudeDefinition, FeatureHandle, FilletDefinition, HostError, HostResult,
    RevolveDefinition,
};
use cadtrail_snapshot::{ParameterValue, SketchDimension};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct DocumentState {
    path: Option<PathBuf>,
    features: Vec<MockFeature>,
    properties: BTreeMap<String, String>,
    rebuilds: usize,
    deleted: Vec<String>,
    fail_inspect: HashSet<String>,
    fail_restore: HashSet<String>,
    fail_enumeration: bool,
    parameter_writes: bool,
}

/// A mock CAD document with fault injection.
///
/// # Example
///
/// ```rust
/// use cadtrail_host::DocumentHost;
/// use cadtrail_test_utils::{MockDocument, MockFeature};
///
/// let doc = MockDocument::new("/parts/a.sldprt")
///     .with_feature(MockFeature::sketch("Sketch1"))
///     .with_feature(MockFeature::extrude("Boss-Extrude1", 10.0));
///
/// let handles = doc.features().unwrap();
/// assert_eq!(handles.len(), 2);
/// assert_eq!(handles[1].name, "Boss-Extrude1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDocument {
    state: Arc<Mutex<DocumentState>>,
}

impl MockDocument {
    /// Create a saved document with no features.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let doc = Self::default();
        doc.lock().path = Some(path.into());
        doc
    }

    /// Create a document that has never been saved.
    pub fn unsaved() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap()
    }

    /// Append a feature (builder form).
    pub fn with_feature(self, feature: MockFeature) -> Self {
        self.add_feature(feature);
        self
    }

    /// Set a custom property (builder form).
    pub fn with_property(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.lock().properties.insert(key.into(), value.into());
        self
    }

    /// Let the host write type-specific parameters back.
    pub fn with_parameter_writes(self) -> Self {
        self.lock().parameter_writes = true;
        self
    }

    /// Append a feature at the end of the tree.
    pub fn add_feature(&self, feature: MockFeature) {
        self.lock().features.push(feature);
    }

    /// Remove a feature behind the tracker's back.
    pub fn remove_feature(&self, name: &str) -> Option<MockFeature> {
        let mut state = self.lock();
        let index = state.features.iter().position(|f| f.name == name)?;
        Some(state.features.remove(index))
    }

    /// Current copy of a feature.
    pub fn feature(&self, name: &str) -> Option<MockFeature> {
        self.lock().features.iter().find(|f| f.name == name).cloned()
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.feature(name).is_some()
    }

    /// Names in tree order.
    pub fn feature_names(&self) -> Vec<String> {
        self.lock().features.iter().map(|f| f.name.clone()).collect()
    }

    /// Edit a feature in place.
    pub fn edit_feature(&self, name: &str, edit: impl FnOnce(&mut MockFeature)) {
        let mut state = self.lock();
        if let Some(feature) = state.features.iter_mut().find(|f| f.name == name) {
            edit(feature);
        }
    }

    pub fn set_fillet_radius(&self, name: &str, radius: f64) {
        self.edit_feature(name, |f| {
            if let Some(fillet) = f.fillet.as_mut() {
                fillet.radius = radius;
            }
        });
    }

    pub fn set_extrude_depth(&self, name: &str, depth: f64) {
        self.edit_feature(name, |f| {
            if let Some(extrude) = f.extrude.as_mut() {
                extrude.depth = depth;
            }
        });
    }

    pub fn suppress(&self, name: &str, suppressed: bool) {
        self.edit_feature(name, |f| f.suppressed = suppressed);
    }

    pub fn set_dimension(&self, feature: &str, dimension: &str, value: f64) {
        self.edit_feature(feature, |f| {
            if let Some(dim) = f.dimensions.iter_mut().find(|d| d.name == dimension) {
                dim.value = value;
            }
        });
    }

    /// Current value of a sketch dimension.
    pub fn dimension(&self, feature: &str, dimension: &str) -> Option<f64> {
        self.feature(feature)?
            .dimensions
            .iter()
            .find(|d| d.name == dimension)
            .map(|d| d.value)
    }

    /// Make family-specific reads fail for a feature.
    pub fn fail_inspect(&self, name: &str) {
        self.lock().fail_inspect.insert(name.to_string());
    }

    /// Make every write to a feature fail.
    pub fn fail_restore(&self, name: &str) {
        self.lock().fail_restore.insert(name.to_string());
    }

    /// Make feature enumeration fail.
    pub fn fail_enumeration(&self, fail: bool) {
        self.lock().fail_enumeration = fail;
    }

    pub fn rebuild_count(&self) -> usize {
        self.lock().rebuilds
    }

    /// Names of features deleted through the host, in order.
    pub fn deleted_features(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    fn read<T>(
        &self,
        handle: &FeatureHandle,
        read: impl FnOnce(&MockFeature) -> HostResult<T>,
    ) -> HostResult<T> {
        let state = self.lock();
        let feature = state
            .features
            .iter()
            .find(|f| f.name == handle.name)
            .ok_or_else(|| HostError::FeatureNotFound(handle.name.clone()))?;
        read(feature)
    }

    fn inspect<T>(
        &self,
        handle: &FeatureHandle,
        read: impl FnOnce(&MockFeature) -> Option<T>,
    ) -> HostResult<T> {
        if self.lock().fail_inspect.contains(&handle.name) {
            return Err(HostError::call_failed(format!("inspect {}", handle.name)));
        }
        self.read(handle, |f| {
            read(f).ok_or_else(|| {
                HostError::call_failed(format!("{} has no such definition", f.name))
            })
        })
    }

    fn write(
        &mut self,
        handle: &FeatureHandle,
        write: impl FnOnce(&mut MockFeature) -> HostResult<()>,
    ) -> HostResult<()> {
        let mut state = self.lock();
        if state.fail_restore.contains(&handle.name) {
            return Err(HostError::call_failed(format!("write {}", handle.name)));
        }
        let feature = state
            .features
            .iter_mut()
            .find(|f| f.name == handle.name)
            .ok_or_else(|| HostError::FeatureNotFound(handle.name.clone()))?;
        write(feature)
    }
}

impl DocumentHost for MockDocument {
    fn document_path(&self) -> HostResult<Option<PathBuf>> {
        Ok(self.lock().path.clone())
    }

    fn features(&self) -> HostResult<Vec<FeatureHandle>> {
        let state = self.lock();
        if state.fail_enumeration {
            return Err(HostError::call_failed("feature enumeration"));
        }
        Ok(state
            .features
            .iter()
            .enumerate()
            .map(|(index, f)| FeatureHandle::new(f.name.clone(), index))
            .collect())
    }

    fn feature_type(&self, feature: &FeatureHandle) -> HostResult<String> {
        self.read(feature, |f| Ok(f.type_name.clone()))
    }

    fn is_suppressed(&self, feature: &FeatureHandle) -> HostResult<bool> {
        self.read(feature, |f| Ok(f.suppressed))
    }

    fn set_suppressed(&mut self, feature: &FeatureHandle, suppressed: bool) -> HostResult<()> {
        self.write(feature, |f| {
            f.suppressed = suppressed;
            Ok(())
        })
    }

    fn extrude_definition(&self, feature: &FeatureHandle) -> HostResult<ExtrudeDefinition> {
        self.inspect(feature, |f| f.extrude.clone())
    }

    fn revolve_definition(&self, feature: &FeatureHandle) -> HostResult<RevolveDefinition> {
        self.inspect(feature, |f| f.revolve.clone())
    }

    fn fillet_definition(&self, feature: &FeatureHandle) -> HostResult<FilletDefinition> {
        self.inspect(feature, |f| f.fillet.clone())
    }

    fn set_feature_parameter(
        &mut self,
        feature: &FeatureHandle,
        key: &str,
        value: &ParameterValue,
    ) -> HostResult<()> {
        if !self.lock().parameter_writes {
            return Err(HostError::unsupported(format!("set {key} on {}", feature.name)));
        }
        let number = value
            .as_f64()
            .ok_or_else(|| HostError::call_failed(format!("{key} is not numeric")))?;
        self.write(feature, |f| {
            let slot = match (key, f.extrude.as_mut(), f.revolve.as_mut(), f.fillet.as_mut()) {
                ("depth", Some(e), _, _) => &mut e.depth,
                ("depth2", Some(e), _, _) => e.second_direction_depth.get_or_insert(0.0),
                ("angle", _, Some(r), _) => &mut r.angle,
                ("radius", _, _, Some(fl)) => &mut fl.radius,
                _ => return Err(HostError::unsupported(format!("set {key} on {}", f.name))),
            };
            *slot = number;
            Ok(())
        })
    }

    fn sketch_dimensions(&self, feature: &FeatureHandle) -> HostResult<Vec<SketchDimension>> {
        self.read(feature, |f| Ok(f.dimensions.clone()))
    }

    fn set_dimension_value(
        &mut self,
        feature: &FeatureHandle,
        dimension: &str,
        value: f64,
    ) -> HostResult<()> {
        self.write(feature, |f| {
            let dim = f
                .dimensions
                .iter_mut()
                .find(|d| d.name == dimension)
                .ok_or_else(|| HostError::DimensionNotFound {
                    feature: f.name.clone(),
                    dimension: dimension.to_string(),
                })?;
            dim.value = value;
            Ok(())
        })
    }

    fn delete_feature(&mut self, feature: &FeatureHandle) -> HostResult<()> {
        let mut state = self.lock();
        let index = state
            .features
            .iter()
            .position(|f| f.name == feature.name)
            .ok_or_else(|| HostError::FeatureNotFound(feature.name.clone()))?;
        state.features.remove(index);
        state.deleted.push(feature.name.clone());
        Ok(())
    }

    fn rebuild(&mut self) -> HostResult<()> {
        self.lock().rebuilds += 1;
        Ok(())
    }

    fn custom_properties(&self) -> HostResult<BTreeMap<String, String>> {
        Ok(self.lock().properties.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let doc = MockDocument::new("/parts/a.sldprt");
        let tracked = doc.clone();
        doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
        assert_eq!(tracked.features().unwrap().len(), 1);
    }

    #[test]
    fn delete_records_and_removes() {
        let mut doc = MockDocument::new("/parts/a.sldprt")
            .with_feature(MockFeature::sketch("Sketch1"))
            .with_feature(MockFeature::fillet("Fillet1", 2.0));

        doc.delete_feature(&FeatureHandle::new("Fillet1", 1)).unwrap();
        assert_eq!(doc.feature_names(), vec!["Sketch1"]);
        assert_eq!(doc.deleted_features(), vec!["Fillet1"]);
    }

    #[test]
    fn parameter_writes_are_opt_in() {
        let mut doc = MockDocument::new("/parts/a.sldprt").with_feature(MockFeature::fillet("Fillet1", 2.0));
        let handle = FeatureHandle::new("Fillet1", 0);

        let err = doc
            .set_feature_parameter(&handle, "radius", &ParameterValue::Number(3.0))
            .unwrap_err();
        assert!(err.is_unsupported());

        let mut doc = doc.with_parameter_writes();
        doc.set_feature_parameter(&handle, "radius", &ParameterValue::Number(3.0))
            .unwrap();
        assert_eq!(doc.feature("Fillet1").unwrap().fillet.unwrap().radius, 3.0);
    }

    #[test]
    fn injected_failures_surface_as_call_failed() {
        let mut doc = MockDocument::new("/parts/a.sldprt").with_feature(MockFeature::extrude("Boss1", 5.0));
        let handle = FeatureHandle::new("Boss1", 0);

        doc.fail_inspect("Boss1");
        assert!(doc.extrude_definition(&handle).is_err());

        doc.fail_restore("Boss1");
        assert!(doc.set_suppressed(&handle, true).is_err());

        doc.fail_enumeration(true);
        assert!(doc.features().is_err());
    }

    #[test]
    fn missing_dimension_is_reported() {
        let mut doc = MockDocument::new("/parts/a.sldprt")
            .with_feature(MockFeature::sketch("Sketch1").with_dimension("D1@Sketch1", 10.0));
        let err = doc
            .set_dimension_value(&FeatureHandle::new("Sketch1", 0), "D9@Sketch1", 1.0)
            .unwrap_err();
        assert!(matches!(err, HostError::DimensionNotFound { .. }));
    }
}

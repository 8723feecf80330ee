//! Family-specific feature inspectors.

use crate::{DocumentHost, FeatureFamily, FeatureHandle, HostResult};
use cadtrail_snapshot::{FeatureState, ParameterValue};
use std::collections::BTreeMap;

/// Parameter map extracted by an inspector.
pub type Parameters = BTreeMap<String, ParameterValue>;

/// Extracts, and where the host allows, restores the type-specific
/// parameters of one feature family.
pub trait FeatureInspector: Send + Sync {
    fn family(&self) -> FeatureFamily;

    /// Read the type-specific parameters of a feature.
    fn inspect(&self, host: &dyn DocumentHost, feature: &FeatureHandle) -> HostResult<Parameters>;

    /// Parameters that can be written back during a rollback.
    fn writable_parameters(&self) -> &'static [&'static str] {
        &[]
    }

    /// Write the target's writable parameters back to the live feature.
    ///
    /// Returns how many parameters were written. Parameters the host cannot
    /// write are skipped.
    fn restore(
        &self,
        host: &mut dyn DocumentHost,
        feature: &FeatureHandle,
        target: &FeatureState,
    ) -> HostResult<usize> {
        let mut written = 0;
        for &key in self.writable_parameters() {
            let Some(value) = target.parameters.get(key) else {
                continue;
            };
            match host.set_feature_parameter(feature, key, value) {
                Ok(()) => written += 1,
                Err(e) if e.is_unsupported() => {
                    tracing::debug!(feature = %feature.name, key, "Host cannot write parameter");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }
}

/// Extrusions: depth, direction and end condition.
pub struct ExtrudeInspector;

impl FeatureInspector for ExtrudeInspector {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Extrude
    }

    fn inspect(&self, host: &dyn DocumentHost, feature: &FeatureHandle) -> HostResult<Parameters> {
        let definition = host.extrude_definition(feature)?;
        let mut params = Parameters::new();
        params.insert("depth".into(), definition.depth.into());
        params.insert("reversed".into(), definition.reversed.into());
        params.insert("end_condition".into(), definition.end_condition.into());
        if let Some(depth2) = definition.second_direction_depth {
            params.insert("depth2".into(), depth2.into());
        }
        Ok(params)
    }

    fn writable_parameters(&self) -> &'static [&'static str] {
        &["depth", "depth2"]
    }
}

/// Revolves: angle, direction and end condition.
pub struct RevolveInspector;

impl FeatureInspector for RevolveInspector {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Revolve
    }

    fn inspect(&self, host: &dyn DocumentHost, feature: &FeatureHandle) -> HostResult<Parameters> {
        let definition = host.revolve_definition(feature)?;
        let mut params = Parameters::new();
        params.insert("angle".into(), definition.angle.into());
        params.insert("reversed".into(), definition.reversed.into());
        params.insert("end_condition".into(), definition.end_condition.into());
        Ok(params)
    }

    fn writable_parameters(&self) -> &'static [&'static str] {
        &["angle"]
    }
}

/// Fillets: radius.
pub struct FilletInspector;

impl FeatureInspector for FilletInspector {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Fillet
    }

    fn inspect(&self, host: &dyn DocumentHost, feature: &FeatureHandle) -> HostResult<Parameters> {
        let definition = host.fillet_definition(feature)?;
        let mut params = Parameters::new();
        params.insert("radius".into(), definition.radius.into());
        params.insert(
            "tangent_propagation".into(),
            definition.tangent_propagation.into(),
        );
        Ok(params)
    }

    fn writable_parameters(&self) -> &'static [&'static str] {
        &["radius"]
    }
}

/// Everything else: only generic fields and sketch dimensions.
pub struct GenericInspector;

impl FeatureInspector for GenericInspector {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Generic
    }

    fn inspect(&self, _host: &dyn DocumentHost, _feature: &FeatureHandle) -> HostResult<Parameters> {
        Ok(Parameters::new())
    }
}

/// One inspector per family.
pub struct InspectorSet {
    extrude: Box<dyn FeatureInspector>,
    revolve: Box<dyn FeatureInspector>,
    fillet: Box<dyn FeatureInspector>,
    generic: Box<dyn FeatureInspector>,
}

impl InspectorSet {
    /// Inspector responsible for a family.
    pub fn get(&self, family: FeatureFamily) -> &dyn FeatureInspector {
        match family {
            FeatureFamily::Extrude => self.extrude.as_ref(),
            FeatureFamily::Revolve => self.revolve.as_ref(),
            FeatureFamily::Fillet => self.fillet.as_ref(),
            FeatureFamily::Generic => self.generic.as_ref(),
        }
    }

    /// Inspector responsible for a host type name.
    pub fn for_type(&self, type_name: &str) -> &dyn FeatureInspector {
        self.get(FeatureFamily::from_type_name(type_name))
    }

    /// Replace the inspector of the family it reports.
    pub fn with_inspector(mut self, inspector: Box<dyn FeatureInspector>) -> Self {
        match inspector.family() {
            FeatureFamily::Extrude => self.extrude = inspector,
            FeatureFamily::Revolve => self.revolve = inspector,
            FeatureFamily::Fillet => self.fillet = inspector,
            FeatureFamily::Generic => self.generic = inspector,
        }
        self
    }
}

impl Default for InspectorSet {
    fn default() -> Self {
        Self {
            extrude: Box::new(ExtrudeInspector),
            revolve: Box::new(RevolveInspector),
            fillet: Box::new(FilletInspector),
            generic: Box::new(GenericInspector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_routes_by_type_name() {
        let set = InspectorSet::default();
        assert_eq!(set.for_type("Extrusion").family(), FeatureFamily::Extrude);
        assert_eq!(set.for_type("Revolution").family(), FeatureFamily::Revolve);
        assert_eq!(set.for_type("Fillet").family(), FeatureFamily::Fillet);
        assert_eq!(set.for_type("Chamfer").family(), FeatureFamily::Generic);
    }

    #[test]
    fn writable_parameters_per_family() {
        let set = InspectorSet::default();
        assert_eq!(set.get(FeatureFamily::Fillet).writable_parameters(), &["radius"]);
        assert!(set.get(FeatureFamily::Generic).writable_parameters().is_empty());
    }

    struct NoopFillet;

    impl FeatureInspector for NoopFillet {
        fn family(&self) -> FeatureFamily {
            FeatureFamily::Fillet
        }

        fn inspect(&self, _: &dyn DocumentHost, _: &FeatureHandle) -> HostResult<Parameters> {
            Ok(Parameters::from([("custom".to_string(), ParameterValue::Bool(true))]))
        }
    }

    #[test]
    fn custom_inspector_replaces_family() {
        let set = InspectorSet::default().with_inspector(Box::new(NoopFillet));
        assert!(set.get(FeatureFamily::Fillet).writable_parameters().is_empty());
    }
}

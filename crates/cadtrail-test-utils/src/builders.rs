//! Builders for mock features.

use cadtrail_host::{ExtrudeDefinition, FilletDefinition, RevolveDefinition};
use cadtrail_snapshot::{DimensionKind, SketchDimension};

/// A feature living in a [`MockDocument`](crate::MockDocument).
///
/// # Example
///
/// ```rust
/// use cadtrail_test_utils::MockFeature;
///
/// let sketch = MockFeature::sketch("Sketch1").with_dimension("D1@Sketch1", 10.0);
/// assert_eq!(sketch.dimensions.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MockFeature {
    pub name: String,
    pub type_name: String,
    pub suppressed: bool,
    pub extrude: Option<ExtrudeDefinition>,
    pub revolve: Option<RevolveDefinition>,
    pub fillet: Option<FilletDefinition>,
    pub dimensions: Vec<SketchDimension>,
}

impl MockFeature {
    /// A feature with only a name and a host type name.
    pub fn generic(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            suppressed: false,
            extrude: None,
            revolve: None,
            fillet: None,
            dimensions: Vec::new(),
        }
    }

    /// A sketch (`ProfileFeature`).
    pub fn sketch(name: impl Into<String>) -> Self {
        Self::generic(name, "ProfileFeature")
    }

    /// A blind extrusion.
    pub fn extrude(name: impl Into<String>, depth: f64) -> Self {
        let mut feature = Self::generic(name, "Extrusion");
        feature.extrude = Some(ExtrudeDefinition {
            depth,
            reversed: false,
            end_condition: "Blind".to_string(),
            second_direction_depth: None,
        });
        feature
    }

    /// A revolve with the given angle in degrees.
    pub fn revolve(name: impl Into<String>, angle: f64) -> Self {
        let mut feature = Self::generic(name, "Revolution");
        feature.revolve = Some(RevolveDefinition {
            angle,
            reversed: false,
            end_condition: "Blind".to_string(),
        });
        feature
    }

    /// A constant-radius fillet.
    pub fn fillet(name: impl Into<String>, radius: f64) -> Self {
        let mut feature = Self::generic(name, "Fillet");
        feature.fillet = Some(FilletDefinition {
            radius,
            tangent_propagation: true,
        });
        feature
    }

    /// A reference plane, filtered out as a system feature.
    pub fn plane(name: impl Into<String>) -> Self {
        Self::generic(name, "RefPlane")
    }

    /// The origin node, filtered out as a system feature.
    pub fn origin() -> Self {
        Self::generic("Origin", "OriginProfileFeature")
    }

    /// Add a linear sketch dimension.
    pub fn with_dimension(mut self, name: impl Into<String>, value: f64) -> Self {
        self.dimensions
            .push(SketchDimension::new(name, value, DimensionKind::Linear));
        self
    }

    /// Start suppressed.
    pub fn suppressed(mut self) -> Self {
        self.suppressed = true;
        self
    }
}

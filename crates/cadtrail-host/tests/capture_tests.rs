//! Feature capture against the in-memory document.

use cadtrail_host::{capture_document, capture_features, HostError, InspectorSet};
use cadtrail_snapshot::ParameterValue;
use cadtrail_test_utils::{fixtures, MockDocument, MockFeature};

#[test]
fn system_features_are_skipped() {
    let doc = fixtures::bracket_document("/parts/bracket.sldprt");
    let states = capture_features(&doc, &InspectorSet::default()).unwrap();

    let names: Vec<&str> = states.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Sketch1", "Boss-Extrude1"]);
}

#[test]
fn family_parameters_and_dimensions_are_captured() {
    let doc = fixtures::bracket_document("/parts/bracket.sldprt")
        .with_feature(MockFeature::fillet("Fillet1", 2.0));
    let states = capture_features(&doc, &InspectorSet::default()).unwrap();

    let sketch = &states[0];
    assert!(sketch.parameters.is_empty());
    assert_eq!(sketch.dimension("D1@Sketch1").unwrap().value, 10.0);

    let extrude = &states[1];
    assert_eq!(extrude.parameters.get("depth"), Some(&ParameterValue::Number(10.0)));
    assert_eq!(
        extrude.parameters.get("end_condition"),
        Some(&ParameterValue::Text("Blind".into()))
    );

    let fillet = &states[2];
    assert_eq!(fillet.parameters.get("radius"), Some(&ParameterValue::Number(2.0)));
}

#[test]
fn failing_feature_degrades_without_aborting() {
    let doc = fixtures::bracket_document("/parts/bracket.sldprt")
        .with_feature(MockFeature::fillet("Fillet1", 2.0));
    doc.fail_inspect("Boss-Extrude1");

    let states = capture_features(&doc, &InspectorSet::default()).unwrap();
    assert_eq!(states.len(), 3);

    let extrude = &states[1];
    assert_eq!(extrude.type_name, "Extrusion");
    assert!(extrude.parameters.is_empty());
    assert_eq!(states[2].parameters.len(), 2);
}

#[test]
fn enumeration_failure_is_an_error() {
    let doc = fixtures::bracket_document("/parts/bracket.sldprt");
    doc.fail_enumeration(true);
    assert!(capture_features(&doc, &InspectorSet::default()).is_err());
}

#[test]
fn document_capture_includes_properties() {
    let doc = fixtures::bracket_document("/parts/bracket.sldprt");
    let captured = capture_document(&doc, &InspectorSet::default()).unwrap();
    assert_eq!(captured.path.to_str(), Some("/parts/bracket.sldprt"));
    assert_eq!(captured.properties.get("PartNo").map(String::as_str), Some("BR-001"));
}

#[test]
fn unsaved_document_cannot_be_captured() {
    let doc = MockDocument::unsaved().with_feature(MockFeature::sketch("Sketch1"));
    let err = capture_document(&doc, &InspectorSet::default()).unwrap_err();
    assert_eq!(err, HostError::NoDocument);
}

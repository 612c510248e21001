use eft_core::errors::{EftError, ErrorInfo};

#[test]
fn shape_errors_name_field_and_cardinality() {
    let err = EftError::shape("merge-shape", "sumW", 6, 4);
    let info = err.info();
    assert_eq!(info.code, "merge-shape");
    assert_eq!(info.context["field"], "sumW");
    assert_eq!(info.context["expected"], "6");
    assert_eq!(info.context["actual"], "4");
    assert!(err.to_string().starts_with("shape mismatch"));
}

#[test]
fn invalid_configuration_surface() {
    let err = EftError::invalid("duplicate-parameter", "parameters", "names repeat");
    assert!(matches!(err, EftError::InvalidConfiguration(_)));
    assert_eq!(err.info().context["field"], "parameters");
}

#[test]
fn errors_round_trip_through_json() {
    let err = EftError::Serde(
        ErrorInfo::new("json-read", "bad document")
            .with_context("path", "model.json")
            .with_hint("regenerate the file"),
    );
    let json = serde_json::to_string(&err).expect("serialize");
    assert!(json.contains("\"family\":\"Serde\""));
    let decoded: EftError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, err);
}

#[test]
fn display_includes_context_and_hint() {
    let info = ErrorInfo::new("X1", "broken")
        .with_context("a", 1)
        .with_hint("fix it");
    assert_eq!(info.to_string(), "broken (code: X1) | context: [a=1] | hint: fix it");
}

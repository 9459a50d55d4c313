//! Property tests for the field validators and schema normalization.

use dbforminator_schema::{
    normalize, validate, FieldError, FieldKind, FieldValidator, FieldValue, RawRecord, RawValue,
    SchemaError, SchemaOptions,
};
use proptest::prelude::*;
use serde_json::{json, Value};

const FORM_YAML: &str = r#"
- id: serial
  label: Serial number
  type: VARCHAR
  max_length: 12
  placeholder: SN-0000
- id: inspected_at
  label: Inspected at
  type: DATETIME
- id: passed
  label: Passed
  type: BOOLEAN
  default: true
- id: torque
  label: Torque (Nm)
  type: DECIMAL
  precision: 1
- id: count
  label: Count
  type: INTEGER
"#;

fn yaml_document(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn test_yaml_schema_normalizes() {
    let schema = normalize(&yaml_document(FORM_YAML), &SchemaOptions::default()).unwrap();
    assert_eq!(schema.len(), 5);
    assert_eq!(
        schema.get("torque").unwrap().kind,
        FieldKind::Decimal { precision: 1 }
    );
    assert_eq!(
        schema.get("passed").unwrap().default,
        Some(RawValue::Flag(true))
    );
    assert_eq!(
        schema.get("serial").unwrap().placeholder.as_deref(),
        Some("SN-0000")
    );
}

#[test]
fn test_scenario_duplicate_id_fails_before_anything_else() {
    let doc = json!([
        {"id": "name", "type": "VARCHAR", "max_length": 10},
        {"id": "age", "type": "INTEGER"},
        {"id": "name", "type": "VARCHAR"},
    ]);
    assert!(matches!(
        normalize(&doc, &SchemaOptions::default()),
        Err(SchemaError::DuplicateFieldId { id }) if id == "name"
    ));
}

#[test]
fn test_scenario_two_failures() {
    let schema = normalize(
        &json!([
            {"id": "name", "type": "VARCHAR", "max_length": 10},
            {"id": "age", "type": "INTEGER"},
        ]),
        &SchemaOptions::default(),
    )
    .unwrap();

    let mut raw = RawRecord::new();
    raw.insert("name".to_string(), RawValue::text("ThisNameIsWayTooLong"));
    raw.insert("age".to_string(), RawValue::text("thirty"));

    let rejected = validate(&schema, &raw).unwrap_err();
    assert_eq!(rejected.len(), 2);
    assert!(matches!(
        rejected.get("name"),
        Some(FieldError::ValueTooLong { .. })
    ));
    assert!(matches!(
        rejected.get("age"),
        Some(FieldError::NotAnInteger { .. })
    ));
}

fn declaration() -> impl Strategy<Value = Value> {
    prop_oneof![
        (1u32..500).prop_map(|n| json!({"type": "VARCHAR", "max_length": n})),
        Just(json!({"type": "INTEGER", "default": "7"})),
        (0u32..=28).prop_map(|p| json!({"type": "DECIMAL", "precision": p})),
        Just(json!({"type": "DECIMAL"})),
        Just(json!({"type": "DATETIME", "label": "When"})),
        any::<bool>().prop_map(|b| json!({"type": "BOOLEAN", "default": b})),
    ]
}

proptest! {
    #[test]
    fn test_varchar_accepts_up_to_max_length(max_length in 1u32..200, extra in 0usize..3) {
        let validator = FieldValidator::new(FieldKind::Varchar { max_length });
        let at_limit = "x".repeat(max_length as usize);
        prop_assert_eq!(
            validator.validate(&RawValue::text(at_limit.clone())),
            Ok(FieldValue::Text(at_limit))
        );

        let shorter = "y".repeat((max_length as usize).saturating_sub(extra));
        prop_assert!(validator.validate(&RawValue::text(shorter)).is_ok());

        let over = "z".repeat(max_length as usize + 1);
        let is_too_long = matches!(
            validator.validate(&RawValue::text(over)),
            Err(FieldError::ValueTooLong { .. })
        );
        prop_assert!(is_too_long);
    }

    #[test]
    fn test_integer_accepts_only_digits(value in "[0-9]{1,18}", junk in "[^0-9]{1,4}") {
        let validator = FieldValidator::new(FieldKind::Integer);
        prop_assert!(validator.validate(&RawValue::text(value.clone())).is_ok());
        let mixed = format!("{}{}", value, junk);
        let rejected = matches!(
            validator.validate(&RawValue::text(mixed)),
            Err(FieldError::NotAnInteger { .. })
        );
        prop_assert!(rejected);
    }

    #[test]
    fn test_normalize_is_idempotent(decls in prop::collection::vec(declaration(), 1..8)) {
        let doc = Value::Array(
            decls
                .into_iter()
                .enumerate()
                .map(|(i, mut decl)| {
                    decl["id"] = json!(format!("field_{}", i));
                    decl
                })
                .collect(),
        );
        let options = SchemaOptions::default();
        let schema = normalize(&doc, &options).unwrap();
        let again = normalize(&schema.to_document(), &options).unwrap();
        prop_assert_eq!(schema, again);
    }
}

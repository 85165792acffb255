mod common;

use serde_json::json;

use common::{application_schema, fixture, registry, yes_no_schema};
use form_spec::{
    ChoiceOption, ComputedRegistry, FieldType, FormSchema, Navigation, Operator, SchemaError,
    StepKind, validate_schema,
};

fn schema_from(value: serde_json::Value) -> FormSchema {
    serde_json::from_value(value).expect("deserialize")
}

#[test]
fn fixture_deserializes_with_every_navigation_kind() {
    let schema = application_schema();
    assert_eq!(schema.name, "equipment-application");
    assert_eq!(schema.start_step_id, "consent");
    assert_eq!(schema.steps.len(), 10);

    let consent = schema.step("consent").expect("consent");
    assert!(matches!(
        &consent.navigation,
        Navigation::Conditional { source_field_id, rules, default_next_step_id: None }
            if source_field_id == "consent" && rules.len() == 2
    ));
    assert_eq!(consent.fields[0].kind, FieldType::Info);

    let need = schema.step("need").expect("need");
    assert!(matches!(
        &need.navigation,
        Navigation::Computed { function, targets } if function == "documents" && targets.len() == 2
    ));
    let condition = need.fields[3].condition.as_ref().expect("condition");
    assert_eq!(condition.operator, Operator::In);

    assert_eq!(
        schema.step("no-consent").map(|step| step.kind),
        Some(StepKind::Terminate)
    );
    assert_eq!(
        schema.step("summary").map(|step| &step.navigation),
        Some(&Navigation::Submit {})
    );
    assert!(schema.field("birth_certificate").is_some_and(|f| f.allow_multiple));
}

#[test]
fn schema_round_trips_through_json() {
    let schema = application_schema();
    let encoded = serde_json::to_value(&schema).expect("serialize");
    let decoded: FormSchema = serde_json::from_value(encoded.clone()).expect("decode");
    assert_eq!(schema, decoded);

    let original: serde_json::Value =
        serde_json::from_str(fixture("application_form")).expect("json");
    assert_eq!(encoded["steps"][1]["type"], original["steps"][1]["type"]);
    assert!(encoded["steps"][0].get("type").is_none());
}

#[test]
fn condition_accepts_source_field_alias() {
    let schema = schema_from(json!({
        "name": "alias",
        "version": "1",
        "start_step_id": "a",
        "steps": [{
            "step_id": "a",
            "title": "A",
            "fields": [{
                "field_id": "x",
                "type": "text",
                "label": "X",
                "condition": { "source_field_id": "y", "operator": "not_equals", "value": "no" }
            }]
        }]
    }));
    let condition = schema.steps[0].fields[0].condition.as_ref().expect("condition");
    assert_eq!(condition.field_id, "y");
    assert_eq!(condition.operator, Operator::NotEquals);
}

#[test]
fn fixture_passes_structural_validation() {
    assert_eq!(validate_schema(&application_schema(), &registry()), Ok(()));
}

#[test]
fn empty_schema_is_rejected() {
    let schema = schema_from(json!({
        "name": "empty",
        "version": "1",
        "start_step_id": "a",
        "steps": []
    }));
    assert_eq!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::Empty)
    );
}

#[test]
fn duplicate_ids_are_rejected() {
    let schema = schema_from(json!({
        "name": "dup",
        "version": "1",
        "start_step_id": "a",
        "steps": [
            { "step_id": "a", "title": "A" },
            { "step_id": "a", "title": "Again" }
        ]
    }));
    assert_eq!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::DuplicateStep("a".into()))
    );

    let schema = schema_from(json!({
        "name": "dup",
        "version": "1",
        "start_step_id": "a",
        "steps": [{
            "step_id": "a",
            "title": "A",
            "fields": [
                { "field_id": "x", "type": "text", "label": "X" },
                { "field_id": "x", "type": "email", "label": "X again" }
            ]
        }]
    }));
    assert_eq!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::DuplicateField {
            step_id: "a".into(),
            field_id: "x".into()
        })
    );
}

#[test]
fn dangling_navigation_is_rejected() {
    let schema = schema_from(json!({
        "name": "dangling",
        "version": "1",
        "start_step_id": "a",
        "steps": [{
            "step_id": "a",
            "title": "A",
            "navigation": { "type": "direct", "next_step_id": "nowhere" }
        }]
    }));
    assert_eq!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::DanglingReference {
            step_id: "a".into(),
            target: "nowhere".into()
        })
    );
}

#[test]
fn choice_fields_need_options() {
    let schema = schema_from(json!({
        "name": "options",
        "version": "1",
        "start_step_id": "a",
        "steps": [{
            "step_id": "a",
            "title": "A",
            "fields": [{ "field_id": "pick", "type": "single_choice_buttons", "label": "Pick" }]
        }]
    }));
    assert!(matches!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::MissingOptions { field_id, .. }) if field_id == "pick"
    ));
}

#[test]
fn options_carry_typed_values() {
    let schema = yes_no_schema();
    assert_eq!(validate_schema(&schema, &ComputedRegistry::new()), Ok(()));

    let consent = schema.field("consent").expect("consent");
    assert_eq!(
        consent.options(),
        [
            ChoiceOption::labeled("Yes, I agree", true),
            ChoiceOption::labeled("No", false),
        ]
    );
    let applicant = schema.field("applicant_type").expect("applicant");
    assert_eq!(applicant.options()[0], ChoiceOption::from("self"));

    let encoded = serde_json::to_value(&schema).expect("encode");
    assert_eq!(
        encoded["steps"][0]["fields"][0]["options"][1],
        json!({ "text": "No", "value": false })
    );
    assert_eq!(encoded["steps"][2]["fields"][0]["options"][0], "self");
}

#[test]
fn rule_values_must_fit_the_source_field() {
    let schema = schema_from(json!({
        "name": "mismatch",
        "version": "1",
        "start_step_id": "consent",
        "steps": [
            {
                "step_id": "consent",
                "title": "Consent",
                "fields": [{
                    "field_id": "consent",
                    "type": "single_choice_buttons",
                    "label": "Consent",
                    "options": ["yes", "no"]
                }],
                "navigation": {
                    "type": "conditional",
                    "source_field_id": "consent",
                    "rules": [
                        { "value": true, "next_step_id": "done" },
                        { "value": false, "next_step_id": "done" }
                    ]
                }
            },
            { "step_id": "done", "title": "Done", "type": "summary" }
        ]
    }));
    assert_eq!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::UnreachableValue {
            step_id: "consent".into(),
            field_id: "consent".into(),
            value: "true".into(),
        })
    );
}

#[test]
fn condition_values_must_fit_the_source_field() {
    let mut schema = yes_no_schema();
    let certificate = schema
        .steps
        .iter_mut()
        .find(|step| step.step_id == "certificate")
        .expect("certificate step");
    certificate.fields[1]
        .condition
        .as_mut()
        .expect("condition")
        .value = form_spec::ConditionValue::One("Yes".into());
    assert!(matches!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::UnreachableValue { field_id, value, .. })
            if field_id == "has_certificate" && value == "'Yes'"
    ));
}

#[test]
fn checkbox_options_need_text_values() {
    let schema = schema_from(json!({
        "name": "checkbox",
        "version": "1",
        "start_step_id": "a",
        "steps": [{
            "step_id": "a",
            "title": "A",
            "fields": [{
                "field_id": "parts",
                "type": "multiple_choice_checkbox",
                "label": "Parts",
                "options": ["wheels", { "text": "None", "value": false }]
            }]
        }]
    }));
    assert!(matches!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::BooleanCheckboxOption { field_id, .. }) if field_id == "parts"
    ));
}

#[test]
fn terminal_steps_lead_with_their_text() {
    let schema = yes_no_schema();
    let consent = schema.step("consent").expect("consent");
    assert!(!consent.is_terminal());
    assert_eq!(consent.headline(), consent.title);

    let refusal = schema.step("no-consent").expect("no-consent");
    assert!(refusal.is_terminal());
    assert_eq!(refusal.headline(), "Without consent we cannot continue.");
    assert!(schema.step("summary").expect("summary").is_terminal());
}

#[test]
fn unknown_start_and_function_are_rejected() {
    let mut schema = application_schema();
    assert_eq!(
        validate_schema(&schema, &ComputedRegistry::new()),
        Err(SchemaError::UnknownFunction {
            step_id: "need".into(),
            function: "documents".into()
        })
    );

    schema.start_step_id = "missing".into();
    assert_eq!(
        validate_schema(&schema, &registry()),
        Err(SchemaError::UnknownStartStep("missing".into()))
    );
}

#[test]
fn json_schema_describes_steps() {
    let schema = schemars::schema_for!(FormSchema);
    let value = serde_json::to_value(&schema).expect("schema json");
    let rendered = value.to_string();
    assert!(rendered.contains("start_step_id"));
    assert!(rendered.contains("next_step_id"));
    assert!(rendered.contains("single_choice_buttons"));
}

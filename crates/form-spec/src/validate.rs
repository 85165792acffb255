use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use thiserror::Error;

use crate::answers::AnswerValue;
use crate::navigation::ComputedRegistry;
use crate::condition::Scalar;
use crate::spec::field::{ChoiceOption, FieldSpec, FieldType};
use crate::spec::schema::FormSchema;
use crate::spec::step::{Navigation, StepSpec};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static PHONE_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d+]").expect("phone noise pattern"));
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+7|7|8)?[0-9]{10}$|^\+[1-9]\d{1,14}$").expect("phone pattern")
});
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})\.(\d{2})\.(\d{4})$").expect("date pattern"));

const EARLIEST_YEAR: i32 = 1900;

/// Structural problems that make a schema unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema has no steps")]
    Empty,
    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),
    #[error("step '{step_id}' declares field '{field_id}' twice")]
    DuplicateField { step_id: String, field_id: String },
    #[error("start step '{0}' is not defined")]
    UnknownStartStep(String),
    #[error("step '{step_id}' navigates to unknown step '{target}'")]
    DanglingReference { step_id: String, target: String },
    #[error("field '{field_id}' in step '{step_id}' needs at least one option")]
    MissingOptions { step_id: String, field_id: String },
    #[error("checkbox '{field_id}' in step '{step_id}' has an option without a text value")]
    BooleanCheckboxOption { step_id: String, field_id: String },
    #[error("step '{step_id}' compares field '{field_id}' with {value}, which it can never hold")]
    UnreachableValue {
        step_id: String,
        field_id: String,
        value: String,
    },
    #[error("step '{step_id}' uses unregistered navigation function '{function}'")]
    UnknownFunction { step_id: String, function: String },
}

/// Checks ids, references, options and computed functions.
pub fn validate_schema(schema: &FormSchema, computed: &ComputedRegistry) -> Result<(), SchemaError> {
    if schema.steps.is_empty() {
        return Err(SchemaError::Empty);
    }

    let mut step_ids = BTreeSet::new();
    for step in &schema.steps {
        if !step_ids.insert(step.step_id.as_str()) {
            return Err(SchemaError::DuplicateStep(step.step_id.clone()));
        }
    }

    if !step_ids.contains(schema.start_step_id.as_str()) {
        return Err(SchemaError::UnknownStartStep(schema.start_step_id.clone()));
    }

    for step in &schema.steps {
        let mut field_ids = BTreeSet::new();
        for field in &step.fields {
            if !field_ids.insert(field.field_id.as_str()) {
                return Err(SchemaError::DuplicateField {
                    step_id: step.step_id.clone(),
                    field_id: field.field_id.clone(),
                });
            }
            if field.kind.requires_options() && field.options().is_empty() {
                return Err(SchemaError::MissingOptions {
                    step_id: step.step_id.clone(),
                    field_id: field.field_id.clone(),
                });
            }
            if field.kind == FieldType::MultipleChoiceCheckbox
                && field.options().iter().any(|option| option.text_value().is_none())
            {
                return Err(SchemaError::BooleanCheckboxOption {
                    step_id: step.step_id.clone(),
                    field_id: field.field_id.clone(),
                });
            }
            if let Some(condition) = &field.condition {
                check_reachable(schema, step, &condition.field_id, condition.values())?;
            }
        }

        if let Navigation::Conditional {
            source_field_id,
            rules,
            ..
        } = &step.navigation
        {
            let values: Vec<Scalar> = rules.iter().map(|rule| rule.value.clone()).collect();
            check_reachable(schema, step, source_field_id, &values)?;
        }

        if let Some(target) = step
            .navigation
            .referenced_steps()
            .into_iter()
            .find(|target| !step_ids.contains(target))
        {
            return Err(SchemaError::DanglingReference {
                step_id: step.step_id.clone(),
                target: target.to_string(),
            });
        }

        if let Navigation::Computed { function, .. } = &step.navigation
            && !computed.contains(function)
        {
            return Err(SchemaError::UnknownFunction {
                step_id: step.step_id.clone(),
                function: function.clone(),
            });
        }
    }

    Ok(())
}

/// Fails when a known source field can never hold one of `values`.
///
/// Unknown source fields are left alone; they may be answered by the host.
fn check_reachable(
    schema: &FormSchema,
    step: &StepSpec,
    source_field_id: &str,
    values: &[Scalar],
) -> Result<(), SchemaError> {
    let Some(source) = schema.field(source_field_id) else {
        return Ok(());
    };
    match values.iter().find(|value| !source.can_produce(value)) {
        Some(value) => Err(SchemaError::UnreachableValue {
            step_id: step.step_id.clone(),
            field_id: source.field_id.clone(),
            value: match value {
                Scalar::Bool(value) => value.to_string(),
                Scalar::Text(value) => format!("'{}'", value),
            },
        }),
        None => Ok(()),
    }
}

/// Rejected field input; the user is asked for the same field again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field_id}: {message}")]
pub struct ValidationError {
    pub field_id: String,
    pub code: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &FieldSpec, code: &str, message: impl Into<String>) -> Self {
        Self {
            field_id: field.field_id.clone(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Parses `DD.MM.YYYY` into a calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let captures = DATE.captures(raw.trim())?;
    let day = captures[1].parse().ok()?;
    let month = captures[2].parse().ok()?;
    let year = captures[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format check for a single answer, applied before it reaches the session.
pub fn validate_field_value(
    field: &FieldSpec,
    value: &AnswerValue,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    match field.kind {
        FieldType::Info => Err(ValidationError::new(
            field,
            "not_collectable",
            "info fields do not take answers",
        )),
        FieldType::Text | FieldType::Textarea => expect_text(field, value).map(|_| ()),
        FieldType::Email => {
            let text = expect_text(field, value)?;
            if EMAIL.is_match(text.trim()) {
                Ok(())
            } else {
                Err(ValidationError::new(
                    field,
                    "invalid_email",
                    "enter a valid email address",
                ))
            }
        }
        FieldType::Phone => {
            let text = expect_text(field, value)?;
            let digits = PHONE_NOISE.replace_all(text, "");
            if PHONE.is_match(&digits) {
                Ok(())
            } else {
                Err(ValidationError::new(
                    field,
                    "invalid_phone",
                    "enter a valid phone number",
                ))
            }
        }
        FieldType::Date => validate_date(field, expect_text(field, value)?, today),
        FieldType::SingleChoiceButtons => match value {
            AnswerValue::Bool(_) | AnswerValue::Text(_) => {
                if field.options().iter().any(|option| option.matches(value)) {
                    Ok(())
                } else {
                    let given = match value {
                        AnswerValue::Bool(value) => value.to_string(),
                        other => other.display(),
                    };
                    Err(invalid_option(field, &given))
                }
            }
            _ => Err(type_mismatch(field)),
        },
        FieldType::MultipleChoiceCheckbox => match value {
            AnswerValue::List(items) => match items.iter().find(|item| {
                !field
                    .options()
                    .iter()
                    .filter_map(ChoiceOption::text_value)
                    .any(|option| option == item.as_str())
            }) {
                Some(unknown) => Err(invalid_option(field, unknown)),
                None => Ok(()),
            },
            _ => Err(type_mismatch(field)),
        },
        FieldType::File => match value {
            AnswerValue::File(_) => Ok(()),
            AnswerValue::Files(_) if field.allow_multiple => Ok(()),
            AnswerValue::Files(_) => Err(ValidationError::new(
                field,
                "multiple_not_allowed",
                "only one file can be attached",
            )),
            _ => Err(type_mismatch(field)),
        },
    }
}

fn expect_text<'a>(field: &FieldSpec, value: &'a AnswerValue) -> Result<&'a str, ValidationError> {
    value.as_str().ok_or_else(|| type_mismatch(field))
}

fn invalid_option(field: &FieldSpec, given: &str) -> ValidationError {
    ValidationError::new(
        field,
        "invalid_option",
        format!("'{}' is not one of: {}", given, field.option_list()),
    )
}

fn type_mismatch(field: &FieldSpec) -> ValidationError {
    ValidationError::new(
        field,
        "type_mismatch",
        format!("unexpected value for a {} field", field.kind.as_str()),
    )
}

fn validate_date(field: &FieldSpec, raw: &str, today: NaiveDate) -> Result<(), ValidationError> {
    let date = parse_date(raw).ok_or_else(|| {
        ValidationError::new(field, "invalid_date", "enter an existing date as DD.MM.YYYY")
    })?;

    let latest = field
        .validation
        .as_ref()
        .and_then(|validation| validation.max_date.as_deref())
        .and_then(parse_date)
        .unwrap_or(today);
    if date > latest {
        return Err(ValidationError::new(
            field,
            "date_in_future",
            "the date cannot be in the future",
        ));
    }

    if date.year() < EARLIEST_YEAR {
        return Err(ValidationError::new(
            field,
            "date_too_early",
            format!("the year cannot be earlier than {}", EARLIEST_YEAR),
        ));
    }

    Ok(())
}

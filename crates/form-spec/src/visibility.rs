use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::AnswerSet;
use crate::spec::field::FieldSpec;
use crate::spec::step::StepSpec;

/// Outcome used when a field condition cannot be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    #[default]
    Visible,
    Hidden,
}

pub fn is_field_visible(field: &FieldSpec, answers: &AnswerSet, mode: VisibilityMode) -> bool {
    let Some(condition) = &field.condition else {
        return true;
    };
    match condition.evaluate(answers) {
        Some(visible) => visible,
        None => {
            tracing::warn!(
                field_id = %field.field_id,
                source_field_id = %condition.field_id,
                operator = ?condition.operator,
                "malformed field condition, falling back to {:?}",
                mode
            );
            matches!(mode, VisibilityMode::Visible)
        }
    }
}

pub fn visible_fields<'a>(
    step: &'a StepSpec,
    answers: &AnswerSet,
    mode: VisibilityMode,
) -> Vec<&'a FieldSpec> {
    step.fields
        .iter()
        .filter(|field| is_field_visible(field, answers, mode))
        .collect()
}

/// Visible required fields still lacking a value, in declaration order.
pub fn missing_required<'a>(
    step: &'a StepSpec,
    answers: &AnswerSet,
    mode: VisibilityMode,
) -> Vec<&'a FieldSpec> {
    visible_fields(step, answers, mode)
        .into_iter()
        .filter(|field| field.is_blocking() && !answers.has_value(&field.field_id))
        .collect()
}

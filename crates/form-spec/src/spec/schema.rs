use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::field::FieldSpec;
use crate::spec::step::{StepId, StepSpec};

/// Top-level questionnaire definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSchema {
    pub name: String,
    pub version: String,
    pub start_step_id: StepId,
    pub steps: Vec<StepSpec>,
}

impl FormSchema {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn step(&self, step_id: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|step| step.step_id == step_id)
    }

    pub fn contains_step(&self, step_id: &str) -> bool {
        self.step(step_id).is_some()
    }

    /// First field with this id in declaration order.
    pub fn field(&self, field_id: &str) -> Option<&FieldSpec> {
        self.steps.iter().find_map(|step| step.field(field_id))
    }
}

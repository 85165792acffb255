use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Scalar;
use crate::spec::field::FieldSpec;

pub type StepId = String;

/// Distinguishes regular question steps from the two terminal shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    #[default]
    Normal,
    /// Dead end; the session stops here without submission.
    Terminate,
    /// Pre-submit review of the collected answers.
    Summary,
}

impl StepKind {
    pub fn is_normal(&self) -> bool {
        matches!(self, StepKind::Normal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Normal => "normal",
            StepKind::Terminate => "terminate",
            StepKind::Summary => "summary",
        }
    }
}

/// One branch of a conditional navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NavigationRule {
    pub value: Scalar,
    pub next_step_id: StepId,
}

/// Rule deciding which step follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Navigation {
    Direct {
        next_step_id: StepId,
    },
    Conditional {
        source_field_id: String,
        #[serde(default)]
        rules: Vec<NavigationRule>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_next_step_id: Option<StepId>,
    },
    Submit {},
    /// Delegates to a function registered under `function`; `targets` lists
    /// the step ids it may return so the schema can be checked up front.
    Computed {
        function: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        targets: Vec<StepId>,
    },
}

impl Default for Navigation {
    fn default() -> Self {
        Navigation::Submit {}
    }
}

impl Navigation {
    /// Every step id this navigation can name.
    pub fn referenced_steps(&self) -> Vec<&str> {
        match self {
            Navigation::Direct { next_step_id } => vec![next_step_id.as_str()],
            Navigation::Conditional {
                rules,
                default_next_step_id,
                ..
            } => rules
                .iter()
                .map(|rule| rule.next_step_id.as_str())
                .chain(default_next_step_id.as_deref())
                .collect(),
            Navigation::Submit {} => Vec::new(),
            Navigation::Computed { targets, .. } => targets.iter().map(String::as_str).collect(),
        }
    }
}

/// One node of the questionnaire graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepSpec {
    pub step_id: StepId,
    pub title: String,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "StepKind::is_normal"
    )]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub navigation: Navigation,
}

impl StepSpec {
    pub fn new(step_id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            title: title.into(),
            kind: StepKind::Normal,
            text: None,
            fields: Vec::new(),
            navigation: Navigation::default(),
        }
    }

    pub fn with_kind(mut self, kind: StepKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_navigation(mut self, navigation: Navigation) -> Self {
        self.navigation = navigation;
        self
    }

    pub fn is_terminal(&self) -> bool {
        !self.kind.is_normal()
    }

    /// Terminate and summary steps lead with their `text`.
    pub fn headline(&self) -> &str {
        if self.is_terminal() {
            self.text.as_deref().unwrap_or(&self.title)
        } else {
            &self.title
        }
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.field_id == field_id)
    }
}

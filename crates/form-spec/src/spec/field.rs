use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::AnswerValue;
use crate::condition::{Condition, Scalar};

/// Input widget a field is collected with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Info,
    Text,
    Textarea,
    Date,
    Phone,
    Email,
    SingleChoiceButtons,
    MultipleChoiceCheckbox,
    File,
}

impl FieldType {
    /// Info fields are display-only and never hold an answer.
    pub fn collects_value(&self) -> bool {
        !matches!(self, FieldType::Info)
    }

    pub fn requires_options(&self) -> bool {
        matches!(
            self,
            FieldType::SingleChoiceButtons | FieldType::MultipleChoiceCheckbox
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Info => "info",
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Date => "date",
            FieldType::Phone => "phone",
            FieldType::Email => "email",
            FieldType::SingleChoiceButtons => "single_choice_buttons",
            FieldType::MultipleChoiceCheckbox => "multiple_choice_checkbox",
            FieldType::File => "file",
        }
    }
}

/// Format hints carried over from the hosted schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    /// Latest accepted date, `DD.MM.YYYY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

/// A button or checkbox entry.
///
/// A bare string is both the label and the stored value. The labeled form
/// carries its own value, e.g. `{"text": "Yes", "value": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ChoiceOption {
    Labeled { text: String, value: Scalar },
    Plain(String),
}

impl ChoiceOption {
    pub fn labeled(text: impl Into<String>, value: impl Into<Scalar>) -> Self {
        ChoiceOption::Labeled {
            text: text.into(),
            value: value.into(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ChoiceOption::Labeled { text, .. } => text,
            ChoiceOption::Plain(text) => text,
        }
    }

    pub fn value(&self) -> Scalar {
        match self {
            ChoiceOption::Labeled { value, .. } => value.clone(),
            ChoiceOption::Plain(text) => Scalar::Text(text.clone()),
        }
    }

    /// The answer recorded when this option is picked.
    pub fn to_answer(&self) -> AnswerValue {
        match self.value() {
            Scalar::Bool(value) => AnswerValue::Bool(value),
            Scalar::Text(value) => AnswerValue::Text(value),
        }
    }

    pub fn matches(&self, answer: &AnswerValue) -> bool {
        match self {
            ChoiceOption::Labeled { value, .. } => value.matches(answer),
            ChoiceOption::Plain(text) => answer.as_str() == Some(text.as_str()),
        }
    }

    /// String value stored in checkbox lists; boolean options have none.
    pub fn text_value(&self) -> Option<&str> {
        match self {
            ChoiceOption::Labeled {
                value: Scalar::Text(value),
                ..
            } => Some(value),
            ChoiceOption::Labeled { .. } => None,
            ChoiceOption::Plain(text) => Some(text),
        }
    }
}

impl From<&str> for ChoiceOption {
    fn from(text: &str) -> Self {
        ChoiceOption::Plain(text.to_string())
    }
}

impl From<String> for ChoiceOption {
    fn from(text: String) -> Self {
        ChoiceOption::Plain(text)
    }
}

/// One datum collected within a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub field_id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ChoiceOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_multiple: bool,
    /// Body shown for `info` fields instead of the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FieldSpec {
    pub fn new(field_id: impl Into<String>, kind: FieldType, label: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            kind,
            label: label.into(),
            required: false,
            options: None,
            condition: None,
            validation: None,
            allow_multiple: false,
            text: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ChoiceOption>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Required fields that collect a value gate step completion.
    pub fn is_blocking(&self) -> bool {
        self.required && self.kind.collects_value()
    }

    pub fn options(&self) -> &[ChoiceOption] {
        self.options.as_deref().unwrap_or_default()
    }

    /// Option labels joined for messages.
    pub fn option_list(&self) -> String {
        self.options()
            .iter()
            .map(ChoiceOption::text)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether some answer to this field could equal `value`.
    ///
    /// Buttons produce the types of their option values, text-like fields
    /// produce strings. Checkbox lists, files and info fields never equal a scalar.
    pub fn can_produce(&self, value: &Scalar) -> bool {
        match self.kind {
            FieldType::SingleChoiceButtons => self
                .options()
                .iter()
                .any(|option| option.value().same_kind(value)),
            FieldType::Text
            | FieldType::Textarea
            | FieldType::Date
            | FieldType::Phone
            | FieldType::Email => matches!(value, Scalar::Text(_)),
            FieldType::MultipleChoiceCheckbox | FieldType::Info | FieldType::File => false,
        }
    }
}

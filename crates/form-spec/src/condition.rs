use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::{AnswerSet, AnswerValue};

/// Literal a condition or navigation rule compares answers against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Text(String),
}

impl Scalar {
    /// Strict comparison: booleans only match booleans, strings only strings.
    pub fn matches(&self, answer: &AnswerValue) -> bool {
        match (self, answer) {
            (Scalar::Bool(expected), AnswerValue::Bool(actual)) => expected == actual,
            (Scalar::Text(expected), AnswerValue::Text(actual)) => expected == actual,
            _ => false,
        }
    }

    pub fn same_kind(&self, other: &Scalar) -> bool {
        matches!(
            (self, other),
            (Scalar::Bool(_), Scalar::Bool(_)) | (Scalar::Text(_), Scalar::Text(_))
        )
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ConditionValue {
    One(Scalar),
    Many(Vec<Scalar>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
}

/// Structured visibility rule: `<field_id> <operator> <value>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    #[serde(alias = "source_field_id")]
    pub field_id: String,
    pub operator: Operator,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(field_id: impl Into<String>, operator: Operator, value: ConditionValue) -> Self {
        Self {
            field_id: field_id.into(),
            operator,
            value,
        }
    }

    pub fn equals(field_id: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(field_id, Operator::Equals, ConditionValue::One(value.into()))
    }

    pub fn not_equals(field_id: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(
            field_id,
            Operator::NotEquals,
            ConditionValue::One(value.into()),
        )
    }

    pub fn one_of<I, S>(field_id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self::new(
            field_id,
            Operator::In,
            ConditionValue::Many(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn none_of<I, S>(field_id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self::new(
            field_id,
            Operator::NotIn,
            ConditionValue::Many(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Every literal the condition compares against.
    pub fn values(&self) -> &[Scalar] {
        match &self.value {
            ConditionValue::One(value) => std::slice::from_ref(value),
            ConditionValue::Many(values) => values,
        }
    }

    /// Evaluates the condition against the answers.
    ///
    /// An absent answer never equals anything, so `equals`/`in` yield `false`
    /// and `not_equals`/`not_in` yield `true`. Returns `None` when the value
    /// shape does not fit the operator (a list for `equals`, a scalar for
    /// `in`); callers decide what a malformed rule means.
    pub fn evaluate(&self, answers: &AnswerSet) -> Option<bool> {
        let answer = answers.get(&self.field_id);
        match (&self.operator, &self.value) {
            (Operator::Equals, ConditionValue::One(expected)) => {
                Some(answer.is_some_and(|value| expected.matches(value)))
            }
            (Operator::NotEquals, ConditionValue::One(expected)) => {
                Some(!answer.is_some_and(|value| expected.matches(value)))
            }
            (Operator::In, ConditionValue::Many(expected)) => Some(
                answer.is_some_and(|value| expected.iter().any(|item| item.matches(value))),
            ),
            (Operator::NotIn, ConditionValue::Many(expected)) => Some(
                !answer.is_some_and(|value| expected.iter().any(|item| item.matches(value))),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_answer_follows_operator_semantics() {
        let answers = AnswerSet::new();
        assert_eq!(Condition::equals("x", "a").evaluate(&answers), Some(false));
        assert_eq!(Condition::not_equals("x", "a").evaluate(&answers), Some(true));
        assert_eq!(Condition::one_of("x", ["a"]).evaluate(&answers), Some(false));
        assert_eq!(Condition::none_of("x", ["a"]).evaluate(&answers), Some(true));
    }

    #[test]
    fn booleans_never_match_strings() {
        let answers = AnswerSet::new().with("consent", true);
        assert_eq!(
            Condition::equals("consent", "true").evaluate(&answers),
            Some(false)
        );
        assert_eq!(
            Condition::equals("consent", true).evaluate(&answers),
            Some(true)
        );
    }

    #[test]
    fn mismatched_value_shape_is_malformed() {
        let answers = AnswerSet::new().with("need", "wheelchair");
        let scalar_in = Condition::new(
            "need",
            Operator::In,
            ConditionValue::One(Scalar::from("wheelchair")),
        );
        assert_eq!(scalar_in.evaluate(&answers), None);

        let list_equals = Condition::new(
            "need",
            Operator::Equals,
            ConditionValue::Many(vec![Scalar::from("wheelchair")]),
        );
        assert_eq!(list_equals.evaluate(&answers), None);
    }

    #[test]
    fn wire_shape_accepts_source_field_alias() {
        let condition: Condition = serde_json::from_str(
            r#"{"source_field_id": "need", "operator": "not_in", "value": ["console"]}"#,
        )
        .expect("deserialize");
        assert_eq!(condition.field_id, "need");
        assert_eq!(condition.operator, Operator::NotIn);
    }
}

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a file already uploaded through the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FileRef {
    pub file_id: String,
    pub filename: String,
}

impl FileRef {
    pub fn new(file_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            filename: filename.into(),
        }
    }
}

/// A single recorded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
    File(FileRef),
    Files(Vec<FileRef>),
}

impl AnswerValue {
    /// Empty strings and empty lists are treated as "not answered".
    pub fn is_filled(&self) -> bool {
        match self {
            AnswerValue::Bool(_) | AnswerValue::File(_) => true,
            AnswerValue::Text(text) => !text.is_empty(),
            AnswerValue::List(items) => !items.is_empty(),
            AnswerValue::Files(files) => !files.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnswerValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Human readable form used by renderers and templates.
    pub fn display(&self) -> String {
        match self {
            AnswerValue::Bool(true) => "yes".into(),
            AnswerValue::Bool(false) => "no".into(),
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::List(items) => items.join(", "),
            AnswerValue::File(file) => file.filename.clone(),
            AnswerValue::Files(files) => files
                .iter()
                .map(|file| file.filename.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        AnswerValue::Bool(value)
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        AnswerValue::List(value)
    }
}

impl From<FileRef> for AnswerValue {
    fn from(value: FileRef) -> Self {
        AnswerValue::File(value)
    }
}

/// Cumulative answers keyed by field id (the hosted API calls this `formData`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AnswerSet {
    values: BTreeMap<String, AnswerValue>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field_id: &str) -> Option<&AnswerValue> {
        self.values.get(field_id)
    }

    pub fn insert(&mut self, field_id: impl Into<String>, value: impl Into<AnswerValue>) {
        self.values.insert(field_id.into(), value.into());
    }

    pub fn with(mut self, field_id: impl Into<String>, value: impl Into<AnswerValue>) -> Self {
        self.insert(field_id, value);
        self
    }

    pub fn remove(&mut self, field_id: &str) -> Option<AnswerValue> {
        self.values.remove(field_id)
    }

    /// Later values win.
    pub fn merge(&mut self, other: AnswerSet) {
        self.values.extend(other.values);
    }

    pub fn has_value(&self, field_id: &str) -> bool {
        self.values.get(field_id).is_some_and(AnswerValue::is_filled)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnswerValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, serde_cbor::Error> {
        serde_cbor::from_slice(bytes)
    }
}

impl<K, V> FromIterator<(K, V)> for AnswerSet
where
    K: Into<String>,
    V: Into<AnswerValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

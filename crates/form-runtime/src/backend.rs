use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use form_spec::{AnswerSet, FormSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host the conversation runs in, reported when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    #[serde(rename = "web")]
    Web,
    #[serde(rename = "miniapp")]
    MiniApp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::MiniApp => "miniapp",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "miniapp" | "mini_app" | "mini-app" => Ok(Platform::MiniApp),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// Identifiers handed out when a new application is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationHandle {
    pub application_id: String,
    pub session_id: String,
}

/// File already uploaded elsewhere and attached to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedFile {
    pub field_id: String,
    pub file_id: String,
    pub filename: String,
    pub linked_at: DateTime<Utc>,
}

/// Application record as the bundled backends keep it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredApplication {
    pub application_id: String,
    pub session_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub answers: AnswerSet,
    #[serde(default)]
    pub files: Vec<LinkedFile>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredApplication {
    /// Opens a fresh record with UUID v4 identifiers.
    pub fn open(platform: Platform) -> Self {
        let now = Utc::now();
        Self {
            application_id: uuid::Uuid::new_v4().to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
            platform,
            answers: AnswerSet::new(),
            files: Vec::new(),
            submitted: false,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn handle(&self) -> ApplicationHandle {
        ApplicationHandle {
            application_id: self.application_id.clone(),
            session_id: self.session_id.clone(),
        }
    }

    pub fn link(&mut self, field_id: &str, file_id: &str, filename: &str) {
        let now = Utc::now();
        self.files.retain(|file| file.file_id != file_id);
        self.files.push(LinkedFile {
            field_id: field_id.to_string(),
            file_id: file_id.to_string(),
            filename: filename.to_string(),
            linked_at: now,
        });
        self.updated_at = now;
    }

    /// Marks the record submitted; repeated calls keep the first timestamp.
    pub fn mark_submitted(&mut self) {
        if !self.submitted {
            let now = Utc::now();
            self.submitted = true;
            self.submitted_at = Some(now);
            self.updated_at = now;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("encoding failure: {0}")]
    Encoding(String),
}

impl BackendError {
    /// Missing records and undecodable payloads fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BackendError::NotFound(_) | BackendError::Encoding(_))
    }
}

/// Remote side of a conversation: schema source and application storage.
#[async_trait]
pub trait FormBackend: Send + Sync {
    async fn load_schema(&self) -> Result<FormSchema, BackendError>;

    /// Opens a new application for `platform`.
    async fn create_session(&self, platform: Platform) -> Result<ApplicationHandle, BackendError>;

    async fn load_answers(&self, application_id: &str) -> Result<AnswerSet, BackendError>;

    /// Replaces the stored answers of the application.
    async fn save_answers(
        &self,
        application_id: &str,
        answers: &AnswerSet,
    ) -> Result<(), BackendError>;

    async fn link_file(
        &self,
        application_id: &str,
        file_id: &str,
        field_id: &str,
        filename: &str,
    ) -> Result<(), BackendError>;

    async fn submit(&self, application_id: &str) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_uses_wire_tags() {
        assert_eq!(
            serde_json::to_string(&Platform::MiniApp).expect("encode"),
            "\"miniapp\""
        );
        assert_eq!("WEB".parse::<Platform>(), Ok(Platform::Web));
        assert!("desktop".parse::<Platform>().is_err());
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(BackendError::Transport("reset".into()).is_retryable());
        assert!(BackendError::Timeout(10).is_retryable());
        assert!(BackendError::Storage("disk".into()).is_retryable());
        assert!(!BackendError::NotFound("app".into()).is_retryable());
        assert!(!BackendError::Encoding("json".into()).is_retryable());
    }

    #[test]
    fn submitting_twice_keeps_first_timestamp() {
        let mut application = StoredApplication::open(Platform::Web);
        application.mark_submitted();
        let first = application.submitted_at;
        application.mark_submitted();
        assert!(application.submitted);
        assert_eq!(application.submitted_at, first);
        assert!(uuid::Uuid::parse_str(&application.application_id).is_ok());
    }
}

//! Directory-backed [`FormBackend`].
//!
//! ```text
//! {root}/
//! ├── schema.json
//! └── applications/
//!     └── {application_id}.json
//! ```
//!
//! Records are written to a `.tmp` sibling and renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use form_spec::{AnswerSet, FormSchema};
use tokio::fs;
use uuid::Uuid;

use crate::backend::{ApplicationHandle, BackendError, FormBackend, Platform, StoredApplication};

const SCHEMA_FILE: &str = "schema.json";
const APPLICATIONS_DIR: &str = "applications";

#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema_path(&self) -> PathBuf {
        self.root.join(SCHEMA_FILE)
    }

    /// Path of an application record; ids that are not UUIDs are refused.
    pub fn application_path(&self, application_id: &str) -> Result<PathBuf, BackendError> {
        let id = Uuid::parse_str(application_id)
            .map_err(|_| BackendError::NotFound(format!("application {}", application_id)))?;
        Ok(self
            .root
            .join(APPLICATIONS_DIR)
            .join(format!("{}.json", id)))
    }

    /// Makes `schema` the one served by [`FormBackend::load_schema`].
    pub async fn install_schema(&self, schema: &FormSchema) -> Result<(), BackendError> {
        let json = serde_json::to_string_pretty(schema)
            .map_err(|err| BackendError::Encoding(err.to_string()))?;
        write_atomic(&self.schema_path(), json.as_bytes()).await
    }

    pub async fn read_application(
        &self,
        application_id: &str,
    ) -> Result<StoredApplication, BackendError> {
        let path = self.application_path(application_id)?;
        let raw = read_file(&path, || format!("application {}", application_id)).await?;
        serde_json::from_str(&raw).map_err(|err| {
            BackendError::Encoding(format!("{}: {}", path.display(), err))
        })
    }

    async fn write_application(&self, application: &StoredApplication) -> Result<(), BackendError> {
        let path = self.application_path(&application.application_id)?;
        let json = serde_json::to_string_pretty(application)
            .map_err(|err| BackendError::Encoding(err.to_string()))?;
        write_atomic(&path, json.as_bytes()).await
    }

    async fn update<F>(&self, application_id: &str, change: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut StoredApplication) + Send,
    {
        let mut application = self.read_application(application_id).await?;
        change(&mut application);
        self.write_application(&application).await
    }
}

async fn read_file(path: &Path, missing: impl FnOnce() -> String) -> Result<String, BackendError> {
    match fs::read_to_string(path).await {
        Ok(raw) => Ok(raw),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(BackendError::NotFound(missing())),
        Err(err) => Err(BackendError::Storage(format!(
            "failed to read {}: {}",
            path.display(),
            err
        ))),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|err| {
            BackendError::Storage(format!(
                "failed to create directory {}: {}",
                parent.display(),
                err
            ))
        })?;
    }
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, bytes).await.map_err(|err| {
        BackendError::Storage(format!("failed to write {}: {}", temp.display(), err))
    })?;
    fs::rename(&temp, path).await.map_err(|err| {
        BackendError::Storage(format!(
            "failed to rename {} to {}: {}",
            temp.display(),
            path.display(),
            err
        ))
    })
}

#[async_trait]
impl FormBackend for FileBackend {
    async fn load_schema(&self) -> Result<FormSchema, BackendError> {
        let path = self.schema_path();
        let raw = read_file(&path, || format!("schema at {}", path.display())).await?;
        FormSchema::from_json_str(&raw)
            .map_err(|err| BackendError::Encoding(format!("{}: {}", path.display(), err)))
    }

    async fn create_session(&self, platform: Platform) -> Result<ApplicationHandle, BackendError> {
        let application = StoredApplication::open(platform);
        self.write_application(&application).await?;
        tracing::debug!(
            application_id = %application.application_id,
            platform = %platform,
            "application created"
        );
        Ok(application.handle())
    }

    async fn load_answers(&self, application_id: &str) -> Result<AnswerSet, BackendError> {
        Ok(self.read_application(application_id).await?.answers)
    }

    async fn save_answers(
        &self,
        application_id: &str,
        answers: &AnswerSet,
    ) -> Result<(), BackendError> {
        let answers = answers.clone();
        self.update(application_id, move |application| {
            application.answers = answers;
            application.updated_at = Utc::now();
        })
        .await
    }

    async fn link_file(
        &self,
        application_id: &str,
        file_id: &str,
        field_id: &str,
        filename: &str,
    ) -> Result<(), BackendError> {
        self.update(application_id, |application| {
            application.link(field_id, file_id, filename)
        })
        .await
    }

    async fn submit(&self, application_id: &str) -> Result<(), BackendError> {
        self.update(application_id, StoredApplication::mark_submitted)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FormSchema {
        FormSchema::from_json_str(
            r#"{"name":"tiny","version":"1","start_step_id":"a","steps":[{"step_id":"a","title":"A"}]}"#,
        )
        .expect("schema")
    }

    #[tokio::test]
    async fn schema_round_trips_through_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path());
        assert!(matches!(
            backend.load_schema().await,
            Err(BackendError::NotFound(_))
        ));

        backend.install_schema(&schema()).await.expect("install");
        assert_eq!(backend.load_schema().await.expect("load"), schema());
    }

    #[tokio::test]
    async fn application_lifecycle_is_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path());
        let handle = backend.create_session(Platform::Web).await.expect("create");
        let id = handle.application_id.as_str();

        backend
            .save_answers(id, &AnswerSet::new().with("city", "Kazan"))
            .await
            .expect("save");
        backend
            .link_file(id, "f-1", "passport", "passport.pdf")
            .await
            .expect("link");
        backend.submit(id).await.expect("submit");

        let reopened = FileBackend::new(dir.path());
        let stored = reopened.read_application(id).await.expect("read");
        assert!(stored.answers.has_value("city"));
        assert_eq!(stored.files.len(), 1);
        assert_eq!(stored.files[0].field_id, "passport");
        assert!(stored.submitted);
        assert!(backend.application_path(id).expect("path").exists());
    }

    #[tokio::test]
    async fn foreign_ids_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path());
        let result = backend.load_answers("../schema").await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn corrupt_record_is_an_encoding_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path());
        let id = Uuid::new_v4().to_string();
        let path = backend.application_path(&id).expect("path");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "not json").expect("write");

        assert!(matches!(
            backend.load_answers(&id).await,
            Err(BackendError::Encoding(_))
        ));
    }
}

//! In-process backend for tests and embedding.
//!
//! Records every call and can be told to fail the next session creations,
//! saves or submits with a transport error, so retry and recovery paths can
//! be exercised.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use form_spec::{AnswerSet, FormSchema};
use tokio::sync::Mutex;

use crate::backend::{ApplicationHandle, BackendError, FormBackend, Platform, StoredApplication};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    LoadSchema,
    CreateSession(Platform),
    LoadAnswers(String),
    SaveAnswers(String),
    LinkFile { application_id: String, file_id: String },
    Submit(String),
}

#[derive(Debug, Default)]
struct MemoryState {
    schema: Option<FormSchema>,
    applications: BTreeMap<String, StoredApplication>,
    calls: Vec<BackendCall>,
    failing_creates: u32,
    failing_saves: u32,
    failing_submits: u32,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBackend {
    pub fn new(schema: FormSchema) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                schema: Some(schema),
                ..MemoryState::default()
            })),
        }
    }

    /// Makes the next `count` session creations fail with a transport error.
    pub async fn fail_creates(&self, count: u32) {
        self.state.lock().await.failing_creates = count;
    }

    /// Makes the next `count` saves fail with a transport error.
    pub async fn fail_saves(&self, count: u32) {
        self.state.lock().await.failing_saves = count;
    }

    /// Makes the next `count` submits fail with a transport error.
    pub async fn fail_submits(&self, count: u32) {
        self.state.lock().await.failing_submits = count;
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn application(&self, application_id: &str) -> Option<StoredApplication> {
        self.state
            .lock()
            .await
            .applications
            .get(application_id)
            .cloned()
    }

    /// Stores a record directly, as if an earlier session had created it.
    pub async fn seed(&self, application: StoredApplication) {
        self.state
            .lock()
            .await
            .applications
            .insert(application.application_id.clone(), application);
    }
}

impl MemoryState {
    fn application_mut(
        &mut self,
        application_id: &str,
    ) -> Result<&mut StoredApplication, BackendError> {
        self.applications
            .get_mut(application_id)
            .ok_or_else(|| BackendError::NotFound(format!("application {}", application_id)))
    }
}

#[async_trait]
impl FormBackend for InMemoryBackend {
    async fn load_schema(&self) -> Result<FormSchema, BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::LoadSchema);
        state
            .schema
            .clone()
            .ok_or_else(|| BackendError::NotFound("active schema".into()))
    }

    async fn create_session(&self, platform: Platform) -> Result<ApplicationHandle, BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::CreateSession(platform));
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(BackendError::Transport("injected create failure".into()));
        }
        let application = StoredApplication::open(platform);
        let handle = application.handle();
        state
            .applications
            .insert(application.application_id.clone(), application);
        Ok(handle)
    }

    async fn load_answers(&self, application_id: &str) -> Result<AnswerSet, BackendError> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(BackendCall::LoadAnswers(application_id.to_string()));
        Ok(state.application_mut(application_id)?.answers.clone())
    }

    async fn save_answers(
        &self,
        application_id: &str,
        answers: &AnswerSet,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(BackendCall::SaveAnswers(application_id.to_string()));
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(BackendError::Transport("injected save failure".into()));
        }
        let application = state.application_mut(application_id)?;
        application.answers = answers.clone();
        application.updated_at = Utc::now();
        Ok(())
    }

    async fn link_file(
        &self,
        application_id: &str,
        file_id: &str,
        field_id: &str,
        filename: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::LinkFile {
            application_id: application_id.to_string(),
            file_id: file_id.to_string(),
        });
        state
            .application_mut(application_id)?
            .link(field_id, file_id, filename);
        Ok(())
    }

    async fn submit(&self, application_id: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::Submit(application_id.to_string()));
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            return Err(BackendError::Transport("injected submit failure".into()));
        }
        state.application_mut(application_id)?.mark_submitted();
        Ok(())
    }
}

use chrono::NaiveDate;
use form_spec::{
    AnswerSet, BackOutcome, Completion, ComputedRegistry, FieldType, FileRef, FormSession,
    RenderPayload, RestartPolicy, SessionError, StepOutcome, StepSpec, ValidationError,
    build_render_payload, validate_field_value,
};
use thiserror::Error;

use crate::backend::{BackendError, FormBackend};
use crate::config::RuntimeConfig;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid answers: {}", describe(.0))]
    Validation(Vec<ValidationError>),
    #[error("could not persist answers: {0}")]
    Persistence(#[source] BackendError),
    #[error("could not submit application: {0}")]
    Submission(#[source] BackendError),
    #[error("{0}")]
    NotReady(String),
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Drives one [`FormSession`] against a [`FormBackend`].
///
/// Answers are format-checked before they reach the session and saved after
/// every step transition when `autosave` is on. A failed save keeps the
/// in-memory progress and leaves the runner dirty until a save succeeds.
pub struct FormRunner<B> {
    backend: B,
    config: RuntimeConfig,
    computed: Option<ComputedRegistry>,
    today: Option<NaiveDate>,
    session: Option<FormSession>,
    dirty: bool,
    submitted: bool,
}

impl<B: FormBackend> FormRunner<B> {
    pub fn new(backend: B, config: RuntimeConfig) -> Self {
        Self {
            backend,
            config,
            computed: None,
            today: None,
            session: None,
            dirty: false,
            submitted: false,
        }
    }

    /// Uses `computed` instead of the functions declared in the config.
    pub fn with_registry(mut self, computed: ComputedRegistry) -> Self {
        self.computed = Some(computed);
        self
    }

    /// Pins the date used for date checks and age routing.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn session(&self) -> Result<&FormSession, RuntimeError> {
        self.session.as_ref().ok_or_else(not_started)
    }

    pub fn application_id(&self) -> Option<&str> {
        self.session.as_ref().and_then(FormSession::application_id)
    }

    pub fn render(&self) -> Result<RenderPayload, RuntimeError> {
        Ok(build_render_payload(self.session()?))
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    fn session_mut(&mut self) -> Result<&mut FormSession, RuntimeError> {
        self.session.as_mut().ok_or_else(not_started)
    }

    /// Loads the schema and opens an application, resuming `resume_id` when
    /// the backend still knows it.
    pub async fn start(&mut self, resume_id: Option<&str>) -> Result<&FormSession, RuntimeError> {
        let retry = self.config.retry;
        let backend = &self.backend;
        let schema = retry
            .run("load_schema", || backend.load_schema())
            .await
            .map_err(RuntimeError::Persistence)?;

        let resumed = match resume_id {
            Some(application_id) => {
                match retry
                    .run("load_answers", || backend.load_answers(application_id))
                    .await
                {
                    Ok(answers) => Some((application_id.to_string(), answers)),
                    Err(BackendError::NotFound(_)) => {
                        tracing::warn!(
                            application_id,
                            "saved application not found, starting a new one"
                        );
                        None
                    }
                    Err(err) => return Err(RuntimeError::Persistence(err)),
                }
            }
            None => None,
        };

        let (application_id, answers) = match resumed {
            Some(resumed) => resumed,
            None => {
                let platform = self.config.platform;
                let handle = retry
                    .run("create_session", || backend.create_session(platform))
                    .await
                    .map_err(RuntimeError::Persistence)?;
                tracing::info!(
                    application_id = %handle.application_id,
                    session_id = %handle.session_id,
                    platform = %platform,
                    "application opened"
                );
                (handle.application_id, AnswerSet::new())
            }
        };

        let computed = match &self.computed {
            Some(computed) => computed.clone(),
            None => self.config.registry(self.today()),
        };
        let mut builder = FormSession::builder(schema)
            .config(self.config.session)
            .registry(computed)
            .application_id(application_id);
        if !answers.is_empty() {
            builder = builder.resume(answers);
        }
        let session = builder.build()?;

        self.dirty = false;
        self.submitted = false;
        Ok(self.session.insert(session))
    }

    /// Checks and merges answers for the current step.
    pub async fn answer(&mut self, partial: AnswerSet) -> Result<StepOutcome, RuntimeError> {
        let today = self.today();
        let session = self.session_mut()?;
        if session.is_complete() {
            return Err(SessionError::AlreadyComplete.into());
        }
        let errors = check_answers(session.current_step(), &partial, today);
        if !errors.is_empty() {
            tracing::debug!(count = errors.len(), "answers rejected");
            return Err(RuntimeError::Validation(errors));
        }

        let outcome = session.submit_step_answers(partial)?;
        self.dirty = true;
        if self.config.autosave && !matches!(outcome, StepOutcome::Blocked { .. }) {
            self.save().await?;
        }
        Ok(outcome)
    }

    /// Writes the current answers to the backend.
    pub async fn save(&mut self) -> Result<(), RuntimeError> {
        let session = self.session()?;
        let application_id = session
            .application_id()
            .ok_or_else(|| RuntimeError::NotReady("session has no application id".into()))?;
        let answers = session.answers();
        let backend = &self.backend;
        self.config
            .retry
            .run("save_answers", || backend.save_answers(application_id, answers))
            .await
            .map_err(RuntimeError::Persistence)?;
        tracing::debug!(application_id, fields = answers.len(), "answers saved");
        self.dirty = false;
        Ok(())
    }

    pub async fn go_back(&mut self) -> Result<BackOutcome, RuntimeError> {
        let outcome = self.session_mut()?.go_back();
        if matches!(outcome, BackOutcome::Moved { .. }) {
            self.dirty = true;
            self.submitted = false;
            if self.config.autosave {
                self.save().await?;
            }
        }
        Ok(outcome)
    }

    /// Clears all answers; under [`RestartPolicy::Regenerate`] a new
    /// application is opened for the fresh attempt.
    ///
    /// The new application is created before the session is touched, so a
    /// failed creation leaves answers, position and id as they were.
    pub async fn restart(&mut self) -> Result<(), RuntimeError> {
        self.session()?;
        let regenerated = match self.config.session.restart_application_id {
            RestartPolicy::Regenerate => {
                let platform = self.config.platform;
                let backend = &self.backend;
                let handle = self
                    .config
                    .retry
                    .run("create_session", || backend.create_session(platform))
                    .await
                    .map_err(RuntimeError::Persistence)?;
                tracing::info!(application_id = %handle.application_id, "application regenerated");
                Some(handle.application_id)
            }
            RestartPolicy::Preserve => None,
        };

        let session = self.session_mut()?;
        session.restart();
        if let Some(application_id) = regenerated {
            session.set_application_id(application_id);
        }
        self.submitted = false;
        self.dirty = true;

        if self.config.autosave {
            self.save().await?;
        }
        Ok(())
    }

    /// Links an uploaded file to a file field of the current step.
    ///
    /// The returned reference still has to be answered for the field.
    pub async fn attach_file(
        &mut self,
        field_id: &str,
        file_id: &str,
        filename: &str,
    ) -> Result<FileRef, RuntimeError> {
        let session = self.session()?;
        match session.current_step().field(field_id) {
            Some(field) if matches!(field.kind, FieldType::File) => {}
            Some(_) => {
                return Err(RuntimeError::Validation(vec![ValidationError {
                    field_id: field_id.to_string(),
                    code: "type_mismatch".into(),
                    message: "files can only be attached to file fields".into(),
                }]));
            }
            None => return Err(RuntimeError::Validation(vec![unknown_field(field_id)])),
        }
        let application_id = session
            .application_id()
            .ok_or_else(|| RuntimeError::NotReady("session has no application id".into()))?;

        let backend = &self.backend;
        self.config
            .retry
            .run("link_file", || {
                backend.link_file(application_id, file_id, field_id, filename)
            })
            .await
            .map_err(RuntimeError::Persistence)?;
        tracing::debug!(application_id, field_id, file_id, "file linked");
        Ok(FileRef::new(file_id, filename))
    }

    /// Submits a finished form; later calls return the same id without
    /// contacting the backend again.
    pub async fn submit(&mut self) -> Result<String, RuntimeError> {
        let session = self.session()?;
        let application_id = session
            .application_id()
            .ok_or_else(|| RuntimeError::NotReady("session has no application id".into()))?
            .to_string();
        if self.submitted {
            tracing::debug!(application_id = %application_id, "already submitted");
            return Ok(application_id);
        }
        match session.completion() {
            Some(Completion::Finished) => {}
            Some(Completion::Terminated) => {
                return Err(RuntimeError::NotReady(
                    "the form was terminated and cannot be submitted".into(),
                ));
            }
            None => {
                return Err(RuntimeError::NotReady(format!(
                    "the form is not finished; current step is '{}'",
                    session.current_step_id()
                )));
            }
        }

        if self.dirty {
            self.save().await?;
        }

        let backend = &self.backend;
        let id = application_id.as_str();
        self.config
            .retry
            .run("submit", || backend.submit(id))
            .await
            .map_err(RuntimeError::Submission)?;
        self.submitted = true;
        tracing::info!(application_id = %application_id, "application submitted");
        Ok(application_id)
    }
}

fn not_started() -> RuntimeError {
    RuntimeError::NotReady("no session has been started".into())
}

fn unknown_field(field_id: &str) -> ValidationError {
    ValidationError {
        field_id: field_id.to_string(),
        code: "unknown_field".into(),
        message: "the current step has no such field".into(),
    }
}

/// Format errors for every answer in `partial`, in field order.
fn check_answers(step: &StepSpec, partial: &AnswerSet, today: NaiveDate) -> Vec<ValidationError> {
    partial
        .iter()
        .filter_map(|(field_id, value)| match step.field(field_id) {
            Some(field) => validate_field_value(field, value, today).err(),
            None => Some(unknown_field(field_id)),
        })
        .collect()
}

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answers::AnswerSet;
use crate::navigation::{ComputedRegistry, NextStep, resolve_next};
use crate::spec::field::FieldSpec;
use crate::spec::schema::FormSchema;
use crate::spec::step::{StepId, StepKind, StepSpec};
use crate::validate::{SchemaError, validate_schema};
use crate::visibility::{VisibilityMode, is_field_visible, missing_required, visible_fields};

/// How unanswered fields of one step are offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldPresentationMode {
    #[default]
    AllAtOnce,
    OneAtATime,
}

/// What happens to the application id when the session restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Keep the id so the backend record continues.
    #[default]
    Preserve,
    /// Drop the id; the host creates a fresh application.
    Regenerate,
}

/// Behaviour switches for the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SessionConfig {
    /// Remove the answers of the step being left when going back.
    pub back_navigation_erases_answers: bool,
    pub field_presentation: FieldPresentationMode,
    pub restart_application_id: RestartPolicy,
    pub visibility_on_error: VisibilityMode,
}

/// Why a session stopped accepting answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Navigation reached the end of the form; ready for submission.
    Finished,
    /// A terminate step was reached; nothing is submitted.
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Complete,
}

/// Serializable state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionState {
    pub current_step_id: StepId,
    #[serde(default)]
    pub answers: AnswerSet,
    #[serde(default)]
    pub history: Vec<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
}

impl SessionState {
    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }
}

/// Result of submitting answers for the current step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { next_step_id: StepId },
    Completed { completion: Completion },
    /// Required visible fields are still empty; the step did not change.
    Blocked { missing_field_ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackOutcome {
    Moved { step_id: StepId },
    NoHistory,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("navigation did not settle after {limit} steps starting at '{step_id}'")]
    NavigationCycle { step_id: StepId, limit: usize },
    #[error("session is complete and accepts no further answers")]
    AlreadyComplete,
    #[error("snapshot references unknown step '{0}'")]
    UnknownStep(StepId),
    #[error("snapshot encoding failed: {0}")]
    Snapshot(String),
}

/// Assembles a [`FormSession`], optionally resuming from saved answers.
pub struct SessionBuilder {
    schema: Arc<FormSchema>,
    config: SessionConfig,
    computed: ComputedRegistry,
    application_id: Option<String>,
    resumed: Option<AnswerSet>,
    start: Option<StepId>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, computed: ComputedRegistry) -> Self {
        self.computed = computed;
        self
    }

    pub fn computed<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&AnswerSet) -> Option<StepId> + Send + Sync + 'static,
    {
        self.computed.register(name, function);
        self
    }

    pub fn application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    pub fn resume(mut self, answers: AnswerSet) -> Self {
        self.resumed = Some(answers);
        self
    }

    pub fn start_at(mut self, step_id: impl Into<StepId>) -> Self {
        self.start = Some(step_id.into());
        self
    }

    pub fn build(self) -> Result<FormSession, SessionError> {
        validate_schema(&self.schema, &self.computed)?;

        let start = self
            .start
            .unwrap_or_else(|| self.schema.start_step_id.clone());
        let start_index = step_index(&self.schema, &start)
            .ok_or_else(|| SchemaError::UnknownStartStep(start.clone()))?;

        let mut session = FormSession {
            schema: self.schema,
            config: self.config,
            computed: self.computed,
            start: start.clone(),
            current_index: start_index,
            state: SessionState {
                current_step_id: start,
                answers: AnswerSet::new(),
                history: Vec::new(),
                application_id: self.application_id,
                completion: None,
            },
        };

        if let Some(answers) = self.resumed {
            session.state.answers = answers;
            session.resume()?;
        }
        session.settle_terminal();

        tracing::debug!(
            schema = %session.schema.name,
            step_id = %session.state.current_step_id,
            "form session initialized"
        );
        Ok(session)
    }
}

/// State machine walking a [`FormSchema`] one step at a time.
///
/// A session is driven by a single actor; hosts serving many users keep one
/// session per application.
#[derive(Debug, Clone)]
pub struct FormSession {
    schema: Arc<FormSchema>,
    config: SessionConfig,
    computed: ComputedRegistry,
    start: StepId,
    current_index: usize,
    state: SessionState,
}

impl FormSession {
    pub fn builder(schema: impl Into<Arc<FormSchema>>) -> SessionBuilder {
        SessionBuilder {
            schema: schema.into(),
            config: SessionConfig::default(),
            computed: ComputedRegistry::new(),
            application_id: None,
            resumed: None,
            start: None,
        }
    }

    pub fn initialize(
        schema: impl Into<Arc<FormSchema>>,
        resumed: Option<AnswerSet>,
        start_step_id: Option<StepId>,
    ) -> Result<Self, SessionError> {
        let mut builder = Self::builder(schema);
        if let Some(answers) = resumed {
            builder = builder.resume(answers);
        }
        if let Some(start) = start_step_id {
            builder = builder.start_at(start);
        }
        builder.build()
    }

    /// Rebuilds a session from a snapshot without walking the graph.
    pub fn restore(
        schema: impl Into<Arc<FormSchema>>,
        computed: ComputedRegistry,
        config: SessionConfig,
        state: SessionState,
    ) -> Result<Self, SessionError> {
        let schema = schema.into();
        validate_schema(&schema, &computed)?;
        let current_index = step_index(&schema, &state.current_step_id)
            .ok_or_else(|| SessionError::UnknownStep(state.current_step_id.clone()))?;
        if let Some(unknown) = state
            .history
            .iter()
            .find(|step_id| !schema.contains_step(step_id))
        {
            return Err(SessionError::UnknownStep(unknown.clone()));
        }
        Ok(Self {
            start: schema.start_step_id.clone(),
            schema,
            config,
            computed,
            current_index,
            state,
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.state.answers
    }

    pub fn history(&self) -> &[StepId] {
        &self.state.history
    }

    pub fn current_step_id(&self) -> &str {
        &self.state.current_step_id
    }

    pub fn current_step(&self) -> &StepSpec {
        &self.schema.steps[self.current_index]
    }

    pub fn application_id(&self) -> Option<&str> {
        self.state.application_id.as_deref()
    }

    pub fn set_application_id(&mut self, application_id: impl Into<String>) {
        self.state.application_id = Some(application_id.into());
    }

    pub fn completion(&self) -> Option<Completion> {
        self.state.completion
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_complete() {
            SessionPhase::Complete
        } else {
            SessionPhase::Active
        }
    }

    pub fn can_go_back(&self) -> bool {
        !self.state.history.is_empty()
    }

    pub fn is_visible_field(&self, field: &FieldSpec) -> bool {
        is_field_visible(field, &self.state.answers, self.config.visibility_on_error)
    }

    pub fn visible_fields_of<'a>(&self, step: &'a StepSpec) -> Vec<&'a FieldSpec> {
        visible_fields(step, &self.state.answers, self.config.visibility_on_error)
    }

    pub fn is_step_satisfied(&self, step: &StepSpec) -> bool {
        self.missing_fields_of(step).is_empty()
    }

    pub fn missing_fields_of<'a>(&self, step: &'a StepSpec) -> Vec<&'a FieldSpec> {
        missing_required(step, &self.state.answers, self.config.visibility_on_error)
    }

    /// Unanswered visible fields of the current step to prompt for next.
    ///
    /// In one-at-a-time mode this is the first missing required field, or the
    /// first unanswered optional one once every required field is filled.
    pub fn pending_fields(&self) -> Vec<&FieldSpec> {
        if self.is_complete() {
            return Vec::new();
        }
        let step = self.current_step();
        let unanswered: Vec<&FieldSpec> = self
            .visible_fields_of(step)
            .into_iter()
            .filter(|field| {
                field.kind.collects_value() && !self.state.answers.has_value(&field.field_id)
            })
            .collect();
        match self.config.field_presentation {
            FieldPresentationMode::AllAtOnce => unanswered,
            FieldPresentationMode::OneAtATime => unanswered
                .iter()
                .find(|field| field.required)
                .or_else(|| unanswered.first())
                .map(|field| vec![*field])
                .unwrap_or_default(),
        }
    }

    /// Merges `partial` and moves on when the current step is satisfied.
    pub fn submit_step_answers(&mut self, partial: AnswerSet) -> Result<StepOutcome, SessionError> {
        if self.is_complete() {
            return Err(SessionError::AlreadyComplete);
        }

        let step_id = self.state.current_step_id.clone();
        tracing::debug!(step_id = %step_id, fields = partial.len(), "merging step answers");
        self.state.answers.merge(partial);

        let step = self.current_step();
        let missing: Vec<String> = self
            .missing_fields_of(step)
            .into_iter()
            .map(|field| field.field_id.clone())
            .collect();
        if !missing.is_empty() {
            tracing::debug!(step_id = %step_id, missing = ?missing, "step blocked on required fields");
            return Ok(StepOutcome::Blocked {
                missing_field_ids: missing,
            });
        }

        match self.next_index(step) {
            Some((next_step_id, next_index)) => {
                self.state.history.push(step_id.clone());
                self.move_to(next_step_id.clone(), next_index);
                tracing::debug!(from = %step_id, to = %next_step_id, "advanced");
                match self.state.completion {
                    Some(completion) => Ok(StepOutcome::Completed { completion }),
                    None => Ok(StepOutcome::Advanced { next_step_id }),
                }
            }
            None => {
                self.state.completion = Some(Completion::Finished);
                tracing::info!(step_id = %step_id, "form finished");
                Ok(StepOutcome::Completed {
                    completion: Completion::Finished,
                })
            }
        }
    }

    /// Returns to the previously visited step.
    pub fn go_back(&mut self) -> BackOutcome {
        let Some(previous) = self.state.history.pop() else {
            return BackOutcome::NoHistory;
        };
        let Some(index) = step_index(&self.schema, &previous) else {
            tracing::warn!(step_id = %previous, "history names an unknown step");
            self.state.history.push(previous);
            return BackOutcome::NoHistory;
        };

        if self.config.back_navigation_erases_answers {
            let leaving: Vec<String> = self
                .current_step()
                .fields
                .iter()
                .map(|field| field.field_id.clone())
                .collect();
            for field_id in leaving {
                self.state.answers.remove(&field_id);
            }
        }

        tracing::debug!(from = %self.state.current_step_id, to = %previous, "went back");
        self.state.completion = None;
        self.move_to(previous.clone(), index);
        BackOutcome::Moved { step_id: previous }
    }

    /// Clears answers and history and returns to the schema's start step.
    pub fn restart(&mut self) -> &SessionState {
        self.state.answers.clear();
        self.state.history.clear();
        self.state.completion = None;
        if matches!(self.config.restart_application_id, RestartPolicy::Regenerate) {
            self.state.application_id = None;
        }
        let start = self.schema.start_step_id.clone();
        let index = step_index(&self.schema, &start).unwrap_or(0);
        self.move_to(start, index);
        tracing::info!(step_id = %self.state.current_step_id, "form restarted");
        &self.state
    }

    pub fn snapshot_json(&self) -> Result<serde_json::Value, SessionError> {
        serde_json::to_value(&self.state).map_err(|err| SessionError::Snapshot(err.to_string()))
    }

    pub fn snapshot_cbor(&self) -> Result<Vec<u8>, SessionError> {
        serde_cbor::to_vec(&self.state).map_err(|err| SessionError::Snapshot(err.to_string()))
    }

    fn move_to(&mut self, step_id: StepId, index: usize) {
        self.state.current_step_id = step_id;
        self.current_index = index;
        self.settle_terminal();
    }

    /// Terminate steps end the session as soon as they are entered.
    fn settle_terminal(&mut self) {
        if matches!(self.current_step().kind, StepKind::Terminate) {
            self.state.completion = Some(Completion::Terminated);
            tracing::info!(step_id = %self.state.current_step_id, "form terminated");
        }
    }

    /// Resolves the successor of `step`; `None` means the form ends here.
    fn next_index(&self, step: &StepSpec) -> Option<(StepId, usize)> {
        match resolve_next(step, &self.state.answers, &self.computed) {
            NextStep::FormEnd => None,
            NextStep::Step(next) => match step_index(&self.schema, &next) {
                Some(index) => Some((next, index)),
                None => {
                    tracing::warn!(
                        step_id = %step.step_id,
                        target = %next,
                        "navigation target is not defined, ending form"
                    );
                    None
                }
            },
        }
    }

    /// Walks forward from the start over satisfied steps, stopping at the
    /// first one that still needs input or at the last reachable step.
    fn resume(&mut self) -> Result<(), SessionError> {
        let limit = self.schema.steps.len();
        for _ in 0..=limit {
            let step = self.current_step();
            if matches!(step.kind, StepKind::Terminate) || !self.is_step_satisfied(step) {
                break;
            }
            let Some((next_step_id, next_index)) = self.next_index(step) else {
                break;
            };
            let step_id = self.state.current_step_id.clone();
            self.state.history.push(step_id);
            self.state.current_step_id = next_step_id;
            self.current_index = next_index;
            if self.state.history.len() > limit {
                return Err(self.cycle_error(limit));
            }
        }

        tracing::debug!(
            step_id = %self.state.current_step_id,
            walked = self.state.history.len(),
            "resumed from saved answers"
        );
        Ok(())
    }

    fn cycle_error(&self, limit: usize) -> SessionError {
        tracing::error!(
            start = %self.start,
            step_id = %self.state.current_step_id,
            limit,
            "navigation cycle while resuming"
        );
        SessionError::NavigationCycle {
            step_id: self.start.clone(),
            limit,
        }
    }
}

fn step_index(schema: &FormSchema, step_id: &str) -> Option<usize> {
    schema.steps.iter().position(|step| step.step_id == step_id)
}

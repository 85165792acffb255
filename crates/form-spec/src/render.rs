use serde_json::{Map, Value, json};

use crate::answers::AnswerValue;
use crate::session::{Completion, FormSession};
use crate::spec::field::{ChoiceOption, FieldSpec, FieldType};
use crate::spec::step::StepKind;
use crate::template::TemplateEngine;

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The current step waits for input.
    NeedInput,
    /// The form is finished and can be submitted.
    Complete,
    /// A terminate step ended the form.
    Terminated,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
            RenderStatus::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Headline,
    Info,
    Prompt,
    Summary,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Headline => "headline",
            MessageKind::Info => "info",
            MessageKind::Prompt => "prompt",
            MessageKind::Summary => "summary",
        }
    }
}

/// One chat bubble.
#[derive(Debug, Clone)]
pub struct RenderMessage {
    pub kind: MessageKind,
    pub text: String,
    pub field_id: Option<String>,
    pub field_type: Option<FieldType>,
    pub required: bool,
    pub options: Vec<ChoiceOption>,
    pub allow_multiple: bool,
    pub current_value: Option<AnswerValue>,
}

impl RenderMessage {
    fn text(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            field_id: None,
            field_type: None,
            required: false,
            options: Vec::new(),
            allow_multiple: false,
            current_value: None,
        }
    }

    fn prompt(field: &FieldSpec, current_value: Option<&AnswerValue>) -> Self {
        Self {
            kind: MessageKind::Prompt,
            text: field.label.clone(),
            field_id: Some(field.field_id.clone()),
            field_type: Some(field.kind),
            required: field.required,
            options: field.options().to_vec(),
            allow_multiple: field.allow_multiple,
            current_value: current_value.cloned(),
        }
    }
}

/// Field counters for the current step.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
    pub visited_steps: usize,
}

/// Everything a chat front-end needs to show the current step.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub schema_name: String,
    pub schema_version: String,
    pub step_id: String,
    pub step_kind: StepKind,
    pub status: RenderStatus,
    pub messages: Vec<RenderMessage>,
    pub pending_field_ids: Vec<String>,
    pub can_go_back: bool,
    pub progress: RenderProgress,
}

pub fn build_render_payload(session: &FormSession) -> RenderPayload {
    build_render_payload_with(session, &TemplateEngine::new())
}

pub fn build_render_payload_with(
    session: &FormSession,
    templates: &TemplateEngine,
) -> RenderPayload {
    let step = session.current_step();
    let answers = session.answers();
    let visible = session.visible_fields_of(step);
    let pending = session.pending_fields();

    let mut messages = Vec::new();
    let headline = match step.kind {
        StepKind::Normal => step.title.clone(),
        StepKind::Terminate | StepKind::Summary => {
            templates.render_or_raw(step.headline(), answers)
        }
    };
    messages.push(RenderMessage::text(MessageKind::Headline, headline));

    if matches!(step.kind, StepKind::Summary) {
        messages.extend(
            summary_lines(session)
                .into_iter()
                .map(|line| RenderMessage::text(MessageKind::Summary, line)),
        );
    }

    for field in &visible {
        if matches!(field.kind, FieldType::Info) {
            let body = field.text.as_deref().unwrap_or(&field.label);
            messages.push(RenderMessage::text(
                MessageKind::Info,
                templates.render_or_raw(body, answers),
            ));
        } else if pending
            .iter()
            .any(|pending| pending.field_id == field.field_id)
        {
            messages.push(RenderMessage::prompt(field, answers.get(&field.field_id)));
        }
    }

    let collectable: Vec<&&FieldSpec> = visible
        .iter()
        .filter(|field| field.kind.collects_value())
        .collect();
    let answered = collectable
        .iter()
        .filter(|field| answers.has_value(&field.field_id))
        .count();

    let status = match session.completion() {
        None => RenderStatus::NeedInput,
        Some(Completion::Finished) => RenderStatus::Complete,
        Some(Completion::Terminated) => RenderStatus::Terminated,
    };

    RenderPayload {
        schema_name: session.schema().name.clone(),
        schema_version: session.schema().version.clone(),
        step_id: step.step_id.clone(),
        step_kind: step.kind,
        status,
        messages,
        pending_field_ids: pending
            .iter()
            .map(|field| field.field_id.clone())
            .collect(),
        can_go_back: session.can_go_back(),
        progress: RenderProgress {
            answered,
            total: collectable.len(),
            visited_steps: session.history().len() + 1,
        },
    }
}

/// `label: value` for every answered field, in schema order.
fn summary_lines(session: &FormSession) -> Vec<String> {
    session
        .schema()
        .steps
        .iter()
        .flat_map(|step| step.fields.iter())
        .filter(|field| field.kind.collects_value())
        .filter_map(|field| {
            session
                .answers()
                .get(&field.field_id)
                .filter(|value| value.is_filled())
                .map(|value| format!("{}: {}", field.label, display_answer(field, value)))
        })
        .collect()
}

/// Button answers show the label of the picked option.
fn display_answer(field: &FieldSpec, value: &AnswerValue) -> String {
    field
        .options()
        .iter()
        .find(|option| option.matches(value))
        .map(|option| option.text().to_string())
        .unwrap_or_else(|| value.display())
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let messages = payload
        .messages
        .iter()
        .map(|message| {
            let mut map = Map::new();
            map.insert("kind".into(), Value::String(message.kind.as_str().into()));
            map.insert("text".into(), Value::String(message.text.clone()));
            if let Some(field_id) = &message.field_id {
                map.insert("field_id".into(), Value::String(field_id.clone()));
            }
            if let Some(field_type) = message.field_type {
                map.insert("type".into(), Value::String(field_type.as_str().into()));
                map.insert("required".into(), Value::Bool(message.required));
            }
            if !message.options.is_empty() {
                map.insert(
                    "buttons".into(),
                    Value::Array(
                        message
                            .options
                            .iter()
                            .map(|option| json!({ "text": option.text(), "value": option.value() }))
                            .collect(),
                    ),
                );
            }
            if message.allow_multiple {
                map.insert("allow_multiple".into(), Value::Bool(true));
            }
            if let Some(value) = &message.current_value {
                map.insert(
                    "current_value".into(),
                    serde_json::to_value(value).unwrap_or(Value::Null),
                );
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "schema_name": payload.schema_name,
        "schema_version": payload.schema_version,
        "step_id": payload.step_id,
        "step_kind": payload.step_kind.as_str(),
        "status": payload.status.as_str(),
        "pending_field_ids": payload.pending_field_ids,
        "can_go_back": payload.can_go_back,
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
            "visited_steps": payload.progress.visited_steps,
        },
        "messages": messages,
    })
}

/// Render the payload as chat transcript text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    for message in &payload.messages {
        match message.kind {
            MessageKind::Headline => lines.push(message.text.clone()),
            MessageKind::Info => lines.push(format!("  {}", message.text)),
            MessageKind::Summary => lines.push(format!("  - {}", message.text)),
            MessageKind::Prompt => {
                let mut entry = format!("> {}", message.text);
                if message.required {
                    entry.push_str(" *");
                }
                lines.push(entry);
                for (index, option) in message.options.iter().enumerate() {
                    lines.push(format!("    [{}] {}", index + 1, option.text()));
                }
            }
        }
    }

    match payload.status {
        RenderStatus::NeedInput => {}
        RenderStatus::Complete => lines.push("All steps are answered.".to_string()),
        RenderStatus::Terminated => lines.push("This form has ended.".to_string()),
    }

    lines.join("\n")
}

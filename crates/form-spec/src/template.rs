use handlebars::Handlebars;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::answers::AnswerSet;

#[derive(Debug, Error)]
#[error("template render failed: {0}")]
pub struct TemplateError(#[from] handlebars::RenderError);

/// Renders step texts such as `"Thanks, {{beneficiary_name}}!"` over the answers.
///
/// Answers are exposed both at the top level and under `answers`, formatted
/// for display. Output is not HTML-escaped; chat bubbles are plain text.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    pub fn render(&self, template: &str, answers: &AnswerSet) -> Result<String, TemplateError> {
        let context = template_context(answers);
        Ok(self.handlebars.render_template(template, &context)?)
    }

    /// Renders, or returns the raw text when the template is broken.
    pub fn render_or_raw(&self, template: &str, answers: &AnswerSet) -> String {
        match self.render(template, answers) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "falling back to raw step text");
                template.to_string()
            }
        }
    }
}

fn template_context(answers: &AnswerSet) -> Value {
    let display: Map<String, Value> = answers
        .iter()
        .map(|(field_id, value)| (field_id.to_string(), Value::String(value.display())))
        .collect();
    let mut root = display.clone();
    root.insert("answers".into(), Value::Object(display));
    Value::Object(root)
}

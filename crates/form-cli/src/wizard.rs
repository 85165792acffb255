use form_spec::{
    AnswerSet, FieldSpec, FieldType, RenderPayload, ValidationError, render_json_ui, render_text,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Step text and prompts only.
    Clean,
    /// Adds status lines, step ids and answer dumps.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Prints steps and prompts as the runner moves through the form.
pub struct WizardPresenter {
    verbosity: Verbosity,
    mode: OutputMode,
    header_printed: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, mode: OutputMode) -> Self {
        Self {
            verbosity,
            mode,
            header_printed: false,
        }
    }

    pub fn show_header(&mut self, payload: &RenderPayload, application_id: Option<&str>) {
        if self.header_printed {
            return;
        }
        println!("Form: {} (v{})", payload.schema_name, payload.schema_version);
        if let Some(application_id) = application_id {
            println!("Application: {}", application_id);
        }
        println!("Commands: :back, :restart, exit");
        self.header_printed = true;
    }

    pub fn show_step(&self, payload: &RenderPayload) {
        if self.verbosity.is_verbose() {
            println!(
                "Status: {} at '{}' ({}/{} answered, {} steps visited)",
                payload.status.as_str(),
                payload.step_id,
                payload.progress.answered,
                payload.progress.total,
                payload.progress.visited_steps
            );
        }
        match self.mode {
            OutputMode::Text => println!("\n{}", render_text(payload)),
            OutputMode::Json => match serde_json::to_string_pretty(&render_json_ui(payload)) {
                Ok(json) => println!("{}", json),
                Err(err) => eprintln!("Failed to encode step as JSON: {}", err),
            },
        }
    }

    pub fn show_prompt(&self, field: &FieldSpec) {
        let mut line = field.label.clone();
        if field.required {
            line.push_str(" *");
        }
        if let Some(hint) = hint_for(field) {
            line.push(' ');
            line.push_str(&hint);
        }
        println!("{}", line);
    }

    pub fn show_continue_prompt(&self, payload: &RenderPayload) {
        if payload.can_go_back {
            println!("Press Enter to continue or type :back to change an answer.");
        } else {
            println!("Press Enter to continue.");
        }
    }

    pub fn show_submit_prompt(&self, payload: &RenderPayload) {
        if payload.can_go_back {
            println!("Press Enter to submit or type :back to change an answer.");
        } else {
            println!("Press Enter to submit.");
        }
    }

    pub fn show_submit_failure(&self, error: &dyn std::error::Error) {
        eprintln!("Submission failed: {}", error);
        eprintln!("Press Enter to retry or type exit to stop. Your answers are kept.");
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_validation_errors(&self, errors: &[ValidationError]) {
        for error in errors {
            eprintln!("Invalid answer for {}: {}", error.field_id, error.message);
            if self.verbosity.is_verbose() {
                eprintln!("  Code: {}", error.code);
            }
        }
    }

    pub fn show_missing(&self, missing: &[String]) {
        eprintln!("Still required: {}", missing.join(", "));
    }

    pub fn show_save_failure(&self, error: &dyn std::error::Error) {
        eprintln!(
            "Warning: {}. Your answers are kept and will be saved with the next step.",
            error
        );
    }

    pub fn show_moved_back(&self, moved: bool) {
        if !moved {
            println!("You are at the first step.");
        }
    }

    pub fn show_paused(&self, application_id: Option<&str>) {
        match application_id {
            Some(application_id) => println!(
                "Progress saved. Continue later with --resume {}",
                application_id
            ),
            None => println!("Stopped."),
        }
    }

    pub fn show_terminated(&self) {
        println!("Nothing was submitted.");
    }

    pub fn show_submitted(&self, application_id: &str, answers: &AnswerSet) {
        println!("Submitted application {}", application_id);
        if !self.verbosity.is_verbose() {
            return;
        }
        match answers.to_cbor() {
            Ok(bytes) => println!("Answers (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize answers to CBOR: {}", err),
        }
        match answers.to_json_pretty() {
            Ok(pretty) => println!("{}", pretty),
            Err(err) => eprintln!("Failed to serialize answers to JSON: {}", err),
        }
    }
}

/// Input expectations shown next to a field label.
pub fn hint_for(field: &FieldSpec) -> Option<String> {
    match field.kind {
        FieldType::Date => Some("(DD.MM.YYYY)".to_string()),
        FieldType::Phone => Some("(phone number)".to_string()),
        FieldType::Email => Some("(email)".to_string()),
        FieldType::SingleChoiceButtons => Some(format!(
            "(1-{} or option text)",
            field.options().len()
        )),
        FieldType::MultipleChoiceCheckbox => {
            Some("(comma-separated numbers or options)".to_string())
        }
        FieldType::File if field.allow_multiple => {
            Some("(file_id:filename, comma-separated)".to_string())
        }
        FieldType::File => Some("(file_id:filename)".to_string()),
        FieldType::Info | FieldType::Text | FieldType::Textarea => None,
    }
}

/// Error produced when raw input cannot be turned into an answer.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

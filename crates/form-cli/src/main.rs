mod wizard;

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use form_runtime::{FileBackend, FormBackend, FormRunner, RuntimeConfig, RuntimeError};
use form_spec::{
    AnswerSet, AnswerValue, BackOutcome, ChoiceOption, FieldSpec, FieldType, FileRef, FormSchema,
    FormSession, RenderStatus, StepKind, StepOutcome, validate_schema,
};
use serde_json::json;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wizard::{AnswerParseError, OutputMode, Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const STATE_DIR_ENV: &str = "FORMCHAT_STATE_DIR";
const DEFAULT_STATE_DIR: &str = ".chatform";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Chat-style questionnaire runner",
    long_about = "Runs branching form schemas step by step in the terminal and stores applications on disk"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

impl From<RenderMode> for OutputMode {
    fn from(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Text => OutputMode::Text,
            RenderMode::Json => OutputMode::Json,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Fill in a form interactively.
    Run {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Directory holding applications (defaults to FORMCHAT_STATE_DIR or ./.chatform).
        #[arg(long, value_name = "DIR")]
        state_dir: Option<PathBuf>,
        /// Continue a saved application.
        #[arg(long, value_name = "ID")]
        resume: Option<String>,
        /// Runtime configuration JSON.
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// How each step is printed.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
        /// Show status lines and debug logging.
        #[arg(long, alias = "debug")]
        verbose: bool,
    },
    /// Check a schema for structural problems.
    Validate {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print the JSON Schema of the form schema format.
    JsonSchema,
    /// Show where saved answers would resume.
    ResumePoint {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Command::Run { verbose: true, .. });
    init_tracing(verbose);

    match cli.command {
        Command::Run {
            schema,
            state_dir,
            resume,
            config,
            format,
            verbose,
        } => {
            run_form(RunOptions {
                schema,
                state_dir: resolve_state_dir(state_dir),
                resume,
                config,
                format,
                verbose,
            })
            .await
        }
        Command::Validate { schema, config } => run_validate(&schema, config.as_deref()),
        Command::JsonSchema => run_json_schema(),
        Command::ResumePoint {
            schema,
            answers,
            config,
        } => run_resume_point(&schema, &answers, config.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn resolve_state_dir(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| env::var_os(STATE_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
}

fn load_config(path: Option<&Path>) -> CliResult<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default().with_env_overrides()?,
    };
    Ok(config)
}

fn load_schema(path: &Path) -> CliResult<FormSchema> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read schema {}: {}", path.display(), err))?;
    Ok(FormSchema::from_json_str(&raw)?)
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn run_validate(schema_path: &Path, config_path: Option<&Path>) -> CliResult<()> {
    let schema = load_schema(schema_path)?;
    let config = load_config(config_path)?;
    match validate_schema(&schema, &config.registry(today())) {
        Ok(()) => {
            println!(
                "Schema '{}' v{} is valid ({} steps)",
                schema.name,
                schema.version,
                schema.steps.len()
            );
            Ok(())
        }
        Err(err) => {
            println!("Schema '{}' is invalid: {}", schema.name, err);
            Err("validation failed".into())
        }
    }
}

fn run_json_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(FormSchema);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_resume_point(
    schema_path: &Path,
    answers_path: &Path,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let schema = load_schema(schema_path)?;
    let config = load_config(config_path)?;
    let raw = fs::read_to_string(answers_path)?;
    let answers = AnswerSet::from_json(serde_json::from_str(&raw)?)?;

    let session = FormSession::builder(schema)
        .config(config.session)
        .registry(config.registry(today()))
        .resume(answers)
        .build()?;
    let report = json!({
        "step_id": session.current_step_id(),
        "history": session.history(),
        "completion": session.completion(),
        "pending_field_ids": session
            .pending_fields()
            .iter()
            .map(|field| field.field_id.as_str())
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

struct RunOptions {
    schema: PathBuf,
    state_dir: PathBuf,
    resume: Option<String>,
    config: Option<PathBuf>,
    format: RenderMode,
    verbose: bool,
}

/// One line of user input, after commands are recognized.
#[derive(Debug, PartialEq)]
enum Input {
    Answer(Option<AnswerValue>),
    Back,
    Restart,
    Exit,
}

async fn run_form(options: RunOptions) -> CliResult<()> {
    let config = load_config(options.config.as_deref())?;
    let schema = load_schema(&options.schema)?;
    let backend = FileBackend::new(&options.state_dir);
    backend.install_schema(&schema).await?;
    tracing::debug!(state_dir = %options.state_dir.display(), "schema installed");

    let mut runner = FormRunner::new(backend, config);
    runner.start(options.resume.as_deref()).await?;
    let mut presenter = WizardPresenter::new(
        Verbosity::from_verbose(options.verbose),
        options.format.into(),
    );

    let mut confirmed = false;
    loop {
        let payload = runner.render()?;
        presenter.show_header(&payload, runner.application_id());
        presenter.show_step(&payload);

        match payload.status {
            RenderStatus::Terminated => {
                presenter.show_terminated();
                return Ok(());
            }
            RenderStatus::Complete => {
                if !confirmed && payload.step_kind != StepKind::Summary {
                    presenter.show_submit_prompt(&payload);
                    match read_command()? {
                        Input::Answer(_) => confirmed = true,
                        command => {
                            let flow = apply_command(&mut runner, &presenter, command).await?;
                            if flow == Flow::Stop {
                                return Ok(());
                            }
                            continue;
                        }
                    }
                }
                match runner.submit().await {
                    Ok(application_id) => {
                        presenter.show_submitted(&application_id, runner.session()?.answers());
                        return Ok(());
                    }
                    Err(err @ (RuntimeError::Submission(_) | RuntimeError::Persistence(_))) => {
                        presenter.show_submit_failure(&err);
                        let command = read_command()?;
                        if apply_command(&mut runner, &presenter, command).await? == Flow::Stop {
                            return Ok(());
                        }
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            RenderStatus::NeedInput => confirmed = false,
        }

        let pending: Vec<FieldSpec> = runner
            .session()?
            .pending_fields()
            .into_iter()
            .cloned()
            .collect();

        let mut partial = AnswerSet::new();
        let mut command = None;
        if pending.is_empty() {
            presenter.show_continue_prompt(&payload);
            match read_command()? {
                Input::Answer(_) => {}
                other => command = Some(other),
            }
        }
        for field in &pending {
            match prompt_field(field, &presenter)? {
                Input::Answer(Some(value)) => {
                    partial.insert(field.field_id.clone(), value);
                }
                Input::Answer(None) => {}
                other => {
                    command = Some(other);
                    break;
                }
            }
        }

        if let Some(command) = command {
            if apply_command(&mut runner, &presenter, command).await? == Flow::Stop {
                return Ok(());
            }
            continue;
        }

        if let Err(err) = link_files(&mut runner, &partial).await {
            report_step_error(&presenter, err)?;
            continue;
        }

        match runner.answer(partial).await {
            Ok(StepOutcome::Blocked { missing_field_ids }) => {
                presenter.show_missing(&missing_field_ids)
            }
            Ok(outcome) => tracing::debug!(?outcome, "step answered"),
            Err(err) => report_step_error(&presenter, err)?,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Stop,
}

/// Runs a navigation command; a plain answer line just continues.
async fn apply_command<B: FormBackend>(
    runner: &mut FormRunner<B>,
    presenter: &WizardPresenter,
    command: Input,
) -> CliResult<Flow> {
    match command {
        Input::Back => match runner.go_back().await {
            Ok(outcome) => presenter.show_moved_back(outcome != BackOutcome::NoHistory),
            Err(err) => report_step_error(presenter, err)?,
        },
        Input::Restart => {
            if let Err(err) = runner.restart().await {
                report_step_error(presenter, err)?;
            }
        }
        Input::Exit => {
            if runner.is_dirty() {
                runner.save().await?;
            }
            presenter.show_paused(runner.application_id());
            return Ok(Flow::Stop);
        }
        Input::Answer(_) => {}
    }
    Ok(Flow::Continue)
}

/// Prints recoverable runner errors; anything else ends the run.
fn report_step_error(presenter: &WizardPresenter, err: RuntimeError) -> CliResult<()> {
    match err {
        RuntimeError::Validation(errors) => {
            presenter.show_validation_errors(&errors);
            Ok(())
        }
        RuntimeError::Persistence(err) => {
            presenter.show_save_failure(&err);
            Ok(())
        }
        other => Err(other.into()),
    }
}

async fn link_files<B: FormBackend>(
    runner: &mut FormRunner<B>,
    partial: &AnswerSet,
) -> Result<(), RuntimeError> {
    for (field_id, value) in partial.iter() {
        let files: &[FileRef] = match value {
            AnswerValue::File(file) => std::slice::from_ref(file),
            AnswerValue::Files(files) => files,
            _ => continue,
        };
        for file in files {
            runner
                .attach_file(field_id, &file.file_id, &file.filename)
                .await?;
        }
    }
    Ok(())
}

fn read_line() -> CliResult<String> {
    print!("> ");
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok("exit".to_string());
    }
    Ok(input.trim().to_string())
}

fn parse_command(raw: &str) -> Option<Input> {
    match raw.to_ascii_lowercase().as_str() {
        ":back" => Some(Input::Back),
        ":restart" => Some(Input::Restart),
        "exit" | ":exit" | ":quit" => Some(Input::Exit),
        _ => None,
    }
}

fn read_command() -> CliResult<Input> {
    let line = read_line()?;
    Ok(parse_command(&line).unwrap_or(Input::Answer(None)))
}

fn prompt_field(field: &FieldSpec, presenter: &WizardPresenter) -> CliResult<Input> {
    loop {
        presenter.show_prompt(field);
        let line = read_line()?;
        if let Some(command) = parse_command(&line) {
            return Ok(command);
        }
        match parse_answer(field, &line) {
            Ok(value) => return Ok(Input::Answer(value)),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

/// Turns raw input into an answer; `None` skips an optional field.
fn parse_answer(field: &FieldSpec, raw: &str) -> Result<Option<AnswerValue>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if field.required {
            return Err(AnswerParseError::new(
                "This field requires an answer.",
                None,
            ));
        }
        return Ok(None);
    }

    let value = match field.kind {
        FieldType::SingleChoiceButtons => parse_option(field, raw)?.to_answer(),
        FieldType::MultipleChoiceCheckbox => AnswerValue::List(parse_options(field, raw)?),
        FieldType::File => parse_files(field, raw)?,
        FieldType::Info => {
            return Err(AnswerParseError::new(
                "This message does not take an answer.",
                None,
            ));
        }
        FieldType::Text
        | FieldType::Textarea
        | FieldType::Date
        | FieldType::Phone
        | FieldType::Email => AnswerValue::Text(raw.to_string()),
    };
    Ok(Some(value))
}

fn parse_option<'a>(
    field: &'a FieldSpec,
    raw: &str,
) -> Result<&'a ChoiceOption, AnswerParseError> {
    let options = field.options();
    if let Ok(index) = raw.parse::<usize>()
        && (1..=options.len()).contains(&index)
    {
        return Ok(&options[index - 1]);
    }
    options
        .iter()
        .find(|option| {
            option.text().eq_ignore_ascii_case(raw)
                || option
                    .text_value()
                    .is_some_and(|value| value.eq_ignore_ascii_case(raw))
        })
        .ok_or_else(|| {
            AnswerParseError::new(
                format!("Choose one of: {}.", field.option_list()),
                Some(format!("a number from 1 to {} or option text", options.len())),
            )
        })
}

fn parse_options(field: &FieldSpec, raw: &str) -> Result<Vec<String>, AnswerParseError> {
    let mut selected: Vec<String> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let option = parse_option(field, part)?;
        let value = option.text_value().ok_or_else(|| {
            AnswerParseError::new(format!("'{}' cannot be selected here.", option.text()), None)
        })?;
        if !selected.iter().any(|chosen| chosen == value) {
            selected.push(value.to_string());
        }
    }
    Ok(selected)
}

fn parse_files(field: &FieldSpec, raw: &str) -> Result<AnswerValue, AnswerParseError> {
    let mut files = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (file_id, filename) = part
            .split_once(':')
            .map(|(id, name)| (id.trim(), name.trim()))
            .filter(|(id, name)| !id.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                AnswerParseError::new(
                    format!("'{}' is not a file reference.", part),
                    Some("file_id:filename".to_string()),
                )
            })?;
        files.push(FileRef::new(file_id, filename));
    }

    match files.len() {
        0 => Err(AnswerParseError::new("No file was given.", None)),
        _ if field.allow_multiple => Ok(AnswerValue::Files(files)),
        1 => Ok(AnswerValue::File(files.remove(0))),
        _ => Err(AnswerParseError::new(
            "Only one file can be attached here.",
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buttons() -> FieldSpec {
        FieldSpec::new("need_type", FieldType::SingleChoiceButtons, "Equipment")
            .required()
            .with_options(["wheelchair", "console", "components"])
    }

    #[test]
    fn parse_answer_buttons_accepts_index_and_text() {
        let field = buttons();
        assert_eq!(
            parse_answer(&field, "2").unwrap(),
            Some(AnswerValue::Text("console".into()))
        );
        assert_eq!(
            parse_answer(&field, "Wheelchair").unwrap(),
            Some(AnswerValue::Text("wheelchair".into()))
        );
        assert!(parse_answer(&field, "4").is_err());
        assert!(parse_answer(&field, "bicycle").is_err());
    }

    #[test]
    fn parse_answer_buttons_returns_typed_values() {
        let field = FieldSpec::new("consent", FieldType::SingleChoiceButtons, "Consent")
            .required()
            .with_options([
                ChoiceOption::labeled("Yes, I agree", true),
                ChoiceOption::labeled("No", false),
            ]);
        assert_eq!(
            parse_answer(&field, "1").unwrap(),
            Some(AnswerValue::Bool(true))
        );
        assert_eq!(
            parse_answer(&field, "no").unwrap(),
            Some(AnswerValue::Bool(false))
        );
        assert!(parse_answer(&field, "true").is_err());
    }

    #[test]
    fn parse_answer_checkbox_collects_unique_options() {
        let field = FieldSpec::new("parts", FieldType::MultipleChoiceCheckbox, "Parts")
            .with_options(["wheels", "cushion", "frame"]);
        assert_eq!(
            parse_answer(&field, "1, frame, wheels").unwrap(),
            Some(AnswerValue::List(vec!["wheels".into(), "frame".into()]))
        );
        assert!(parse_answer(&field, "1, wings").is_err());
    }

    #[test]
    fn parse_answer_files_respects_allow_multiple() {
        let mut field = FieldSpec::new("passport", FieldType::File, "Passport").required();
        assert_eq!(
            parse_answer(&field, "f-1:passport.pdf").unwrap(),
            Some(AnswerValue::File(FileRef::new("f-1", "passport.pdf")))
        );
        assert!(parse_answer(&field, "f-1:a.pdf, f-2:b.pdf").is_err());
        assert!(parse_answer(&field, "passport.pdf").is_err());

        field.allow_multiple = true;
        assert_eq!(
            parse_answer(&field, "f-1:a.pdf, f-2:b.pdf").unwrap(),
            Some(AnswerValue::Files(vec![
                FileRef::new("f-1", "a.pdf"),
                FileRef::new("f-2", "b.pdf"),
            ]))
        );
    }

    #[test]
    fn parse_answer_blank_skips_optional_fields_only() {
        let optional = FieldSpec::new("note", FieldType::Textarea, "Note");
        assert_eq!(parse_answer(&optional, "  ").unwrap(), None);

        let required = FieldSpec::new("city", FieldType::Text, "City").required();
        assert!(parse_answer(&required, "").is_err());
        assert_eq!(
            parse_answer(&required, " Kazan ").unwrap(),
            Some(AnswerValue::Text("Kazan".into()))
        );
    }

    #[test]
    fn commands_are_recognized() {
        assert_eq!(parse_command(":back"), Some(Input::Back));
        assert_eq!(parse_command(":RESTART"), Some(Input::Restart));
        assert_eq!(parse_command("exit"), Some(Input::Exit));
        assert_eq!(parse_command("back"), None);
    }

    #[test]
    fn state_dir_prefers_argument() {
        assert_eq!(
            resolve_state_dir(Some(PathBuf::from("/tmp/forms"))),
            PathBuf::from("/tmp/forms")
        );
    }
}

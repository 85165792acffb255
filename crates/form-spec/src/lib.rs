#![allow(missing_docs)]

pub mod answers;
pub mod condition;
pub mod navigation;
pub mod render;
pub mod session;
pub mod spec;
pub mod template;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerSet, AnswerValue, FileRef};
pub use condition::{Condition, ConditionValue, Operator, Scalar};
pub use navigation::{ComputedFn, ComputedRegistry, NextStep, age_branch, resolve_next};
pub use render::{
    MessageKind, RenderMessage, RenderPayload, RenderProgress, RenderStatus, build_render_payload,
    build_render_payload_with, render_json_ui, render_text,
};
pub use session::{
    BackOutcome, Completion, FieldPresentationMode, FormSession, RestartPolicy, SessionBuilder,
    SessionConfig, SessionError, SessionPhase, SessionState, StepOutcome,
};
pub use spec::{
    ChoiceOption, FieldSpec, FieldType, FieldValidation, FormSchema, Navigation, NavigationRule,
    StepId, StepKind, StepSpec,
};
pub use template::{TemplateEngine, TemplateError};
pub use validate::{SchemaError, ValidationError, parse_date, validate_field_value, validate_schema};
pub use visibility::{VisibilityMode, is_field_visible, missing_required, visible_fields};

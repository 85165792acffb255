pub mod field;
pub mod schema;
pub mod step;

pub use field::{ChoiceOption, FieldSpec, FieldType, FieldValidation};
pub use schema::FormSchema;
pub use step::{Navigation, NavigationRule, StepId, StepKind, StepSpec};

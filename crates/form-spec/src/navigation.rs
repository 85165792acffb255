use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::answers::AnswerSet;
use crate::spec::step::{Navigation, StepId, StepSpec};
use crate::validate::parse_date;

/// Where navigation leads after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Step(StepId),
    FormEnd,
}

pub type ComputedFn = Arc<dyn Fn(&AnswerSet) -> Option<StepId> + Send + Sync>;

/// Named navigation functions referenced by `computed` navigation.
#[derive(Clone, Default)]
pub struct ComputedRegistry {
    functions: BTreeMap<String, ComputedFn>,
}

impl ComputedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&AnswerSet) -> Option<StepId> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn with<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&AnswerSet) -> Option<StepId> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&self, name: &str, answers: &AnswerSet) -> Option<StepId> {
        self.functions.get(name).and_then(|function| function(answers))
    }
}

impl fmt::Debug for ComputedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Computes the step following `step`.
///
/// Does not check that the returned id exists; schema validation covers
/// direct and conditional targets, the session covers computed ones.
pub fn resolve_next(step: &StepSpec, answers: &AnswerSet, computed: &ComputedRegistry) -> NextStep {
    match &step.navigation {
        Navigation::Direct { next_step_id } => NextStep::Step(next_step_id.clone()),
        Navigation::Conditional {
            source_field_id,
            rules,
            default_next_step_id,
        } => {
            let answer = answers.get(source_field_id);
            let matched = answer.and_then(|value| {
                rules
                    .iter()
                    .find(|rule| rule.value.matches(value))
                    .map(|rule| rule.next_step_id.clone())
            });
            match matched.or_else(|| default_next_step_id.clone()) {
                Some(next) => NextStep::Step(next),
                None => NextStep::FormEnd,
            }
        }
        Navigation::Submit {} => NextStep::FormEnd,
        Navigation::Computed { function, .. } => {
            if !computed.contains(function) {
                tracing::warn!(
                    step_id = %step.step_id,
                    function = %function,
                    "computed navigation function is not registered"
                );
            }
            match computed.call(function, answers) {
                Some(next) => NextStep::Step(next),
                None => NextStep::FormEnd,
            }
        }
    }
}

/// Routes on the age derived from a `DD.MM.YYYY` birth date.
///
/// Missing or unparsable dates take the `otherwise` branch.
pub fn age_branch(
    birth_date_field: impl Into<String>,
    years: u32,
    under: impl Into<StepId>,
    otherwise: impl Into<StepId>,
    today: NaiveDate,
) -> impl Fn(&AnswerSet) -> Option<StepId> + Send + Sync + 'static {
    let field = birth_date_field.into();
    let under = under.into();
    let otherwise = otherwise.into();
    move |answers: &AnswerSet| {
        let age = answers
            .get(&field)
            .and_then(|value| value.as_str())
            .and_then(parse_date)
            .map(|birth| age_on(birth, today));
        match age {
            Some(age) if age < years as i32 => Some(under.clone()),
            _ => Some(otherwise.clone()),
        }
    }
}

fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

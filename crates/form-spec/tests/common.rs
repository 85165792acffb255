#![allow(dead_code)]

use chrono::NaiveDate;
use form_spec::{
    AnswerSet, ComputedRegistry, FileRef, FormSchema, FormSession, SessionConfig, age_branch,
};

pub fn fixture(name: &str) -> &'static str {
    match name {
        "application_form" => include_str!("../tests/fixtures/application_form.json"),
        "yes_no_form" => include_str!("../tests/fixtures/yes_no_form.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

pub fn application_schema() -> FormSchema {
    serde_json::from_str(fixture("application_form")).expect("deserialize")
}

/// Consent and certificate questions answered with boolean buttons.
pub fn yes_no_schema() -> FormSchema {
    serde_json::from_str(fixture("yes_no_form")).expect("deserialize")
}

pub fn yes_no_session() -> FormSession {
    FormSession::builder(yes_no_schema())
        .application_id("app-2")
        .build()
        .expect("session")
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).expect("date")
}

pub fn registry() -> ComputedRegistry {
    ComputedRegistry::new().with(
        "documents",
        age_branch("birth_date", 14, "child-docs", "adult-docs", today()),
    )
}

pub fn session_with(config: SessionConfig, resumed: Option<AnswerSet>) -> FormSession {
    let mut builder = FormSession::builder(application_schema())
        .registry(registry())
        .config(config)
        .application_id("app-1");
    if let Some(answers) = resumed {
        builder = builder.resume(answers);
    }
    builder.build().expect("session")
}

pub fn session() -> FormSession {
    session_with(SessionConfig::default(), None)
}

pub fn beneficiary_answers() -> AnswerSet {
    AnswerSet::new()
        .with("beneficiary_name", "Anna Petrova")
        .with("birth_date", "01.02.2015")
        .with("city", "Kazan")
        .with("phone", "+7 912 345-67-89")
        .with("email", "anna@example.org")
}

pub fn full_answers() -> AnswerSet {
    let mut answers = AnswerSet::new()
        .with("consent", "Agree")
        .with("applicant_type", "parent")
        .with("contact_person_name", "Olga Petrova")
        .with("need_type", "wheelchair")
        .with("has_certificate", "No");
    answers.merge(beneficiary_answers());
    answers.insert(
        "birth_certificate",
        form_spec::AnswerValue::Files(vec![FileRef::new("f-1", "birth.pdf")]),
    );
    answers
}

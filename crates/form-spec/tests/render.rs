mod common;

use common::{full_answers, session, session_with, yes_no_session};
use form_spec::{
    AnswerSet, MessageKind, RenderStatus, SessionConfig, build_render_payload, render_json_ui,
    render_text,
};

#[test]
fn first_step_shows_info_and_buttons() {
    let session = session();
    let payload = build_render_payload(&session);

    assert_eq!(payload.status, RenderStatus::NeedInput);
    assert_eq!(payload.step_id, "consent");
    assert_eq!(payload.pending_field_ids, ["consent"]);
    assert!(!payload.can_go_back);

    let kinds: Vec<MessageKind> = payload.messages.iter().map(|message| message.kind).collect();
    assert_eq!(
        kinds,
        [MessageKind::Headline, MessageKind::Info, MessageKind::Prompt]
    );

    let text = render_text(&payload);
    assert!(text.contains("Your answers are only used"));
    assert!(text.contains("> Do you agree? *"));
    assert!(text.contains("[1] Agree"));
    assert!(text.contains("[2] Decline"));
}

#[test]
fn json_ui_exposes_buttons_and_progress() {
    let mut session = session();
    session
        .submit_step_answers(AnswerSet::new().with("consent", "Agree"))
        .expect("submit");
    let ui = render_json_ui(&build_render_payload(&session));

    assert_eq!(ui["schema_name"], "equipment-application");
    assert_eq!(ui["step_id"], "applicant-type");
    assert_eq!(ui["status"], "need_input");
    assert_eq!(ui["can_go_back"], true);
    assert_eq!(ui["progress"]["total"], 1);
    assert_eq!(ui["progress"]["visited_steps"], 2);

    let messages = ui["messages"].as_array().expect("messages");
    let prompt = &messages[1];
    assert_eq!(prompt["field_id"], "applicant_type");
    assert_eq!(prompt["type"], "single_choice_buttons");
    let buttons = prompt["buttons"].as_array().expect("buttons");
    assert_eq!(buttons.len(), 4);
    assert_eq!(buttons[0]["value"], "self");
}

#[test]
fn summary_lists_answers_and_renders_template() {
    let session = session_with(SessionConfig::default(), Some(full_answers()));
    let payload = build_render_payload(&session);
    assert_eq!(payload.step_id, "summary");
    assert!(payload.pending_field_ids.is_empty());

    let text = render_text(&payload);
    assert!(text.contains("Please check the application for Anna Petrova."));
    assert!(text.contains("- Full name: Anna Petrova"));
    assert!(text.contains("- Equipment: wheelchair"));
    assert!(text.contains("- Birth certificate: birth.pdf"));
    assert!(!text.contains("Certificate number"));
}

#[test]
fn terminated_form_reports_status() {
    let mut session = session();
    session
        .submit_step_answers(AnswerSet::new().with("consent", "Decline"))
        .expect("submit");
    let payload = build_render_payload(&session);

    assert_eq!(payload.status, RenderStatus::Terminated);
    assert_eq!(
        payload.messages[0].text,
        "Without consent we cannot continue. You can start again at any time."
    );
    assert!(render_text(&payload).ends_with("This form has ended."));
    assert_eq!(render_json_ui(&payload)["status"], "terminated");
}

#[test]
fn finished_form_reports_complete() {
    let mut session = session_with(SessionConfig::default(), Some(full_answers()));
    session
        .submit_step_answers(AnswerSet::new())
        .expect("submit");
    let payload = build_render_payload(&session);
    assert_eq!(payload.status, RenderStatus::Complete);
    assert!(render_text(&payload).ends_with("All steps are answered."));
}

#[test]
fn boolean_buttons_keep_labels_and_typed_values() {
    let mut session = yes_no_session();
    let payload = build_render_payload(&session);
    let text = render_text(&payload);
    assert!(text.contains("[1] Yes, I agree"));
    assert!(text.contains("[2] No"));

    let ui = render_json_ui(&payload);
    let buttons = ui["messages"][1]["buttons"].as_array().expect("buttons");
    assert_eq!(buttons[0]["text"], "Yes, I agree");
    assert_eq!(buttons[0]["value"], true);
    assert_eq!(buttons[1]["value"], false);

    for answers in [
        AnswerSet::new().with("consent", true),
        AnswerSet::new().with("applicant_type", "self"),
        AnswerSet::new().with("has_certificate", false),
    ] {
        session.submit_step_answers(answers).expect("submit");
    }
    let summary = render_text(&build_render_payload(&session));
    assert!(summary.contains("Consent: Yes, I agree"));
    assert!(summary.contains("Do you have a certificate?: No"));
}

use authflow::api::{FollowUpSpec, FormQuestionCatalog};
use authflow::automation::session::{QuestionState, SearchBatch, SessionSnapshot};
use authflow::automation::{
    ContentKey, HumanGate, ProgressEvent, SearchResultItem, SessionStatus, StepActivity,
};
use authflow::render::{
    project, ProjectionContext, RenderFrame, ScrollTarget, SectionBody, SectionId, ViewState,
};
use authflow::shared::ids::{CaseId, QuestionId};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

fn snapshot(status: SessionStatus, current_step: u32) -> SessionSnapshot {
    SessionSnapshot {
        case_id: CaseId::parse("42").expect("case id"),
        status,
        current_step,
        total_steps: 2,
        step_results: BTreeMap::new(),
        step_history: Vec::new(),
        activity: StepActivity::default(),
        gate: None,
        error: None,
        active: None,
        last_event: None,
        follow_up_triggers: BTreeMap::new(),
    }
}

fn result(url: &str, title: &str, source: &str) -> SearchResultItem {
    SearchResultItem {
        url: Some(url.to_string()),
        title: Some(title.to_string()),
        source: Some(source.to_string()),
        ..SearchResultItem::default()
    }
}

fn question(id: &str, answer: Option<&str>) -> QuestionState {
    QuestionState {
        id: QuestionId::parse(id).expect("question id"),
        question: Some(format!("Question {id}")),
        answer: answer.map(str::to_string),
        status: "completed".to_string(),
        source: None,
        follow_up: None,
        user_edited: false,
    }
}

fn render(snapshot: &SessionSnapshot) -> RenderFrame {
    project(
        snapshot,
        snapshot.last_event.as_ref(),
        &ViewState::default(),
        &ProjectionContext::default(),
    )
}

fn event(value: serde_json::Value) -> ProgressEvent {
    ProgressEvent::from_value(value).expect("event")
}

#[test]
fn fallback_results_are_hidden_among_real_ones() {
    let mut snap = snapshot(SessionStatus::Running, 1);
    snap.activity.search_batches = vec![
        SearchBatch {
            query: "Aetna lumbar MRI".to_string(),
            results: vec![
                result("https://www.aetna.com/cpb/0236.html", "Spine MRI", "Aetna"),
                result("https://example.com/policy", "Spine MRI", "Aetna"),
                result("https://cms.gov/lcd", "Imaging policy", "Generic"),
                result("https://cms.gov/lcd", "Generic Coverage Policy", "CMS"),
            ],
        },
        SearchBatch {
            query: "placeholder only".to_string(),
            results: vec![result("https://placeholder.org/x", "Policy", "Payer")],
        },
    ];

    let frame = render(&snap);
    let section = frame.section(SectionId::SearchResults).expect("search section");
    let SectionBody::SearchResults { batches, .. } = &section.body else {
        panic!("unexpected body {:?}", section.body);
    };
    assert_eq!(batches[0].items.len(), 1);
    assert_eq!(batches[0].items[0].source, "Aetna");
    assert_eq!(batches[0].hidden_fallbacks, 3);
    assert!(!batches[0].waiting_for_real_results());
    assert!(batches[1].waiting_for_real_results());
}

#[test]
fn projection_is_pure() {
    let mut snap = snapshot(SessionStatus::Running, 2);
    snap.activity.questions = vec![question("q1", Some("Yes"))];
    snap.last_event = Some(event(json!({"type": "question_start", "question_id": "q1"})));
    let view = ViewState::default();
    let ctx = ProjectionContext::default();

    let first = project(&snap, snap.last_event.as_ref(), &view, &ctx);
    let second = project(&snap, snap.last_event.as_ref(), &view, &ctx);
    assert_eq!(first, second);
}

#[test]
fn current_step_sections_default_expanded_and_overrides_apply() {
    let coverage = render(&snapshot(SessionStatus::Running, 1));
    assert!(coverage.section(SectionId::SearchResults).expect("search").expanded);
    assert!(coverage.section(SectionId::Requirements).expect("reqs").expanded);
    assert!(!coverage.section(SectionId::FormAnswers).expect("form").expanded);

    let form_snap = snapshot(SessionStatus::Running, 2);
    let mut view = ViewState::default();
    let form = project(&form_snap, None, &view, &ProjectionContext::default());
    assert!(form.section(SectionId::FormAnswers).expect("form").expanded);
    assert!(!form.section(SectionId::SearchResults).expect("search").expanded);

    view.toggle_section(SectionId::SearchResults, false);
    view.toggle_section(SectionId::FormAnswers, true);
    let toggled = project(&form_snap, None, &view, &ProjectionContext::default());
    assert!(toggled.section(SectionId::SearchResults).expect("search").expanded);
    assert!(!toggled.section(SectionId::FormAnswers).expect("form").expanded);
}

#[test]
fn follow_up_is_shown_only_when_the_trigger_matches() {
    let mut snap = snapshot(SessionStatus::Running, 2);
    let mut q1 = question("q1", Some("Yes"));
    q1.follow_up = Some(FollowUpSpec {
        condition: Some("Yes".to_string()),
        question: Some("Which therapy?".to_string()),
        kind: None,
    });
    let mut follow_up = question("q1_followup", Some("Physical therapy"));
    follow_up.question = None;
    snap.activity.questions = vec![q1, follow_up, question("q2", Some("No"))];

    let catalog: FormQuestionCatalog = serde_json::from_value(json!({
        "sections": [{
            "section_name": "History",
            "questions": [
                {"id": "q2", "question": "Surgery planned?", "follow_up": {"condition": "Yes", "question": "When?"}}
            ]
        }]
    }))
    .expect("catalog");
    let ctx = ProjectionContext {
        catalog: Some(catalog),
        ..ProjectionContext::default()
    };

    let frame = project(&snap, None, &ViewState::default(), &ctx);
    let section = frame.section(SectionId::FormAnswers).expect("form");
    let SectionBody::FormAnswers { questions, .. } = &section.body else {
        panic!("unexpected body {:?}", section.body);
    };
    assert_eq!(questions.len(), 2, "follow-ups are nested, not listed");
    assert_eq!(questions[0].id.as_str(), "q1");
    let follow_up = questions[0].follow_up.as_ref().expect("q1 follow-up");
    assert_eq!(follow_up.question, "Which therapy?");
    assert_eq!(follow_up.answer.as_deref(), Some("Physical therapy"));
    assert!(questions[1].follow_up.is_none());
}

#[test]
fn progress_tracks_step_position() {
    let running = render(&snapshot(SessionStatus::Running, 1));
    assert_eq!(running.progress.percent, 50);
    assert_eq!(running.progress.label, "50% Complete");
    assert_eq!(running.header.step_label, "Step 1: Policy Research & Coverage Analysis");

    let done = render(&snapshot(SessionStatus::Complete, 3));
    assert_eq!(done.progress.percent, 100);
    assert_eq!(done.header.step_label, "Workflow complete");
}

#[test]
fn gate_panel_takes_scroll_priority_over_events() {
    let mut snap = snapshot(SessionStatus::AwaitingTransition, 1);
    snap.gate = Some(HumanGate {
        clinician_message: "Please send the imaging report.".to_string(),
        missing_documents: vec!["Imaging report".to_string()],
        validation_notes: Vec::new(),
    });
    snap.last_event = Some(event(json!({"type": "section_start", "section": "History"})));

    let frame = render(&snap);
    let gate = frame.gate.expect("gate panel");
    assert_eq!(gate.subject, "Prior Authorization - Missing Information");
    assert_eq!(gate.missing_documents, vec!["Imaging report"]);
    assert_eq!(frame.scroll_target, Some(ScrollTarget::Gate));
    assert_eq!(frame.header.status_label, "Needs clinician input");
}

#[test]
fn error_panel_offers_retry_of_the_current_step() {
    let mut snap = snapshot(SessionStatus::Error, 2);
    snap.error = Some("stream closed before step completed".to_string());
    let frame = render(&snap);
    let error = frame.error.expect("error panel");
    assert_eq!(error.message, "stream closed before step completed");
    assert!(error.retry_hint.contains("step 2"));
    assert_eq!(frame.scroll_target, Some(ScrollTarget::Error));
}

#[test]
fn follow_up_results_scroll_to_their_parent_question() {
    let mut snap = snapshot(SessionStatus::Running, 2);
    snap.last_event = Some(event(json!({
        "type": "question_result",
        "question_id": "q7_followup",
        "answer": "6 weeks"
    })));
    let frame = render(&snap);
    assert_eq!(
        frame.scroll_target,
        Some(ScrollTarget::Question("q7".to_string()))
    );
    assert_eq!(frame.scroll_delay, Some(Duration::from_millis(300)));

    snap.last_event = Some(event(json!({"type": "section_start", "section": "History"})));
    let frame = render(&snap);
    assert_eq!(
        frame.scroll_target,
        Some(ScrollTarget::Section("History".to_string()))
    );
    assert_eq!(frame.scroll_delay, Some(Duration::from_millis(100)));
}

#[test]
fn requirements_are_summarised_from_the_coverage_result() {
    let mut snap = snapshot(SessionStatus::AwaitingTransition, 1);
    snap.step_results.insert(
        ContentKey::Coverage,
        json!({
            "coverage_status": "covered_with_criteria",
            "requirements": [
                {"requirement_type": "documentation", "description": "6 weeks of conservative therapy"}
            ],
            "parsing_agent_result": {
                "request_validation": {"is_valid": true},
                "critical_requirements": [
                    {"requirement": "Neurological deficit", "criteria": "documented on exam"}
                ]
            }
        }),
    );
    let frame = render(&snap);
    let section = frame.section(SectionId::Requirements).expect("requirements");
    let SectionBody::Requirements { lines } = &section.body else {
        panic!("unexpected body {:?}", section.body);
    };
    assert_eq!(
        lines,
        &vec![
            "Coverage status: covered_with_criteria".to_string(),
            "Request validation: valid".to_string(),
            "- [documentation] 6 weeks of conservative therapy".to_string(),
            "- Neurological deficit: documented on exam".to_string(),
        ]
    );
}

#[test]
fn history_entries_expand_from_view_state() {
    let mut snap = snapshot(SessionStatus::Running, 2);
    snap.step_history = vec![authflow::automation::CompletedStep {
        step_number: 1,
        title: "Policy Research & Coverage Analysis".to_string(),
        completed_at: chrono::Utc::now(),
        data: json!({"coverage_status": "covered", "requirements": []}),
    }];
    let mut view = ViewState::default();
    let collapsed = project(&snap, None, &view, &ProjectionContext::default());
    assert!(!collapsed.history[0].expanded);

    view.toggle_history(1);
    let expanded = project(&snap, None, &view, &ProjectionContext::default());
    assert!(expanded.history[0].expanded);
    assert_eq!(expanded.history[0].summary, vec!["coverage_status: covered"]);
}

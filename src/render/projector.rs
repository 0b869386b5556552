use super::fallback::is_fallback_result;
use super::form::{question_views, QuestionView};
use super::scroll::ScrollTarget;
use crate::api::FormQuestionCatalog;
use crate::automation::session::{SessionSnapshot, SessionStatus, CLINICIAN_MESSAGE_SUBJECT};
use crate::automation::steps::{self, ContentKey};
use crate::automation::ProgressEvent;
use crate::config::{FallbackMarkers, Settings};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Inputs the projector needs beyond the session itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionContext {
    pub markers: FallbackMarkers,
    pub catalog: Option<FormQuestionCatalog>,
    pub scroll_delay: Option<Duration>,
}

impl ProjectionContext {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            markers: settings.fallback_markers.clone(),
            catalog: None,
            scroll_delay: Some(settings.display.scroll_delay()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionId {
    SearchResults,
    Requirements,
    FormAnswers,
}

impl SectionId {
    pub const ALL: [SectionId; 3] = [
        SectionId::SearchResults,
        SectionId::Requirements,
        SectionId::FormAnswers,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SectionId::SearchResults => "Search Results",
            SectionId::Requirements => "Coverage Requirements",
            SectionId::FormAnswers => "Form Answers",
        }
    }

    /// Workflow step whose output the section shows.
    pub fn step(self) -> u32 {
        let key = match self {
            SectionId::SearchResults | SectionId::Requirements => ContentKey::Coverage,
            SectionId::FormAnswers => ContentKey::Form,
        };
        steps::step_for_content(key).map(|step| step.id).unwrap_or(0)
    }
}

/// Caller-owned toggle state. The projector only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub section_overrides: BTreeMap<SectionId, bool>,
    pub expanded_history: BTreeSet<u32>,
}

impl ViewState {
    pub fn set_section(&mut self, section: SectionId, expanded: bool) {
        self.section_overrides.insert(section, expanded);
    }

    /// Flips a section relative to how it is currently drawn.
    pub fn toggle_section(&mut self, section: SectionId, currently_expanded: bool) {
        self.section_overrides.insert(section, !currently_expanded);
    }

    pub fn toggle_history(&mut self, step_number: u32) {
        if !self.expanded_history.remove(&step_number) {
            self.expanded_history.insert(step_number);
        }
    }

    pub fn clear_overrides(&mut self) {
        self.section_overrides.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderView {
    pub case_id: String,
    pub step_label: String,
    pub description: String,
    pub icon: String,
    pub status: SessionStatus,
    pub status_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub percent: u32,
    pub label: String,
    pub step_percent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub title: String,
    pub url: String,
    pub source: String,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchBatchView {
    pub query: String,
    pub items: Vec<ResultView>,
    pub hidden_fallbacks: usize,
}

impl SearchBatchView {
    pub fn waiting_for_real_results(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    SearchResults {
        batches: Vec<SearchBatchView>,
        errors: Vec<String>,
    },
    Requirements {
        lines: Vec<String>,
    },
    FormAnswers {
        questions: Vec<QuestionView>,
        extractions: Vec<String>,
        fields: Vec<String>,
        completed: u64,
        total: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionView {
    pub id: SectionId,
    pub title: String,
    pub expanded: bool,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntryView {
    pub step_number: u32,
    pub title: String,
    pub completed_at: String,
    pub expanded: bool,
    pub summary: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePanel {
    pub subject: String,
    pub message: String,
    pub missing_documents: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPanel {
    pub message: String,
    pub retry_hint: String,
}

/// Everything the dashboard draws for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFrame {
    pub header: HeaderView,
    pub progress: ProgressView,
    pub activity: Option<String>,
    pub sections: Vec<SectionView>,
    pub history: Vec<HistoryEntryView>,
    pub gate: Option<GatePanel>,
    pub error: Option<ErrorPanel>,
    pub scroll_target: Option<ScrollTarget>,
    pub scroll_delay: Option<Duration>,
}

impl RenderFrame {
    pub fn section(&self, id: SectionId) -> Option<&SectionView> {
        self.sections.iter().find(|section| section.id == id)
    }
}

pub fn project(
    snapshot: &SessionSnapshot,
    latest: Option<&ProgressEvent>,
    view: &ViewState,
    ctx: &ProjectionContext,
) -> RenderFrame {
    let (scroll_target, event_delay) = scroll_target(snapshot, latest);
    RenderFrame {
        header: header(snapshot),
        progress: progress(snapshot),
        activity: snapshot.activity.message.clone(),
        sections: SectionId::ALL
            .iter()
            .map(|id| section(snapshot, *id, view, ctx))
            .collect(),
        history: history(snapshot, view),
        gate: snapshot.gate.as_ref().map(|gate| GatePanel {
            subject: CLINICIAN_MESSAGE_SUBJECT.to_string(),
            message: gate.clinician_message.clone(),
            missing_documents: gate.missing_documents.clone(),
            notes: gate.validation_notes.clone(),
        }),
        error: match (snapshot.status, &snapshot.error) {
            (SessionStatus::Error, Some(message)) => Some(ErrorPanel {
                message: message.clone(),
                retry_hint: format!(
                    "press r to retry step {}",
                    snapshot.current_step.min(snapshot.total_steps)
                ),
            }),
            _ => None,
        },
        scroll_delay: scroll_target
            .as_ref()
            .and_then(|_| event_delay.or(ctx.scroll_delay)),
        scroll_target,
    }
}

fn header(snapshot: &SessionSnapshot) -> HeaderView {
    let (step_label, description, icon) = match snapshot.current_step_def() {
        Some(step) => (
            format!("Step {}: {}", step.id, step.title),
            step.description.to_string(),
            step.icon.to_string(),
        ),
        None => (
            "Workflow complete".to_string(),
            "All automation steps have finished".to_string(),
            "fas fa-check-circle".to_string(),
        ),
    };
    let status_label = match snapshot.status {
        SessionStatus::Idle => "Not started",
        SessionStatus::Running => "In Progress",
        SessionStatus::AwaitingTransition if snapshot.gate.is_some() => "Needs clinician input",
        SessionStatus::AwaitingTransition => "Step complete",
        SessionStatus::Complete => "Completed",
        SessionStatus::Error => "Error",
        SessionStatus::Cancelled => "Cancelled",
    };
    HeaderView {
        case_id: snapshot.case_id.to_string(),
        step_label,
        description,
        icon,
        status: snapshot.status,
        status_label: status_label.to_string(),
    }
}

fn progress(snapshot: &SessionSnapshot) -> ProgressView {
    let total = snapshot.total_steps;
    let percent = if snapshot.status == SessionStatus::Complete {
        100
    } else {
        steps::progress_percent(snapshot.current_step.min(total), total)
    };
    let step_percent = snapshot
        .activity
        .step_progress
        .get(&snapshot.current_step)
        .map(|p| p.round().clamp(0.0, 100.0) as u32);
    ProgressView {
        percent,
        label: format!("{percent}% Complete"),
        step_percent,
    }
}

fn section(
    snapshot: &SessionSnapshot,
    id: SectionId,
    view: &ViewState,
    ctx: &ProjectionContext,
) -> SectionView {
    let default_expanded = id.step() == snapshot.current_step;
    let expanded = view
        .section_overrides
        .get(&id)
        .copied()
        .unwrap_or(default_expanded);
    let body = match id {
        SectionId::SearchResults => search_body(snapshot, &ctx.markers),
        SectionId::Requirements => SectionBody::Requirements {
            lines: requirement_lines(snapshot.step_results.get(&ContentKey::Coverage)),
        },
        SectionId::FormAnswers => form_body(snapshot, ctx.catalog.as_ref()),
    };
    SectionView {
        id,
        title: id.title().to_string(),
        expanded,
        body,
    }
}

fn search_body(snapshot: &SessionSnapshot, markers: &FallbackMarkers) -> SectionBody {
    let batches = snapshot
        .activity
        .search_batches
        .iter()
        .map(|batch| {
            let mut hidden_fallbacks = 0;
            let items = batch
                .results
                .iter()
                .filter(|item| {
                    let fallback = is_fallback_result(item, markers);
                    if fallback {
                        hidden_fallbacks += 1;
                    }
                    !fallback
                })
                .map(|item| ResultView {
                    title: item.title.clone().unwrap_or_default(),
                    url: item.url.clone().unwrap_or_default(),
                    source: item.source.clone().unwrap_or_default(),
                    snippet: item.snippet.clone(),
                })
                .collect();
            SearchBatchView {
                query: batch.query.clone(),
                items,
                hidden_fallbacks,
            }
        })
        .collect();
    let errors = snapshot
        .activity
        .search_errors
        .iter()
        .map(|failure| format!("{}: {}", failure.query, failure.error))
        .collect();
    SectionBody::SearchResults { batches, errors }
}

fn form_body(snapshot: &SessionSnapshot, catalog: Option<&FormQuestionCatalog>) -> SectionBody {
    let activity = &snapshot.activity;
    SectionBody::FormAnswers {
        questions: question_views(snapshot, catalog),
        extractions: activity
            .ehr_extractions
            .iter()
            .map(|field| {
                let mut line = format!("{}: {}", field.field, value_text(&field.value));
                if let Some(source) = &field.source {
                    line.push_str(&format!(" (source: {source})"));
                }
                line
            })
            .collect(),
        fields: activity
            .form_fields
            .iter()
            .map(|field| format!("{}: {}", field.field, value_text(&field.value)))
            .collect(),
        completed: activity.completed_questions,
        total: activity.total_questions,
    }
}

fn requirement_lines(result: Option<&Value>) -> Vec<String> {
    let Some(result) = result.filter(|value| !value.is_null()) else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    if let Some(status) = result.get("coverage_status").and_then(Value::as_str) {
        lines.push(format!("Coverage status: {status}"));
    }
    let parsing = result.get("parsing_agent_result");
    if let Some(validation) = parsing.and_then(|p| p.get("request_validation")) {
        let valid = validation
            .get("is_valid")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        lines.push(if valid {
            "Request validation: valid".to_string()
        } else {
            "Request validation: missing documentation".to_string()
        });
    }
    if let Some(requirements) = result.get("requirements").and_then(Value::as_array) {
        for requirement in requirements {
            let kind = requirement
                .get("requirement_type")
                .and_then(Value::as_str)
                .unwrap_or("requirement");
            let description = requirement
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("");
            lines.push(format!("- [{kind}] {description}"));
        }
    }
    if let Some(critical) = parsing
        .and_then(|p| p.get("critical_requirements"))
        .and_then(Value::as_array)
    {
        for requirement in critical {
            let name = requirement
                .get("requirement")
                .and_then(Value::as_str)
                .unwrap_or("requirement");
            match requirement.get("criteria").and_then(Value::as_str) {
                Some(criteria) => lines.push(format!("- {name}: {criteria}")),
                None => lines.push(format!("- {name}")),
            }
        }
    }
    lines
}

fn history(snapshot: &SessionSnapshot, view: &ViewState) -> Vec<HistoryEntryView> {
    snapshot
        .step_history
        .iter()
        .map(|entry| HistoryEntryView {
            step_number: entry.step_number,
            title: entry.title.clone(),
            completed_at: entry.completed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            expanded: view.expanded_history.contains(&entry.step_number),
            summary: history_summary(&entry.data),
        })
        .collect()
}

fn history_summary(data: &Value) -> Vec<String> {
    match data {
        Value::Object(map) => map
            .iter()
            .filter(|(_, value)| !matches!(value, Value::Object(_) | Value::Array(_)))
            .map(|(key, value)| format!("{key}: {}", value_text(value)))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![value_text(other)],
    }
}

fn scroll_target(
    snapshot: &SessionSnapshot,
    latest: Option<&ProgressEvent>,
) -> (Option<ScrollTarget>, Option<Duration>) {
    if snapshot.status == SessionStatus::Error {
        return (Some(ScrollTarget::Error), None);
    }
    if snapshot.gate.is_some() {
        return (Some(ScrollTarget::Gate), None);
    }
    match latest {
        Some(ProgressEvent::QuestionStart { question_id, .. }) => (
            Some(ScrollTarget::Question(question_id.to_string())),
            Some(Duration::from_millis(200)),
        ),
        Some(ProgressEvent::QuestionResult { question_id, .. }) => {
            let target = question_id
                .follow_up_parent()
                .unwrap_or_else(|| question_id.clone());
            (
                Some(ScrollTarget::Question(target.to_string())),
                Some(Duration::from_millis(300)),
            )
        }
        Some(ProgressEvent::SectionStart {
            section: Some(section),
            ..
        }) => (
            Some(ScrollTarget::Section(section.clone())),
            Some(Duration::from_millis(100)),
        ),
        Some(ProgressEvent::SearchResult { .. }) | Some(ProgressEvent::SearchError { .. }) => {
            let last = snapshot.activity.search_batches.len().saturating_sub(1);
            (Some(ScrollTarget::SearchBatch(last)), None)
        }
        _ => (None, None),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

use super::error::AutomationError;
use super::events::{ProgressEvent, SearchResultItem};
use super::operation::{
    CancelToken, OperationHandle, OperationKind, OperationMessage, OperationPlan, OperationTicket,
    OperationUpdate,
};
use super::steps::{self, ContentKey, WorkflowStep};
use crate::api::{
    ApiError, AutomationBackend, AutomationStatus, FollowUpSpec, FormQuestionCatalog,
};
use crate::shared::ids::{CaseId, QuestionId};
use crate::shared::logging::LogSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const CLINICIAN_MESSAGE_SUBJECT: &str = "Prior Authorization - Missing Information";
const DEFAULT_CLINICIAN_MESSAGE: &str =
    "Additional documentation required. Please contact the prior authorization team.";
const STREAM_CLOSED_EARLY: &str = "stream closed before step completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    AwaitingTransition,
    Complete,
    Error,
    Cancelled,
}

impl SessionStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Idle, SessionStatus::Running)
                | (SessionStatus::Idle, SessionStatus::Error)
                | (SessionStatus::Idle, SessionStatus::Cancelled)
                | (SessionStatus::Running, SessionStatus::Running)
                | (SessionStatus::Running, SessionStatus::AwaitingTransition)
                | (SessionStatus::Running, SessionStatus::Complete)
                | (SessionStatus::Running, SessionStatus::Error)
                | (SessionStatus::Running, SessionStatus::Cancelled)
                | (SessionStatus::AwaitingTransition, SessionStatus::Running)
                | (SessionStatus::AwaitingTransition, SessionStatus::Complete)
                | (SessionStatus::AwaitingTransition, SessionStatus::Error)
                | (SessionStatus::AwaitingTransition, SessionStatus::Cancelled)
                | (SessionStatus::Error, SessionStatus::Running)
                | (SessionStatus::Error, SessionStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Cancelled)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::AwaitingTransition => write!(f, "awaiting_transition"),
            SessionStatus::Complete => write!(f, "complete"),
            SessionStatus::Error => write!(f, "error"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Fresh,
    /// Reattach to a run the backend already has in flight.
    Resume { step: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedStep {
    pub step_number: u32,
    pub title: String,
    pub completed_at: DateTime<Utc>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HumanGate {
    pub clinician_message: String,
    pub missing_documents: Vec<String>,
    pub validation_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateResolution {
    /// Replaces the drafted clinician message when the reviewer edited it.
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchBatch {
    pub query: String,
    pub results: Vec<SearchResultItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFailure {
    pub query: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionState {
    pub id: QuestionId,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub status: String,
    pub source: Option<String>,
    pub follow_up: Option<FollowUpSpec>,
    pub user_edited: bool,
}

impl QuestionState {
    fn new(id: QuestionId) -> Self {
        Self {
            id,
            question: None,
            answer: None,
            status: "processing".to_string(),
            source: None,
            follow_up: None,
            user_edited: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedField {
    pub field: String,
    pub value: Value,
    pub source: Option<String>,
    pub citation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldValue {
    pub field: String,
    pub value: Value,
    pub justification: Option<String>,
    pub sources: Vec<String>,
}

/// Progress detail surfaced to the dashboard while steps run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepActivity {
    pub message: Option<String>,
    pub step_progress: BTreeMap<u32, f64>,
    pub search_batches: Vec<SearchBatch>,
    pub search_errors: Vec<SearchFailure>,
    pub current_section: Option<String>,
    pub completed_sections: Vec<String>,
    pub questions: Vec<QuestionState>,
    pub ehr_extractions: Vec<ExtractedField>,
    pub form_fields: Vec<FormFieldValue>,
    pub completed_questions: u64,
    pub total_questions: Option<u64>,
}

impl StepActivity {
    pub fn question(&self, id: &QuestionId) -> Option<&QuestionState> {
        self.questions.iter().find(|question| &question.id == id)
    }

    fn question_mut(&mut self, id: &QuestionId) -> &mut QuestionState {
        let index = match self.questions.iter().position(|q| &q.id == id) {
            Some(index) => index,
            None => {
                self.questions.push(QuestionState::new(id.clone()));
                self.questions.len() - 1
            }
        };
        &mut self.questions[index]
    }

    fn clear_from(&mut self, step: u32) {
        self.message = None;
        self.step_progress.retain(|number, _| *number < step);
        if step <= 1 {
            self.search_batches.clear();
            self.search_errors.clear();
        }
        if step <= 2 {
            self.current_section = None;
            self.completed_sections.clear();
            self.questions.clear();
            self.ehr_extractions.clear();
            self.form_fields.clear();
            self.completed_questions = 0;
            self.total_questions = None;
        }
    }
}

/// Read-only copy of session state handed to the projector.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub case_id: CaseId,
    pub status: SessionStatus,
    pub current_step: u32,
    pub total_steps: u32,
    pub step_results: BTreeMap<ContentKey, Value>,
    pub step_history: Vec<CompletedStep>,
    pub activity: StepActivity,
    pub gate: Option<HumanGate>,
    pub error: Option<String>,
    pub active: Option<OperationKind>,
    pub last_event: Option<ProgressEvent>,
    pub follow_up_triggers: BTreeMap<QuestionId, String>,
}

impl SessionSnapshot {
    pub fn current_step_def(&self) -> Option<&'static WorkflowStep> {
        steps::step_at(self.current_step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// From an operation that is no longer current; nothing changed.
    Stale,
    Applied,
    StepCompleted { step: u32 },
    Failed,
    WorkflowComplete,
}

pub struct AutomationSession {
    case_id: CaseId,
    backend: Arc<dyn AutomationBackend>,
    log: LogSink,
    poll_interval: Duration,
    status: SessionStatus,
    current_step: u32,
    step_results: BTreeMap<ContentKey, Value>,
    step_history: Vec<CompletedStep>,
    activity: StepActivity,
    gate: Option<HumanGate>,
    error: Option<String>,
    active: Option<OperationHandle>,
    generation: u64,
    last_event: Option<ProgressEvent>,
    follow_up_triggers: BTreeMap<QuestionId, String>,
    notifications: Vec<JoinHandle<()>>,
}

impl AutomationSession {
    pub fn new(case_id: CaseId, backend: Arc<dyn AutomationBackend>) -> Self {
        Self {
            case_id,
            backend,
            log: LogSink::disabled(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            status: SessionStatus::Idle,
            current_step: 1,
            step_results: BTreeMap::new(),
            step_history: Vec::new(),
            activity: StepActivity::default(),
            gate: None,
            error: None,
            active: None,
            generation: 0,
            last_event: None,
            follow_up_triggers: BTreeMap::new(),
            notifications: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: LogSink) -> Self {
        self.log = log;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Loads follow-up trigger answers so primary answers can reveal or
    /// clear their follow-up.
    pub fn set_question_catalog(&mut self, catalog: &FormQuestionCatalog) {
        for question in catalog.questions() {
            if let Some(condition) = catalog.follow_up_trigger(&question.id) {
                self.follow_up_triggers
                    .insert(question.id.clone(), condition.to_string());
            }
        }
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn step_history(&self) -> &[CompletedStep] {
        &self.step_history
    }

    pub fn step_result(&self, key: ContentKey) -> Option<&Value> {
        self.step_results.get(&key)
    }

    pub fn activity(&self) -> &StepActivity {
        &self.activity
    }

    pub fn gate(&self) -> Option<&HumanGate> {
        self.gate.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn active_operation(&self) -> Option<&OperationHandle> {
        self.active.as_ref()
    }

    pub fn backend(&self) -> Arc<dyn AutomationBackend> {
        Arc::clone(&self.backend)
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            case_id: self.case_id.clone(),
            status: self.status,
            current_step: self.current_step,
            total_steps: steps::total_steps(),
            step_results: self.step_results.clone(),
            step_history: self.step_history.clone(),
            activity: self.activity.clone(),
            gate: self.gate.clone(),
            error: self.error.clone(),
            active: self.active.as_ref().map(|handle| handle.kind),
            last_event: self.last_event.clone(),
            follow_up_triggers: self.follow_up_triggers.clone(),
        }
    }

    pub fn start(&mut self, mode: StartMode) -> Result<OperationPlan, AutomationError> {
        if self.status != SessionStatus::Idle {
            return Err(AutomationError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Running,
            });
        }
        match mode {
            StartMode::Fresh => {
                if let Err(err) = self.backend.start_automation(&self.case_id) {
                    self.status = SessionStatus::Error;
                    self.error = Some(err.to_string());
                    self.log_error("session.start_failed", &err.to_string());
                    return Err(err.into());
                }
                self.current_step = 1;
                self.status = SessionStatus::Running;
                self.log_info("session.started", "automation started at step 1");
                self.plan_stream()
            }
            StartMode::Resume { step } => {
                let total = steps::total_steps();
                if step == 0 || step > total {
                    return Err(AutomationError::StepOutOfRange { step, max: total });
                }
                self.current_step = step;
                self.status = SessionStatus::Running;
                self.log_info(
                    "session.resumed",
                    &format!("resuming at step {step}; polling backend status"),
                );
                Ok(self.plan_poll())
            }
        }
    }

    /// Folds a worker update into the session. Updates from anything other
    /// than the current operation are discarded untouched.
    pub fn handle_update(&mut self, update: OperationUpdate) -> UpdateOutcome {
        let current = match &self.active {
            Some(handle) => handle,
            None => return UpdateOutcome::Stale,
        };
        if update.case_id != self.case_id
            || update.generation != current.generation
            || current.cancel.is_cancelled()
        {
            return UpdateOutcome::Stale;
        }
        let kind = current.kind;

        match update.message {
            OperationMessage::Event(event) => self.apply_event(event),
            OperationMessage::Status(status) => self.apply_status(status),
            OperationMessage::Failed(message) => {
                self.fail(message);
                UpdateOutcome::Failed
            }
            OperationMessage::Ended => match kind {
                OperationKind::Stream => {
                    self.fail(STREAM_CLOSED_EARLY.to_string());
                    UpdateOutcome::Failed
                }
                OperationKind::Poll => {
                    self.active = None;
                    self.log_info("session.poll_ended", "status polling stopped");
                    UpdateOutcome::Applied
                }
            },
        }
    }

    fn apply_event(&mut self, event: ProgressEvent) -> UpdateOutcome {
        if let Some(progress) = event.progress() {
            self.activity
                .step_progress
                .insert(self.current_step, progress.clamp(0.0, 100.0));
        }
        let summary = event
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| event.describe());
        if !summary.is_empty() {
            self.activity.message = Some(summary);
        }
        self.last_event = Some(event.clone());

        match event {
            ProgressEvent::SearchResult { query, results, .. } => {
                self.activity.search_batches.push(SearchBatch {
                    query: query.unwrap_or_default(),
                    results,
                });
            }
            ProgressEvent::SearchError { query, error, .. } => {
                self.activity.search_errors.push(SearchFailure {
                    query: query.unwrap_or_default(),
                    error: error.unwrap_or_else(|| "unknown error".to_string()),
                });
            }
            ProgressEvent::SectionStart { section, .. } => {
                self.activity.current_section = section;
            }
            ProgressEvent::SectionComplete { section, .. } => {
                if let Some(section) = section {
                    if self.activity.current_section.as_deref() == Some(section.as_str()) {
                        self.activity.current_section = None;
                    }
                    self.activity.completed_sections.push(section);
                }
            }
            ProgressEvent::QuestionStart { question_id, .. } => {
                let question = self.activity.question_mut(&question_id);
                question.status = "processing".to_string();
            }
            ProgressEvent::QuestionResult {
                question_id,
                question,
                answer,
                status,
                source,
                follow_up,
                ..
            } => {
                let status = status.unwrap_or_else(|| "completed".to_string());
                if status == "completed" {
                    self.activity.completed_questions += 1;
                }
                if let Some(condition) = follow_up.as_ref().and_then(|f| f.condition.clone()) {
                    self.follow_up_triggers
                        .entry(question_id.clone())
                        .or_insert(condition);
                }
                let state = self.activity.question_mut(&question_id);
                if question.is_some() {
                    state.question = question;
                }
                state.answer = answer;
                state.status = status;
                state.source = source;
                if follow_up.is_some() {
                    state.follow_up = follow_up;
                }
                self.sync_follow_up(&question_id);
            }
            ProgressEvent::EhrExtraction {
                field,
                value,
                source,
                citation,
                ..
            } => self.activity.ehr_extractions.push(ExtractedField {
                field: field.unwrap_or_default(),
                value,
                source,
                citation,
            }),
            ProgressEvent::FormField {
                field,
                value,
                justification,
                sources,
                ..
            } => self.activity.form_fields.push(FormFieldValue {
                field: field.unwrap_or_default(),
                value,
                justification,
                sources,
            }),
            ProgressEvent::Complete {
                result,
                total_questions,
                ..
            } => {
                if total_questions.is_some() {
                    self.activity.total_questions = total_questions;
                }
                return self.complete_current_step(result);
            }
            ProgressEvent::CoverageCompleteReadyForForm { result, .. } => {
                let on_coverage = steps::step_at(self.current_step)
                    .is_some_and(|step| step.content_key == ContentKey::Coverage);
                if !on_coverage {
                    self.log_warn(
                        "session.unexpected_ready_for_form",
                        &format!(
                            "ready-for-form signal ignored on step {}",
                            self.current_step
                        ),
                    );
                    return UpdateOutcome::Applied;
                }
                return self.complete_current_step(result);
            }
            ProgressEvent::Error { error, message, .. } => {
                let text = error
                    .or(message)
                    .unwrap_or_else(|| "backend reported an error".to_string());
                self.fail(text);
                return UpdateOutcome::Failed;
            }
            ProgressEvent::Status { .. }
            | ProgressEvent::SearchStart { .. }
            | ProgressEvent::Unknown => {}
        }
        UpdateOutcome::Applied
    }

    /// Reconciles a polled status snapshot. The server's step is
    /// authoritative when ahead of ours; it never moves us backwards.
    pub fn apply_status(&mut self, status: AutomationStatus) -> UpdateOutcome {
        let message = status
            .current_activity()
            .map(str::to_string)
            .or_else(|| status.message.clone());
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            self.activity.message = Some(message);
        }

        if let Some(error) = status.error.clone() {
            self.fail(error);
            return UpdateOutcome::Failed;
        }

        let total = steps::total_steps();
        if let Some(server_step) = status.current_step {
            if server_step > self.current_step {
                self.fast_forward(server_step.min(total + 1), &status);
            }
        }
        if let Some(progress) = status.progress {
            self.activity
                .step_progress
                .insert(self.current_step, progress.clamp(0.0, 100.0));
        }

        if self.current_step > total {
            return self.finish_workflow();
        }

        let on_coverage = steps::step_at(self.current_step)
            .is_some_and(|step| step.content_key == ContentKey::Coverage);
        if on_coverage && status.ready_for_form() {
            let result = status
                .results
                .get(ContentKey::Coverage.as_str())
                .cloned()
                .unwrap_or(Value::Null);
            return self.complete_current_step(result);
        }

        if !status.is_running() {
            return self.finish_workflow();
        }
        UpdateOutcome::Applied
    }

    pub fn should_auto_advance(&self) -> bool {
        self.status == SessionStatus::AwaitingTransition && self.gate.is_none()
    }

    /// Opens the next step, or finishes the workflow after the last one.
    pub fn advance(&mut self) -> Result<Option<OperationPlan>, AutomationError> {
        if self.status != SessionStatus::AwaitingTransition {
            return Err(AutomationError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Running,
            });
        }
        if self.gate.is_some() {
            return Err(AutomationError::HumanGatePending {
                case_id: self.case_id.to_string(),
            });
        }
        let next = self.current_step + 1;
        if steps::step_at(next).is_none() {
            self.current_step = steps::total_steps() + 1;
            self.status = SessionStatus::Complete;
            self.log_info("session.complete", "all workflow steps completed");
            return Ok(None);
        }
        self.current_step = next;
        self.status = SessionStatus::Running;
        self.log_info(
            "session.advanced",
            &format!("advanced to step {next} ({})", steps::display_name(next)),
        );
        self.plan_stream().map(Some)
    }

    /// Records the clinician message, clears the gate and moves on.
    pub fn resolve_gate(
        &mut self,
        resolution: GateResolution,
    ) -> Result<Option<OperationPlan>, AutomationError> {
        let Some(gate) = self.gate.take() else {
            return self.advance();
        };
        if self.status != SessionStatus::AwaitingTransition {
            self.gate = Some(gate);
            return Err(AutomationError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Running,
            });
        }
        let message = resolution
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(gate.clinician_message);
        self.log_info(
            "session.clinician_message_sent",
            &format!("{CLINICIAN_MESSAGE_SUBJECT}: {message}"),
        );
        self.advance()
    }

    /// Cancels locally right away. The backend is told on a background
    /// thread; a refusal is logged and does not undo the cancellation.
    pub fn cancel(&mut self) -> Result<(), AutomationError> {
        self.ensure_transition(SessionStatus::Cancelled)?;
        self.release_active();
        self.generation += 1;
        self.status = SessionStatus::Cancelled;
        self.notify_backend("session.cancel_not_acknowledged", |backend, case_id| {
            backend.cancel_automation(case_id)
        });
        self.log_info("session.cancelled", "automation cancelled by user");
        Ok(())
    }

    /// Blocks until every backend notification sent so far has finished.
    pub fn wait_for_notifications(&mut self) {
        for handle in self.notifications.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn retry(&mut self) -> Result<OperationPlan, AutomationError> {
        if self.status != SessionStatus::Error {
            return Err(AutomationError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Running,
            });
        }
        self.error = None;
        self.status = SessionStatus::Running;
        self.log_info(
            "session.retry",
            &format!("retrying step {}", self.current_step),
        );
        self.plan_stream()
    }

    /// Discards work from step `n` onwards and runs it again.
    pub fn reprocess_from(
        &mut self,
        n: u32,
        confirmed: bool,
    ) -> Result<OperationPlan, AutomationError> {
        if !confirmed {
            return Err(AutomationError::ConfirmationRequired { step: n });
        }
        if !matches!(
            self.status,
            SessionStatus::Running | SessionStatus::AwaitingTransition | SessionStatus::Error
        ) {
            return Err(AutomationError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Running,
            });
        }
        let max = self.current_step.min(steps::total_steps());
        if n == 0 || n > max {
            return Err(AutomationError::StepOutOfRange { step: n, max });
        }

        self.release_active();
        self.step_history.retain(|entry| entry.step_number < n);
        self.step_results.retain(|key, _| {
            steps::step_for_content(*key).is_some_and(|step| step.id < n)
        });
        self.activity.clear_from(n);
        self.gate = None;
        self.error = None;
        self.last_event = None;
        self.current_step = n;
        self.status = SessionStatus::Running;
        self.log_info(
            "session.reprocess",
            &format!("reprocessing from step {n} ({})", steps::display_name(n)),
        );
        self.plan_stream()
    }

    /// Applies a reviewer's override of an agent-populated answer.
    pub fn edit_answer(
        &mut self,
        question_id: &QuestionId,
        answer: impl Into<String>,
    ) -> Result<(), AutomationError> {
        let answer = answer.into();
        let Some(state) = self
            .activity
            .questions
            .iter_mut()
            .find(|question| &question.id == question_id)
        else {
            return Err(AutomationError::UnknownQuestion {
                question_id: question_id.to_string(),
            });
        };
        state.answer = Some(answer);
        state.user_edited = true;
        self.sync_follow_up(question_id);
        Ok(())
    }

    pub fn follow_up_trigger(&self, question_id: &QuestionId) -> Option<&str> {
        self.follow_up_triggers.get(question_id).map(String::as_str)
    }

    // A primary answer that no longer matches its trigger hides the
    // follow-up, which also drops whatever was answered there.
    fn sync_follow_up(&mut self, question_id: &QuestionId) {
        if question_id.is_follow_up() {
            return;
        }
        let Some(trigger) = self.follow_up_triggers.get(question_id).cloned() else {
            return;
        };
        let matches = self
            .activity
            .question(question_id)
            .and_then(|q| q.answer.as_deref())
            == Some(trigger.as_str());
        if matches {
            return;
        }
        let follow_up_id = question_id.follow_up_id();
        if let Some(follow_up) = self
            .activity
            .questions
            .iter_mut()
            .find(|question| question.id == follow_up_id)
        {
            follow_up.answer = None;
        }
    }

    fn complete_current_step(&mut self, result: Value) -> UpdateOutcome {
        let Some(step) = steps::step_at(self.current_step) else {
            return self.finish_workflow();
        };
        self.step_results.insert(step.content_key, result.clone());
        if !self
            .step_history
            .iter()
            .any(|entry| entry.step_number == step.id)
        {
            self.step_history.push(CompletedStep {
                step_number: step.id,
                title: step.title.to_string(),
                completed_at: Utc::now(),
                data: result.clone(),
            });
        }
        self.activity.step_progress.insert(step.id, 100.0);
        self.release_active();
        self.status = SessionStatus::AwaitingTransition;

        let completed = self.current_step;
        self.notify_backend("session.persist_step_failed", move |backend, case_id| {
            backend.persist_step(case_id, completed)
        });

        if step.content_key == ContentKey::Coverage {
            self.gate = evaluate_gate(&result);
        }
        match &self.gate {
            Some(gate) => self.log_info(
                "session.human_gate",
                &format!(
                    "step {} needs clinician input; missing: {}",
                    step.id,
                    gate.missing_documents.join(", ")
                ),
            ),
            None => self.log_info(
                "session.step_completed",
                &format!("step {} ({}) completed", step.id, step.display_name),
            ),
        }
        UpdateOutcome::StepCompleted { step: step.id }
    }

    fn fast_forward(&mut self, target: u32, status: &AutomationStatus) {
        for number in self.current_step..target {
            let Some(step) = steps::step_at(number) else {
                break;
            };
            let data = status
                .results
                .get(step.content_key.as_str())
                .cloned()
                .unwrap_or(Value::Null);
            if !data.is_null() {
                self.step_results.insert(step.content_key, data.clone());
            }
            if !self.step_history.iter().any(|e| e.step_number == number) {
                self.step_history.push(CompletedStep {
                    step_number: number,
                    title: step.title.to_string(),
                    completed_at: Utc::now(),
                    data,
                });
            }
        }
        self.log_info(
            "session.fast_forward",
            &format!(
                "backend is at step {target}; moving forward from {}",
                self.current_step
            ),
        );
        self.current_step = target;
    }

    fn finish_workflow(&mut self) -> UpdateOutcome {
        let total = steps::total_steps();
        for number in self.current_step.min(total + 1)..=total {
            if let Some(step) = steps::step_at(number) {
                if !self.step_history.iter().any(|e| e.step_number == number) {
                    self.step_history.push(CompletedStep {
                        step_number: number,
                        title: step.title.to_string(),
                        completed_at: Utc::now(),
                        data: self
                            .step_results
                            .get(&step.content_key)
                            .cloned()
                            .unwrap_or(Value::Null),
                    });
                }
            }
        }
        self.release_active();
        self.gate = None;
        self.current_step = total + 1;
        self.status = SessionStatus::Complete;
        self.log_info("session.complete", "backend reports automation finished");
        UpdateOutcome::WorkflowComplete
    }

    fn fail(&mut self, message: String) {
        self.release_active();
        if self.status.can_transition_to(SessionStatus::Error) {
            self.status = SessionStatus::Error;
        }
        self.log_error("session.failed", &message);
        self.error = Some(message);
    }

    fn plan_stream(&mut self) -> Result<OperationPlan, AutomationError> {
        let total = steps::total_steps();
        let step = steps::step_at(self.current_step).ok_or(AutomationError::StepOutOfRange {
            step: self.current_step,
            max: total,
        })?;
        let ticket = self.open_operation(OperationKind::Stream);
        Ok(OperationPlan::Stream {
            step: step.id,
            endpoint: step.endpoint,
            ticket,
        })
    }

    fn plan_poll(&mut self) -> OperationPlan {
        let ticket = self.open_operation(OperationKind::Poll);
        OperationPlan::Poll {
            interval: self.poll_interval,
            ticket,
        }
    }

    fn open_operation(&mut self, kind: OperationKind) -> OperationTicket {
        self.release_active();
        self.generation += 1;
        let cancel = CancelToken::new();
        self.active = Some(OperationHandle {
            kind,
            generation: self.generation,
            cancel: cancel.clone(),
        });
        OperationTicket {
            case_id: self.case_id.clone(),
            generation: self.generation,
            cancel,
        }
    }

    fn release_active(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel.cancel();
        }
    }

    fn ensure_transition(&self, next: SessionStatus) -> Result<(), AutomationError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(AutomationError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Sends a best-effort call on its own thread. Failures are only logged
    /// under `failure_event`.
    fn notify_backend<F>(&mut self, failure_event: &'static str, call: F)
    where
        F: FnOnce(&dyn AutomationBackend, &CaseId) -> Result<(), ApiError> + Send + 'static,
    {
        self.notifications.retain(|handle| !handle.is_finished());
        let backend = Arc::clone(&self.backend);
        let case_id = self.case_id.clone();
        let log = self.log.clone();
        let spawned = thread::Builder::new()
            .name("authflow-notify".to_string())
            .spawn(move || {
                if let Err(err) = call(backend.as_ref(), &case_id) {
                    log.warn(failure_event, Some(case_id.as_str()), &err.to_string());
                }
            });
        match spawned {
            Ok(handle) => self.notifications.push(handle),
            Err(err) => self.log_warn(failure_event, &format!("could not spawn: {err}")),
        }
    }

    fn log_info(&self, event: &str, message: &str) {
        self.log.info(event, Some(self.case_id.as_str()), message);
    }

    fn log_warn(&self, event: &str, message: &str) {
        self.log.warn(event, Some(self.case_id.as_str()), message);
    }

    fn log_error(&self, event: &str, message: &str) {
        self.log.error(event, Some(self.case_id.as_str()), message);
    }
}

/// Looks for a request validation verdict in a coverage result. Anything
/// other than an explicit `is_valid: false` lets the workflow continue.
pub fn evaluate_gate(result: &Value) -> Option<HumanGate> {
    let parsing = result
        .get("parsing_agent_result")
        .or_else(|| result.get("parsingAgentResult"))
        .unwrap_or(result);
    let validation = parsing
        .get("request_validation")
        .or_else(|| parsing.get("requestValidation"))?;
    let is_valid = validation
        .get("is_valid")
        .or_else(|| validation.get("isValid"))
        .and_then(Value::as_bool)
        .unwrap_or(true);
    if is_valid {
        return None;
    }
    let missing_documents = validation
        .get("missing_documents")
        .or_else(|| validation.get("missingDocuments"))
        .map(string_list)
        .unwrap_or_default();
    let validation_notes = validation
        .get("validation_notes")
        .or_else(|| validation.get("validationNotes"))
        .map(string_list)
        .unwrap_or_default();
    let clinician_message = parsing
        .get("clinician_message")
        .or_else(|| parsing.get("clinicianMessage"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_CLINICIAN_MESSAGE)
        .to_string();
    Some(HumanGate {
        clinician_message,
        missing_documents,
        validation_notes,
    })
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => vec![text.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

use super::error::AutomationError;
use super::operation::{OperationMessage, OperationPlan, OperationTicket, OperationUpdate};
use super::poller::Poller;
use super::registry::SessionRegistry;
use super::session::{
    AutomationSession, GateResolution, SessionStatus, StartMode, UpdateOutcome,
    DEFAULT_POLL_INTERVAL,
};
use super::stream::EventStreamReader;
use crate::api::{AutomationBackend, FormQuestionCatalog, StreamEndpoint};
use crate::config::Settings;
use crate::shared::ids::CaseId;
use crate::shared::logging::LogSink;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl DriverOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.automation.poll_interval(),
            settle_delay: settings.automation.settle_delay(),
        }
    }
}

/// Outcome of one `pump` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Updated {
        case_id: CaseId,
        outcome: UpdateOutcome,
    },
    Advanced {
        case_id: CaseId,
        step: Option<u32>,
    },
}

/// Runs session operations on worker threads and feeds their updates back
/// into the owning session on the caller's thread.
pub struct SessionDriver {
    backend: Arc<dyn AutomationBackend>,
    registry: SessionRegistry,
    updates_tx: Sender<OperationUpdate>,
    updates_rx: Receiver<OperationUpdate>,
    options: DriverOptions,
    pending_advances: Vec<(CaseId, Instant)>,
    catalog: Option<FormQuestionCatalog>,
    log: LogSink,
}

impl SessionDriver {
    pub fn new(backend: Arc<dyn AutomationBackend>, options: DriverOptions) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel();
        Self {
            backend,
            registry: SessionRegistry::new(),
            updates_tx,
            updates_rx,
            options,
            pending_advances: Vec::new(),
            catalog: None,
            log: LogSink::disabled(),
        }
    }

    pub fn with_log(mut self, log: LogSink) -> Self {
        self.log = log;
        self
    }

    pub fn with_question_catalog(mut self, catalog: FormQuestionCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn session(&self, case_id: &CaseId) -> Option<&AutomationSession> {
        self.registry.get(case_id)
    }

    pub fn session_mut(&mut self, case_id: &CaseId) -> Option<&mut AutomationSession> {
        self.registry.get_mut(case_id)
    }

    pub fn case_ids(&self) -> Vec<CaseId> {
        self.registry.case_ids().cloned().collect()
    }

    pub fn open_session(&mut self, case_id: &CaseId) -> &mut AutomationSession {
        let backend = Arc::clone(&self.backend);
        let log = self.log.clone();
        let poll_interval = self.options.poll_interval;
        let catalog = self.catalog.clone();
        self.registry.open(case_id, move |case_id| {
            let mut session = AutomationSession::new(case_id, backend)
                .with_log(log)
                .with_poll_interval(poll_interval);
            if let Some(catalog) = &catalog {
                session.set_question_catalog(catalog);
            }
            session
        })
    }

    pub fn start(&mut self, case_id: &CaseId, mode: StartMode) -> Result<(), AutomationError> {
        let plan = self.open_session(case_id).start(mode)?;
        self.launch(plan);
        Ok(())
    }

    pub fn advance(&mut self, case_id: &CaseId) -> Result<Option<u32>, AutomationError> {
        self.clear_pending(case_id);
        let plan = self.session_or_err(case_id)?.advance()?;
        Ok(self.launch_optional(plan))
    }

    pub fn resolve_gate(
        &mut self,
        case_id: &CaseId,
        resolution: GateResolution,
    ) -> Result<Option<u32>, AutomationError> {
        self.clear_pending(case_id);
        let plan = self.session_or_err(case_id)?.resolve_gate(resolution)?;
        Ok(self.launch_optional(plan))
    }

    pub fn cancel(&mut self, case_id: &CaseId) -> Result<(), AutomationError> {
        self.clear_pending(case_id);
        self.session_or_err(case_id)?.cancel()
    }

    pub fn retry(&mut self, case_id: &CaseId) -> Result<(), AutomationError> {
        self.clear_pending(case_id);
        let plan = self.session_or_err(case_id)?.retry()?;
        self.launch(plan);
        Ok(())
    }

    pub fn reprocess_from(
        &mut self,
        case_id: &CaseId,
        step: u32,
        confirmed: bool,
    ) -> Result<(), AutomationError> {
        let plan = self
            .session_or_err(case_id)?
            .reprocess_from(step, confirmed)?;
        self.clear_pending(case_id);
        self.launch(plan);
        Ok(())
    }

    /// Spawns the worker a plan describes.
    pub fn launch(&self, plan: OperationPlan) {
        let backend = Arc::clone(&self.backend);
        let updates = self.updates_tx.clone();
        let log = self.log.clone();
        self.log.info(
            "driver.launch",
            Some(plan.ticket().case_id.as_str()),
            &format!(
                "{} operation generation={}",
                plan.kind(),
                plan.ticket().generation
            ),
        );
        match plan {
            OperationPlan::Stream {
                endpoint, ticket, ..
            } => {
                thread::spawn(move || run_stream(backend, endpoint, ticket, updates, log));
            }
            OperationPlan::Poll { interval, ticket } => {
                thread::spawn(move || {
                    Poller::new(backend, ticket, interval)
                        .with_log(log)
                        .run(&updates);
                });
            }
        }
    }

    /// Fires due auto-advances, then waits up to `timeout` for one worker
    /// update and applies it.
    pub fn pump(&mut self, timeout: Duration) -> Option<DriverEvent> {
        if let Some(event) = self.fire_due_advance() {
            return Some(event);
        }
        let wait = match self.next_advance_due() {
            Some(due) => timeout.min(due.saturating_duration_since(Instant::now())),
            None => timeout,
        };
        let update = match self.updates_rx.recv_timeout(wait) {
            Ok(update) => update,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return self.fire_due_advance();
            }
        };

        let case_id = update.case_id.clone();
        let session = self.registry.get_mut(&case_id)?;
        let outcome = session.handle_update(update);
        if matches!(outcome, UpdateOutcome::StepCompleted { .. }) && session.should_auto_advance()
        {
            self.pending_advances
                .push((case_id.clone(), Instant::now() + self.options.settle_delay));
        }
        Some(DriverEvent::Updated { case_id, outcome })
    }

    /// Waits for the best-effort backend calls of every session, so a
    /// process about to exit does not drop them.
    pub fn wait_for_notifications(&mut self) {
        for case_id in self.case_ids() {
            if let Some(session) = self.registry.get_mut(&case_id) {
                session.wait_for_notifications();
            }
        }
    }

    /// Whether the case needs no further driving without user input.
    pub fn is_settled(&self, case_id: &CaseId) -> bool {
        if self.pending_advances.iter().any(|(id, _)| id == case_id) {
            return false;
        }
        let Some(session) = self.registry.get(case_id) else {
            return true;
        };
        match session.status() {
            SessionStatus::Idle
            | SessionStatus::Complete
            | SessionStatus::Cancelled
            | SessionStatus::Error => true,
            SessionStatus::AwaitingTransition => session.gate().is_some(),
            SessionStatus::Running => session.active_operation().is_none(),
        }
    }

    /// Pumps until every registered case is settled or `deadline` passes.
    /// Returns whether everything settled.
    pub fn run_until_settled(&mut self, deadline: Option<Instant>) -> bool {
        loop {
            let ids = self.case_ids();
            if ids.iter().all(|id| self.is_settled(id)) {
                return true;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return false;
            }
            self.pump(Duration::from_millis(100));
        }
    }

    fn fire_due_advance(&mut self) -> Option<DriverEvent> {
        let now = Instant::now();
        let index = self
            .pending_advances
            .iter()
            .position(|(_, due)| *due <= now)?;
        let (case_id, _) = self.pending_advances.remove(index);
        let session = self.registry.get_mut(&case_id)?;
        if !session.should_auto_advance() {
            return None;
        }
        match session.advance() {
            Ok(plan) => {
                let step = self.launch_optional(plan);
                Some(DriverEvent::Advanced { case_id, step })
            }
            Err(err) => {
                self.log
                    .warn("driver.advance_failed", Some(case_id.as_str()), &err.to_string());
                None
            }
        }
    }

    fn next_advance_due(&self) -> Option<Instant> {
        self.pending_advances.iter().map(|(_, due)| *due).min()
    }

    fn clear_pending(&mut self, case_id: &CaseId) {
        self.pending_advances.retain(|(id, _)| id != case_id);
    }

    fn launch_optional(&self, plan: Option<OperationPlan>) -> Option<u32> {
        let plan = plan?;
        let step = match &plan {
            OperationPlan::Stream { step, .. } => Some(*step),
            OperationPlan::Poll { .. } => None,
        };
        self.launch(plan);
        step
    }

    fn session_or_err(
        &mut self,
        case_id: &CaseId,
    ) -> Result<&mut AutomationSession, AutomationError> {
        self.registry
            .get_mut(case_id)
            .ok_or_else(|| AutomationError::UnknownCase {
                case_id: case_id.to_string(),
            })
    }
}

fn run_stream(
    backend: Arc<dyn AutomationBackend>,
    endpoint: StreamEndpoint,
    ticket: OperationTicket,
    updates: Sender<OperationUpdate>,
    log: LogSink,
) {
    let body = match backend.open_stream(&ticket.case_id, endpoint) {
        Ok(body) => body,
        Err(err) => {
            let _ = updates.send(ticket.update(OperationMessage::Failed(err.to_string())));
            return;
        }
    };
    let reader = EventStreamReader::new(body)
        .with_log(log, Some(ticket.case_id.as_str().to_string()))
        .with_cancel(ticket.cancel.clone());
    for item in reader {
        // Dropping the reader closes the response body.
        if ticket.cancel.is_cancelled() {
            return;
        }
        let message = match item {
            Ok(event) => OperationMessage::Event(event),
            Err(err) => {
                let _ = updates.send(ticket.update(OperationMessage::Failed(err.to_string())));
                return;
            }
        };
        if updates.send(ticket.update(message)).is_err() {
            return;
        }
    }
    if !ticket.cancel.is_cancelled() {
        let _ = updates.send(ticket.update(OperationMessage::Ended));
    }
}

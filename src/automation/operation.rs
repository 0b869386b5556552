use super::events::ProgressEvent;
use crate::api::{AutomationStatus, StreamEndpoint};
use crate::shared::ids::CaseId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Stream,
    Poll,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Stream => write!(f, "stream"),
            OperationKind::Poll => write!(f, "poll"),
        }
    }
}

/// Shared flag a worker checks between reads and polls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// The session's view of its single in-flight operation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    pub kind: OperationKind,
    pub generation: u64,
    pub cancel: CancelToken,
}

/// What a worker needs to tag its updates and observe cancellation.
#[derive(Debug, Clone)]
pub struct OperationTicket {
    pub case_id: CaseId,
    pub generation: u64,
    pub cancel: CancelToken,
}

impl OperationTicket {
    pub fn update(&self, message: OperationMessage) -> OperationUpdate {
        OperationUpdate {
            case_id: self.case_id.clone(),
            generation: self.generation,
            message,
        }
    }
}

/// An operation the session has committed to; the driver runs it.
#[derive(Debug, Clone)]
pub enum OperationPlan {
    Stream {
        step: u32,
        endpoint: StreamEndpoint,
        ticket: OperationTicket,
    },
    Poll {
        interval: Duration,
        ticket: OperationTicket,
    },
}

impl OperationPlan {
    pub fn ticket(&self) -> &OperationTicket {
        match self {
            OperationPlan::Stream { ticket, .. } | OperationPlan::Poll { ticket, .. } => ticket,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            OperationPlan::Stream { .. } => OperationKind::Stream,
            OperationPlan::Poll { .. } => OperationKind::Poll,
        }
    }
}

#[derive(Debug, Clone)]
pub enum OperationMessage {
    Event(ProgressEvent),
    Status(AutomationStatus),
    Failed(String),
    Ended,
}

#[derive(Debug, Clone)]
pub struct OperationUpdate {
    pub case_id: CaseId,
    pub generation: u64,
    pub message: OperationMessage,
}

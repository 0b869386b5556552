pub mod driver;
pub mod error;
pub mod events;
pub mod operation;
pub mod poller;
pub mod registry;
pub mod session;
pub mod steps;
pub mod stream;

pub use driver::{DriverEvent, DriverOptions, SessionDriver, DEFAULT_SETTLE_DELAY};
pub use error::AutomationError;
pub use events::{ProgressEvent, SearchResultItem};
pub use operation::{
    CancelToken, OperationHandle, OperationKind, OperationMessage, OperationPlan, OperationTicket,
    OperationUpdate,
};
pub use poller::{poll_once, Poller};
pub use registry::SessionRegistry;
pub use session::{
    evaluate_gate, AutomationSession, CompletedStep, GateResolution, HumanGate, SessionSnapshot,
    SessionStatus, StartMode, StepActivity, UpdateOutcome,
};
pub use steps::{
    display_name, progress_percent, step_at, step_for_content, total_steps, workflow_steps,
    ContentKey, WorkflowStep,
};
pub use stream::{decode_events, EventStreamReader};

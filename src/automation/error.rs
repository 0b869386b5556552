use super::session::SessionStatus;
use crate::api::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("session state transition `{from}` -> `{to}` is invalid")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("case `{case_id}` is waiting on clinician input before the next step")]
    HumanGatePending { case_id: String },
    #[error("reprocessing from step {step} discards completed work and must be confirmed")]
    ConfirmationRequired { step: u32 },
    #[error("step {step} is out of range; valid steps are 1..={max}")]
    StepOutOfRange { step: u32, max: u32 },
    #[error("no answer recorded for question `{question_id}`")]
    UnknownQuestion { question_id: String },
    #[error("no session registered for case `{case_id}`")]
    UnknownCase { case_id: String },
    #[error("failed reading progress stream: {0}")]
    StreamRead(#[source] std::io::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

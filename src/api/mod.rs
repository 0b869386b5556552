pub mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{
    ActionAck, AutomationStatus, CaseSummary, CaseTab, DashboardStats, FollowUpSpec,
    FormQuestion, FormQuestionCatalog, FormQuestionsResponse, FormSection, StreamEndpoint,
};

use crate::shared::ids::CaseId;
use std::io::Read;

/// Raw response body of a streaming endpoint. Dropping it closes the
/// connection.
pub type EventBody = Box<dyn Read + Send>;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} returned status {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("{url} rejected the request: {message}")]
    Rejected { url: String, message: String },
}

/// Backend calls made on behalf of an automation session.
pub trait AutomationBackend: Send + Sync {
    fn start_automation(&self, case_id: &CaseId) -> Result<(), ApiError>;

    fn open_stream(&self, case_id: &CaseId, endpoint: StreamEndpoint)
        -> Result<EventBody, ApiError>;

    fn automation_status(&self, case_id: &CaseId) -> Result<AutomationStatus, ApiError>;

    fn persist_step(&self, case_id: &CaseId, step: u32) -> Result<(), ApiError>;

    fn cancel_automation(&self, case_id: &CaseId) -> Result<(), ApiError>;
}

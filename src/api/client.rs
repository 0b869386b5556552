use super::types::{
    ActionAck, AutomationStatus, CaseSummary, CaseTab, DashboardStats, FormQuestionsResponse,
    StreamEndpoint,
};
use super::{ApiError, AutomationBackend, EventBody};
use crate::config::Settings;
use crate::shared::ids::CaseId;
use serde::Deserialize;
use serde_json::json;
use std::io::Read;
use std::time::Duration;

const MAX_PDF_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ApiClient {
    api_base: String,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(api_base: impl Into<String>, stream_timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new()
            .user_agent(concat!("authflow/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = stream_timeout {
            builder = builder.timeout_read(timeout);
        }
        Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            agent: builder.build(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.api_base(), settings.automation.stream_timeout())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn case_endpoint(&self, case_id: &CaseId, action: &str) -> String {
        self.endpoint(&format!(
            "prior-auths/{}/{action}",
            urlencoding::encode(case_id.as_str())
        ))
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, ApiError> {
        let response = self
            .agent
            .get(url)
            .set("accept", "application/json")
            .call()
            .map_err(|err| request_error(url, err))?;
        response.into_json::<T>().map_err(|err| ApiError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn post_ack(&self, url: &str) -> Result<(), ApiError> {
        let response = self
            .agent
            .post(url)
            .send_json(json!({}))
            .map_err(|err| request_error(url, err))?;
        let ack = response
            .into_json::<ActionAck>()
            .map_err(|err| ApiError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if !ack.success {
            return Err(ApiError::Rejected {
                url: url.to_string(),
                message: ack
                    .error
                    .unwrap_or_else(|| "backend reported success=false".to_string()),
            });
        }
        Ok(())
    }

    pub fn list_cases(&self, tab: CaseTab) -> Result<Vec<CaseSummary>, ApiError> {
        let url = self.endpoint(&format!("prior-auths/{}", tab.as_str()));
        self.get_json(&url)
    }

    pub fn stats(&self) -> Result<DashboardStats, ApiError> {
        let url = self.endpoint("stats");
        self.get_json(&url)
    }

    pub fn form_questions(&self) -> Result<FormQuestionsResponse, ApiError> {
        let url = self.endpoint("form-questions");
        let response: FormQuestionsResponse = self.get_json(&url)?;
        if !response.success {
            return Err(ApiError::Rejected {
                url,
                message: response
                    .error
                    .clone()
                    .unwrap_or_else(|| "form questions unavailable".to_string()),
            });
        }
        Ok(response)
    }

    pub fn export_pdf(&self, case_id: &CaseId) -> Result<Vec<u8>, ApiError> {
        let url = self.case_endpoint(case_id, "export-pdf");
        let response = self
            .agent
            .post(&url)
            .set("accept", "application/pdf")
            .send_json(json!({}))
            .map_err(|err| request_error(&url, err))?;
        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_PDF_BYTES)
            .read_to_end(&mut body)
            .map_err(|err| ApiError::Decode {
                url: url.clone(),
                message: err.to_string(),
            })?;
        if body.is_empty() {
            return Err(ApiError::Decode {
                url,
                message: "empty pdf body".to_string(),
            });
        }
        Ok(body)
    }
}

impl AutomationBackend for ApiClient {
    fn start_automation(&self, case_id: &CaseId) -> Result<(), ApiError> {
        let url = self.case_endpoint(case_id, "start-automation");
        self.post_ack(&url)
    }

    fn open_stream(&self, case_id: &CaseId, endpoint: StreamEndpoint) -> Result<EventBody, ApiError> {
        let url = self.case_endpoint(case_id, endpoint.path_segment());
        let response = self
            .agent
            .post(&url)
            .set("accept", "text/event-stream")
            .send_json(json!({}))
            .map_err(|err| request_error(&url, err))?;
        Ok(Box::new(response.into_reader()))
    }

    fn automation_status(&self, case_id: &CaseId) -> Result<AutomationStatus, ApiError> {
        let url = self.endpoint(&format!(
            "automation/status/{}",
            urlencoding::encode(case_id.as_str())
        ));
        self.get_json(&url)
    }

    fn persist_step(&self, case_id: &CaseId, step: u32) -> Result<(), ApiError> {
        let url = self.case_endpoint(case_id, "step");
        self.agent
            .put(&url)
            .send_json(json!({ "step": step }))
            .map_err(|err| request_error(&url, err))?;
        Ok(())
    }

    fn cancel_automation(&self, case_id: &CaseId) -> Result<(), ApiError> {
        let url = self.case_endpoint(case_id, "cancel-automation");
        self.post_ack(&url)
    }
}

fn request_error(url: &str, err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<ActionAck>(&body)
                .ok()
                .and_then(|ack| ack.error)
                .unwrap_or_else(|| body.chars().take(200).collect());
            ApiError::Status {
                url: url.to_string(),
                status,
                message,
            }
        }
        ureq::Error::Transport(transport) => ApiError::Request {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

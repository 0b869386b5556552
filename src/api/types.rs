use crate::shared::ids::{CaseId, QuestionId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseTab {
    #[default]
    All,
    Pending,
    Running,
    Review,
    Feedback,
    Completed,
}

impl CaseTab {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Review => "review",
            Self::Feedback => "feedback",
            Self::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "review" => Ok(Self::Review),
            "feedback" => Ok(Self::Feedback),
            "completed" => Ok(Self::Completed),
            _ => Err(
                "tab must be one of: all, pending, running, review, feedback, completed"
                    .to_string(),
            ),
        }
    }
}

impl std::fmt::Display for CaseTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Streaming endpoints, one per workflow step that streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEndpoint {
    CoverageSearch,
    QuestionProcessing,
}

impl StreamEndpoint {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::CoverageSearch => "gpt5-search-stream",
            Self::QuestionProcessing => "process-questions-realtime",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub id: CaseId,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub patient_mrn: Option<String>,
    #[serde(default)]
    pub insurance_provider: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub cpt_code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub current_step: Option<u32>,
    #[serde(default)]
    pub automation_status: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub running: u64,
    #[serde(default)]
    pub review: u64,
    #[serde(default)]
    pub feedback: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub providers: BTreeMap<String, u64>,
    #[serde(default)]
    pub step_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Server-authoritative snapshot returned by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationStatus {
    #[serde(default)]
    pub current_step: Option<u32>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_running: Option<bool>,
    #[serde(default)]
    pub results: Map<String, Value>,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AutomationStatus {
    pub fn is_running(&self) -> bool {
        self.is_running.unwrap_or(true)
    }

    pub fn current_activity(&self) -> Option<&str> {
        self.details.get("current_activity").and_then(Value::as_str)
    }

    /// The backend has signalled the coverage step is done through any of
    /// the signals it has historically used.
    pub fn ready_for_form(&self) -> bool {
        let form_ready = self
            .results
            .get("form")
            .and_then(|form| form.get("status"))
            .and_then(Value::as_str)
            == Some("ready_for_completion");
        let detail_flag = self
            .details
            .get("ready_for_form")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let message_flag = self
            .message
            .as_deref()
            .is_some_and(|m| m.contains("Ready for form completion"));
        form_ready || detail_flag || message_flag
    }

    /// Nothing further will change server-side without a new client action.
    pub fn is_settled(&self) -> bool {
        self.error.is_some() || !self.is_running()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowUpSpec {
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormQuestion {
    pub id: QuestionId,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub follow_up: Option<FollowUpSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSection {
    #[serde(default)]
    pub section_name: String,
    #[serde(default, deserialize_with = "deserialize_questions")]
    pub questions: Vec<FormQuestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormQuestionCatalog {
    #[serde(default)]
    pub sections: Vec<FormSection>,
}

impl FormQuestionCatalog {
    pub fn questions(&self) -> impl Iterator<Item = &FormQuestion> {
        self.sections.iter().flat_map(|section| section.questions.iter())
    }

    pub fn question(&self, id: &QuestionId) -> Option<&FormQuestion> {
        self.questions().find(|question| &question.id == id)
    }

    /// The primary answer that reveals the question's follow-up, if any.
    pub fn follow_up_trigger(&self, id: &QuestionId) -> Option<&str> {
        self.question(id)?
            .follow_up
            .as_ref()?
            .condition
            .as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormQuestionsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub form_questions: FormQuestionCatalog,
    #[serde(default)]
    pub total_questions: u64,
    #[serde(default)]
    pub error: Option<String>,
}

// Provider subsections (`{subsection, fields: [...]}`) carry no follow-ups
// and are skipped rather than failing the whole catalog.
fn deserialize_questions<'de, D>(deserializer: D) -> Result<Vec<FormQuestion>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|item| serde_json::from_value::<FormQuestion>(item).ok())
        .collect())
}

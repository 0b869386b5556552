use crate::api::FollowUpSpec;
use crate::shared::ids::QuestionId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub relevance: Option<f64>,
}

/// One decoded `data:` record of a progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Status {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    SearchStart {
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    SearchResult {
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        results: Vec<SearchResultItem>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    SearchError {
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    SectionStart {
        #[serde(default)]
        section: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    SectionComplete {
        #[serde(default)]
        section: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    QuestionStart {
        question_id: QuestionId,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    QuestionResult {
        question_id: QuestionId,
        #[serde(default)]
        question: Option<String>,
        #[serde(default)]
        answer: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        source: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        follow_up: Option<FollowUpSpec>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    EhrExtraction {
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        citation: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    FormField {
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        justification: Option<String>,
        #[serde(default)]
        sources: Vec<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    Complete {
        #[serde(default)]
        result: Value,
        #[serde(default)]
        total_questions: Option<u64>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    CoverageCompleteReadyForForm {
        #[serde(default)]
        result: Value,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    Error {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
    },
    /// A well-formed record of a type this client does not render.
    #[serde(other)]
    Unknown,
}

impl ProgressEvent {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    /// The backend answers an unknown case with a bare `{"error": ...}`
    /// record, which decodes as an error event.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Some(object) = value.as_object_mut() {
            if !object.contains_key("type") && object.contains_key("error") {
                object.insert("type".to_string(), Value::String("error".to_string()));
            }
        }
        serde_json::from_value(value)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::SearchStart { .. } => "search_start",
            Self::SearchResult { .. } => "search_result",
            Self::SearchError { .. } => "search_error",
            Self::SectionStart { .. } => "section_start",
            Self::SectionComplete { .. } => "section_complete",
            Self::QuestionStart { .. } => "question_start",
            Self::QuestionResult { .. } => "question_result",
            Self::EhrExtraction { .. } => "ehr_extraction",
            Self::FormField { .. } => "form_field",
            Self::Complete { .. } => "complete",
            Self::CoverageCompleteReadyForForm { .. } => "coverage_complete_ready_for_form",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            Self::Status { progress, .. }
            | Self::SearchStart { progress, .. }
            | Self::SearchResult { progress, .. }
            | Self::SearchError { progress, .. }
            | Self::SectionStart { progress, .. }
            | Self::SectionComplete { progress, .. }
            | Self::QuestionStart { progress, .. }
            | Self::QuestionResult { progress, .. }
            | Self::EhrExtraction { progress, .. }
            | Self::FormField { progress, .. }
            | Self::Complete { progress, .. }
            | Self::CoverageCompleteReadyForForm { progress, .. }
            | Self::Error { progress, .. } => *progress,
            Self::Unknown => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. }
            | Self::SearchStart { message, .. }
            | Self::SearchResult { message, .. }
            | Self::SearchError { message, .. }
            | Self::SectionStart { message, .. }
            | Self::SectionComplete { message, .. }
            | Self::QuestionStart { message, .. }
            | Self::QuestionResult { message, .. }
            | Self::EhrExtraction { message, .. }
            | Self::FormField { message, .. }
            | Self::Complete { message, .. }
            | Self::CoverageCompleteReadyForForm { message, .. }
            | Self::Error { message, .. } => message.as_deref(),
            Self::Unknown => None,
        }
    }

    /// Complete, ready-for-form and error events end the step's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::CoverageCompleteReadyForForm { .. } | Self::Error { .. }
        )
    }

    /// Human-readable summary used for the activity line.
    pub fn describe(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone().unwrap_or_default(),
            Self::SearchStart { query, .. } => {
                format!("Searching: {}", query.as_deref().unwrap_or(""))
            }
            Self::SearchResult { query, results, count, .. } => format!(
                "Found {} results for: {}",
                count.unwrap_or(results.len() as u64),
                query.as_deref().unwrap_or("")
            ),
            Self::SearchError { query, error, .. } => format!(
                "Search failed for {}: {}",
                query.as_deref().unwrap_or(""),
                error.as_deref().unwrap_or("unknown error")
            ),
            Self::SectionStart { section, .. } => {
                format!("Processing {} section...", section.as_deref().unwrap_or(""))
            }
            Self::SectionComplete { section, .. } => {
                format!("Completed {} section", section.as_deref().unwrap_or(""))
            }
            Self::QuestionStart { question_id, .. } => format!("Processing question {question_id}"),
            Self::QuestionResult { question_id, .. } => format!("Answered question {question_id}"),
            Self::EhrExtraction { field, .. } => {
                format!("Extracted {} from EHR", field.as_deref().unwrap_or("field"))
            }
            Self::FormField { field, .. } => {
                format!("Populated {}", field.as_deref().unwrap_or("field"))
            }
            Self::Complete { .. } => "Step complete".to_string(),
            Self::CoverageCompleteReadyForForm { .. } => "Ready for form completion".to_string(),
            Self::Error { error, message, .. } => error
                .clone()
                .or_else(|| message.clone())
                .unwrap_or_else(|| "unknown error".to_string()),
            Self::Unknown => String::new(),
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

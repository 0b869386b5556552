use crate::api::StreamEndpoint;
use serde::{Deserialize, Serialize};

/// Key under which a step's result is stored in the session and in backend
/// status snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKey {
    Coverage,
    Insurance,
    Screening,
    Extraction,
    Form,
}

impl ContentKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coverage => "coverage",
            Self::Insurance => "insurance",
            Self::Screening => "screening",
            Self::Extraction => "extraction",
            Self::Form => "form",
        }
    }
}

impl std::fmt::Display for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub content_key: ContentKey,
    pub endpoint: StreamEndpoint,
    pub display_name: &'static str,
}

static WORKFLOW_STEPS: [WorkflowStep; 2] = [
    WorkflowStep {
        id: 1,
        title: "Policy Research & Coverage Analysis",
        description: "Searching web for insurance policy documents and determining coverage",
        icon: "fas fa-search",
        content_key: ContentKey::Coverage,
        endpoint: StreamEndpoint::CoverageSearch,
        display_name: "Coverage",
    },
    WorkflowStep {
        id: 2,
        title: "Form Processing",
        description: "Processing form questions and extracting EHR data",
        icon: "fas fa-file-medical",
        content_key: ContentKey::Form,
        endpoint: StreamEndpoint::QuestionProcessing,
        display_name: "Form Completion",
    },
];

pub fn workflow_steps() -> &'static [WorkflowStep] {
    &WORKFLOW_STEPS
}

pub fn total_steps() -> u32 {
    WORKFLOW_STEPS.len() as u32
}

/// Out of range means the workflow is finished, not an error.
pub fn step_at(n: u32) -> Option<&'static WorkflowStep> {
    if n == 0 {
        return None;
    }
    WORKFLOW_STEPS.get((n - 1) as usize)
}

pub fn progress_percent(n: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let percent = (100.0 * f64::from(n) / f64::from(total)).round();
    percent.clamp(0.0, 100.0) as u32
}

pub fn display_name(n: u32) -> &'static str {
    step_at(n).map(|step| step.display_name).unwrap_or("Unknown")
}

pub fn step_for_content(key: ContentKey) -> Option<&'static WorkflowStep> {
    WORKFLOW_STEPS.iter().find(|step| step.content_key == key)
}

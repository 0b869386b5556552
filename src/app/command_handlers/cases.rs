use crate::api::{AutomationBackend, CaseTab};
use crate::app::command_support::{client, load_settings, parse_case_id};
use crate::automation::steps::{display_name, workflow_steps};

pub fn cmd_steps() -> Result<String, String> {
    let steps = workflow_steps();
    let mut lines = vec![format!("steps={}", steps.len())];
    for step in steps {
        lines.push(format!("step.{}.title={}", step.id, step.title));
        lines.push(format!("step.{}.content_key={}", step.id, step.content_key));
        lines.push(format!(
            "step.{}.endpoint={}",
            step.id,
            step.endpoint.path_segment()
        ));
        lines.push(format!("step.{}.display_name={}", step.id, display_name(step.id)));
    }
    Ok(lines.join("\n"))
}

pub fn cmd_cases(args: &[String]) -> Result<String, String> {
    if args.len() > 1 {
        return Err("usage: cases [tab]".to_string());
    }
    let tab = match args.first() {
        Some(raw) => CaseTab::parse(raw)?,
        None => CaseTab::All,
    };
    let settings = load_settings()?;
    let cases = client(&settings)
        .list_cases(tab)
        .map_err(|e| e.to_string())?;

    let mut lines = vec![format!("tab={tab}"), format!("cases={}", cases.len())];
    for case in &cases {
        let id = case.id.as_str();
        lines.push(format!(
            "case.{id}.patient={}",
            case.patient_name.as_deref().unwrap_or("-")
        ));
        lines.push(format!(
            "case.{id}.status={}",
            case.status.as_deref().unwrap_or("-")
        ));
        lines.push(format!(
            "case.{id}.step={}",
            case.current_step
                .map(|step| display_name(step).to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
        if let Some(provider) = &case.insurance_provider {
            lines.push(format!("case.{id}.insurance={provider}"));
        }
    }
    Ok(lines.join("\n"))
}

pub fn cmd_stats() -> Result<String, String> {
    let settings = load_settings()?;
    let stats = client(&settings).stats().map_err(|e| e.to_string())?;
    let mut lines = vec![
        format!("total={}", stats.total),
        format!("pending={}", stats.pending),
        format!("running={}", stats.running),
        format!("review={}", stats.review),
        format!("feedback={}", stats.feedback),
        format!("completed={}", stats.completed),
    ];
    for (provider, count) in &stats.providers {
        lines.push(format!("provider.{provider}={count}"));
    }
    for (step, count) in &stats.step_counts {
        lines.push(format!("step.{step}={count}"));
    }
    Ok(lines.join("\n"))
}

pub fn cmd_questions() -> Result<String, String> {
    let settings = load_settings()?;
    let response = client(&settings)
        .form_questions()
        .map_err(|e| e.to_string())?;
    let catalog = &response.form_questions;

    let mut lines = vec![
        format!("sections={}", catalog.sections.len()),
        format!("questions={}", catalog.questions().count()),
    ];
    for question in catalog.questions() {
        let id = question.id.as_str();
        lines.push(format!(
            "question.{id}={}",
            question.question.as_deref().unwrap_or("")
        ));
        if let Some(trigger) = catalog.follow_up_trigger(&question.id) {
            lines.push(format!("question.{id}.follow_up_when={trigger}"));
        }
    }
    Ok(lines.join("\n"))
}

pub fn cmd_status(args: &[String]) -> Result<String, String> {
    let [raw] = args else {
        return Err("usage: status <case>".to_string());
    };
    let case_id = parse_case_id(raw)?;
    let settings = load_settings()?;
    let status = client(&settings)
        .automation_status(&case_id)
        .map_err(|e| e.to_string())?;

    let mut lines = vec![
        format!("case={case_id}"),
        format!("running={}", status.is_running()),
        format!(
            "step={}",
            status
                .current_step
                .map(|step| step.to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!(
            "progress={}",
            status
                .progress
                .map(|p| format!("{p:.0}"))
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("ready_for_form={}", status.ready_for_form()),
    ];
    if let Some(activity) = status.current_activity() {
        lines.push(format!("activity={activity}"));
    }
    if let Some(error) = &status.error {
        lines.push(format!("error={error}"));
    }
    Ok(lines.join("\n"))
}

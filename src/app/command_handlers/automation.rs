use crate::api::{ApiClient, AutomationBackend, FormQuestionCatalog};
use crate::app::command_support::{client, load_settings, open_log, parse_case_args, ResumeFrom};
use crate::automation::{
    poll_once, total_steps, DriverOptions, SessionDriver, SessionStatus, StartMode,
};
use crate::config::Settings;
use crate::render::{AutoScroll, ProjectionContext};
use crate::shared::ids::CaseId;
use crate::shared::logging::LogSink;
use crate::tui::run_dashboard;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A bare `--resume` costs one status fetch to learn the backend's step.
fn start_mode(
    backend: &dyn AutomationBackend,
    case_id: &CaseId,
    resume: Option<ResumeFrom>,
) -> Result<StartMode, String> {
    match resume {
        None => Ok(StartMode::Fresh),
        Some(ResumeFrom::Step(step)) => Ok(StartMode::Resume { step }),
        Some(ResumeFrom::Backend) => {
            let status = poll_once(backend, case_id).map_err(|e| e.to_string())?;
            let step = status
                .current_step
                .ok_or_else(|| format!("backend reports no current step for case {case_id}"))?;
            Ok(StartMode::Resume {
                step: step.clamp(1, total_steps()),
            })
        }
    }
}

/// The question catalog is optional; without it follow-up triggers come
/// from streamed events only.
fn build_driver(
    settings: &Settings,
    api: &ApiClient,
    log: LogSink,
) -> (SessionDriver, Option<FormQuestionCatalog>) {
    let mut driver = SessionDriver::new(
        Arc::new(api.clone()),
        DriverOptions::from_settings(settings),
    )
    .with_log(log.clone());
    let catalog = match api.form_questions() {
        Ok(response) => Some(response.form_questions),
        Err(err) => {
            log.warn("cli.form_questions_unavailable", None, &err.to_string());
            None
        }
    };
    if let Some(catalog) = &catalog {
        driver = driver.with_question_catalog(catalog.clone());
    }
    (driver, catalog)
}

fn case_summary(driver: &SessionDriver, case_id: &CaseId) -> Vec<String> {
    let Some(session) = driver.session(case_id) else {
        return vec![format!("case.{case_id}.status=unknown")];
    };
    let mut lines = vec![
        format!("case.{case_id}.status={}", session.status()),
        format!("case.{case_id}.step={}", session.current_step()),
        format!(
            "case.{case_id}.completed_steps={}",
            session.step_history().len()
        ),
    ];
    if let Some(gate) = session.gate() {
        lines.push(format!("case.{case_id}.gate=clinician_input"));
        for doc in &gate.missing_documents {
            lines.push(format!("case.{case_id}.missing_document={doc}"));
        }
    }
    if let Some(error) = session.error() {
        lines.push(format!("case.{case_id}.error={error}"));
    }
    lines
}

pub fn cmd_run(args: &[String]) -> Result<String, String> {
    let (cases, resume) = parse_case_args(args)?;
    if cases.is_empty() {
        return Err("usage: run <case>... [--resume [<step>]]".to_string());
    }
    let settings = load_settings()?;
    let log = open_log(&settings)?;
    let api = client(&settings);
    let (mut driver, _) = build_driver(&settings, &api, log);

    let mut start_errors = BTreeMap::new();
    for case_id in &cases {
        let started = start_mode(&api, case_id, resume)
            .and_then(|mode| driver.start(case_id, mode).map_err(|e| e.to_string()));
        if let Err(err) = started {
            start_errors.insert(case_id.clone(), err);
        }
    }
    driver.run_until_settled(None);
    driver.wait_for_notifications();

    let mut lines = vec![format!("cases={}", cases.len())];
    let mut failed = Vec::new();
    for case_id in &cases {
        lines.extend(case_summary(&driver, case_id));
        if let Some(err) = start_errors.get(case_id) {
            failed.push(format!("{case_id} ({err})"));
        } else if driver
            .session(case_id)
            .is_some_and(|session| session.status() == SessionStatus::Error)
        {
            failed.push(case_id.to_string());
        }
    }
    if !failed.is_empty() {
        return Err(format!(
            "automation failed for {}\n{}",
            failed.join(", "),
            lines.join("\n")
        ));
    }
    Ok(lines.join("\n"))
}

pub fn cmd_watch(args: &[String]) -> Result<String, String> {
    let (cases, resume) = parse_case_args(args)?;
    let [case_id] = cases.as_slice() else {
        return Err("usage: watch <case> [--resume [<step>]]".to_string());
    };
    let settings = load_settings()?;
    let log = open_log(&settings)?;
    let api = client(&settings);
    let (mut driver, catalog) = build_driver(&settings, &api, log);
    let mode = start_mode(&api, case_id, resume)?;
    driver.start(case_id, mode).map_err(|e| e.to_string())?;

    let mut ctx = ProjectionContext::from_settings(&settings);
    ctx.catalog = catalog;
    let scroll = AutoScroll::new(
        settings.display.auto_scroll,
        settings.display.scroll_throttle(),
    );
    run_dashboard(&mut driver, case_id, ctx, scroll)?;
    driver.wait_for_notifications();
    Ok(case_summary(&driver, case_id).join("\n"))
}

pub fn cmd_cancel(args: &[String]) -> Result<String, String> {
    let (cases, _) = parse_case_args(args)?;
    let [case_id] = cases.as_slice() else {
        return Err("usage: cancel <case>".to_string());
    };
    let settings = load_settings()?;
    let log = open_log(&settings)?;
    client(&settings)
        .cancel_automation(case_id)
        .map_err(|e| e.to_string())?;
    log.info("cli.cancel", Some(case_id.as_str()), "cancel acknowledged");
    Ok([format!("case={case_id}"), "cancelled=true".to_string()].join("\n"))
}

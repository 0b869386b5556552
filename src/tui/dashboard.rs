use crate::automation::{AutomationError, GateResolution, SessionDriver, SessionStatus};
use crate::render::{
    project, AutoScroll, ProjectionContext, RenderFrame, ScrollAction, ScrollTarget, SectionBody,
    SectionId, ViewState,
};
use crate::shared::ids::{CaseId, QuestionId};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{cursor, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

const UI_POLL_INTERVAL: Duration = Duration::from_millis(60);
const PUMP_WAIT: Duration = Duration::from_millis(5);
const MAX_UPDATES_PER_TICK: usize = 64;
const PROCESSING_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
const SPINNER_TICK_INTERVAL: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTone {
    Normal,
    Muted,
    Heading,
    Success,
    Warning,
    Danger,
}

/// One body row, tagged with the scroll target it anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyLine {
    pub text: String,
    pub tone: LineTone,
    pub anchor: Option<ScrollTarget>,
}

impl BodyLine {
    fn new(text: impl Into<String>, tone: LineTone) -> Self {
        Self {
            text: text.into(),
            tone,
            anchor: None,
        }
    }

    fn anchored(text: impl Into<String>, tone: LineTone, anchor: ScrollTarget) -> Self {
        Self {
            text: text.into(),
            tone,
            anchor: Some(anchor),
        }
    }
}

/// Flattens a frame into the dashboard body.
pub fn body_lines(frame: &RenderFrame) -> Vec<BodyLine> {
    let mut lines = Vec::new();
    if let Some(error) = &frame.error {
        lines.push(BodyLine::anchored(
            format!("Error: {}", error.message),
            LineTone::Danger,
            ScrollTarget::Error,
        ));
        lines.push(BodyLine::new(error.retry_hint.clone(), LineTone::Muted));
        lines.push(BodyLine::new("", LineTone::Normal));
    }
    if let Some(gate) = &frame.gate {
        lines.push(BodyLine::anchored(
            format!("Clinician input required: {}", gate.subject),
            LineTone::Warning,
            ScrollTarget::Gate,
        ));
        for doc in &gate.missing_documents {
            lines.push(BodyLine::new(format!("  missing: {doc}"), LineTone::Warning));
        }
        for note in &gate.notes {
            lines.push(BodyLine::new(format!("  note: {note}"), LineTone::Muted));
        }
        for row in gate.message.lines() {
            lines.push(BodyLine::new(format!("  > {row}"), LineTone::Normal));
        }
        lines.push(BodyLine::new(
            "  press n to send this message and continue",
            LineTone::Muted,
        ));
        lines.push(BodyLine::new("", LineTone::Normal));
    }

    for section in &frame.sections {
        let marker = if section.expanded { "v" } else { ">" };
        lines.push(BodyLine::new(
            format!("{marker} {}", section.title),
            LineTone::Heading,
        ));
        if !section.expanded {
            continue;
        }
        match &section.body {
            SectionBody::SearchResults { batches, errors } => {
                for (index, batch) in batches.iter().enumerate() {
                    lines.push(BodyLine::anchored(
                        format!("  query: {}", batch.query),
                        LineTone::Normal,
                        ScrollTarget::SearchBatch(index),
                    ));
                    if batch.waiting_for_real_results() {
                        lines.push(BodyLine::new(
                            "    waiting for real results...",
                            LineTone::Muted,
                        ));
                    }
                    for item in &batch.items {
                        lines.push(BodyLine::new(
                            format!("    {} [{}]", item.title, item.source),
                            LineTone::Success,
                        ));
                        lines.push(BodyLine::new(format!("      {}", item.url), LineTone::Muted));
                    }
                }
                for error in errors {
                    lines.push(BodyLine::new(format!("  failed: {error}"), LineTone::Warning));
                }
            }
            SectionBody::Requirements { lines: rows } => {
                if rows.is_empty() {
                    lines.push(BodyLine::new("  no requirements yet", LineTone::Muted));
                }
                for row in rows {
                    lines.push(BodyLine::new(format!("  {row}"), LineTone::Normal));
                }
            }
            SectionBody::FormAnswers {
                questions,
                extractions,
                fields,
                completed,
                total,
            } => {
                let total = total
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "?".to_string());
                lines.push(BodyLine::new(
                    format!("  {completed}/{total} questions answered"),
                    LineTone::Muted,
                ));
                if let Some(section) = frame.scroll_target.as_ref().and_then(|t| match t {
                    ScrollTarget::Section(name) => Some(name.clone()),
                    _ => None,
                }) {
                    lines.push(BodyLine::anchored(
                        format!("  section: {section}"),
                        LineTone::Heading,
                        ScrollTarget::Section(section),
                    ));
                }
                for question in questions {
                    let answer = question.answer.as_deref().unwrap_or("-");
                    let edited = if question.user_edited { " (edited)" } else { "" };
                    lines.push(BodyLine::anchored(
                        format!("  [{}] {}", question.id, question.question),
                        LineTone::Normal,
                        ScrollTarget::Question(question.id.to_string()),
                    ));
                    lines.push(BodyLine::new(
                        format!("      {answer}{edited} ({})", question.status),
                        if question.status == "completed" {
                            LineTone::Success
                        } else {
                            LineTone::Muted
                        },
                    ));
                    if let Some(follow_up) = &question.follow_up {
                        lines.push(BodyLine::new(
                            format!("      -> {}", follow_up.question),
                            LineTone::Normal,
                        ));
                        lines.push(BodyLine::new(
                            format!(
                                "         {}",
                                follow_up.answer.as_deref().unwrap_or("waiting for agent...")
                            ),
                            LineTone::Muted,
                        ));
                    }
                }
                for row in extractions {
                    lines.push(BodyLine::new(format!("  ehr: {row}"), LineTone::Muted));
                }
                for row in fields {
                    lines.push(BodyLine::new(format!("  field: {row}"), LineTone::Normal));
                }
            }
        }
    }

    if !frame.history.is_empty() {
        lines.push(BodyLine::new("", LineTone::Normal));
        lines.push(BodyLine::new("History", LineTone::Heading));
        for entry in &frame.history {
            lines.push(BodyLine::new(
                format!(
                    "  {} Step {}: {} at {}",
                    if entry.expanded { "v" } else { ">" },
                    entry.step_number,
                    entry.title,
                    entry.completed_at
                ),
                LineTone::Success,
            ));
            if entry.expanded {
                for row in &entry.summary {
                    lines.push(BodyLine::new(format!("      {row}"), LineTone::Muted));
                }
            }
        }
    }
    lines
}

pub fn anchor_offset(lines: &[BodyLine], target: &ScrollTarget) -> Option<u16> {
    lines
        .iter()
        .position(|line| line.anchor.as_ref() == Some(target))
        .map(|index| index.min(u16::MAX as usize) as u16)
}

/// Editable answers in display order: each answered question, then its
/// answered follow-up.
fn editable_answers(frame: &RenderFrame) -> Vec<(QuestionId, String)> {
    let Some(SectionBody::FormAnswers { questions, .. }) = frame
        .section(SectionId::FormAnswers)
        .map(|section| &section.body)
    else {
        return Vec::new();
    };
    let mut editable = Vec::new();
    for question in questions {
        if let Some(answer) = &question.answer {
            editable.push((question.id.clone(), answer.clone()));
        }
        if let Some(follow_up) = &question.follow_up {
            if let Some(answer) = &follow_up.answer {
                editable.push((follow_up.id.clone(), answer.clone()));
            }
        }
    }
    editable
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EditOutcome {
    Editing,
    Save(QuestionId, String),
    Discard,
}

/// Reviewer override of one populated answer, typed into the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AnswerEditor {
    answers: Vec<(QuestionId, String)>,
    selected: usize,
    buffer: String,
}

impl AnswerEditor {
    fn open(frame: &RenderFrame) -> Option<Self> {
        let answers = editable_answers(frame);
        let buffer = answers.first()?.1.clone();
        Some(Self {
            answers,
            selected: 0,
            buffer,
        })
    }

    fn selected_id(&self) -> &QuestionId {
        &self.answers[self.selected].0
    }

    fn select(&mut self, index: usize) {
        self.selected = index % self.answers.len();
        self.buffer = self.answers[self.selected].1.clone();
    }

    fn handle(&mut self, code: KeyCode) -> EditOutcome {
        match code {
            KeyCode::Esc => return EditOutcome::Discard,
            KeyCode::Enter => {
                let answer = self.buffer.trim();
                if !answer.is_empty() {
                    return EditOutcome::Save(self.selected_id().clone(), answer.to_string());
                }
            }
            KeyCode::Tab | KeyCode::Down => self.select(self.selected + 1),
            KeyCode::BackTab | KeyCode::Up => {
                self.select(self.selected + self.answers.len() - 1);
            }
            KeyCode::Backspace => {
                self.buffer.pop();
            }
            KeyCode::Char(c) => self.buffer.push(c),
            _ => {}
        }
        EditOutcome::Editing
    }

    fn prompt(&self) -> String {
        format!(
            "edit [{}]: {}_  (tab next question, enter save, esc cancel)",
            self.selected_id(),
            self.buffer
        )
    }
}

struct DashboardState {
    case_id: CaseId,
    view: ViewState,
    scroll: AutoScroll,
    ctx: ProjectionContext,
    offset: u16,
    pending_scroll: Option<(ScrollAction, Instant)>,
    last_requested: Option<ScrollTarget>,
    pending_confirm: Option<u32>,
    editor: Option<AnswerEditor>,
    notice: Option<String>,
    frame: Option<RenderFrame>,
    spinner_index: usize,
    last_spinner_tick: Instant,
}

impl DashboardState {
    fn new(case_id: CaseId, ctx: ProjectionContext, scroll: AutoScroll) -> Self {
        Self {
            case_id,
            view: ViewState::default(),
            scroll,
            ctx,
            offset: 0,
            pending_scroll: None,
            last_requested: None,
            pending_confirm: None,
            editor: None,
            notice: None,
            frame: None,
            spinner_index: 0,
            last_spinner_tick: Instant::now(),
        }
    }

    fn refresh(&mut self, driver: &SessionDriver) {
        let Some(session) = driver.session(&self.case_id) else {
            return;
        };
        let snapshot = session.snapshot();
        let frame = project(
            &snapshot,
            snapshot.last_event.as_ref(),
            &self.view,
            &self.ctx,
        );

        let now = Instant::now();
        if frame.scroll_target != self.last_requested {
            if let Some(target) = frame.scroll_target.clone() {
                if let Some(action) = self.scroll.request(target, frame.scroll_delay, now) {
                    let due = now + action.delay;
                    self.pending_scroll = Some((action, due));
                }
            }
            self.last_requested = frame.scroll_target.clone();
        }
        if let Some((action, due)) = &self.pending_scroll {
            if *due <= now {
                if let Some(offset) = anchor_offset(&body_lines(&frame), &action.target) {
                    self.offset = offset;
                }
                self.pending_scroll = None;
            }
        }
        self.frame = Some(frame);

        if snapshot.active.is_some() && self.last_spinner_tick.elapsed() >= SPINNER_TICK_INTERVAL
        {
            self.spinner_index = (self.spinner_index + 1) % PROCESSING_FRAMES.len();
            self.last_spinner_tick = now;
        }
    }

    fn section_expanded(&self, id: SectionId) -> bool {
        self.frame
            .as_ref()
            .and_then(|frame| frame.section(id))
            .is_some_and(|section| section.expanded)
    }

    fn status_line(&self, driver: &SessionDriver) -> String {
        if let Some(editor) = &self.editor {
            return editor.prompt();
        }
        if let Some(step) = self.pending_confirm {
            return format!("reprocess from step {step}? this discards later results (y/n)");
        }
        if let Some(notice) = &self.notice {
            return notice.clone();
        }
        let running = driver
            .session(&self.case_id)
            .is_some_and(|session| session.active_operation().is_some());
        let spinner = if running {
            PROCESSING_FRAMES[self.spinner_index % PROCESSING_FRAMES.len()]
        } else {
            " "
        };
        format!(
            "{spinner} q quit  a auto-scroll({})  c cancel  n next  e edit  r retry  1/2 reprocess  s/p/f sections  h history",
            if self.scroll.is_enabled() { "on" } else { "off" }
        )
    }
}

pub fn run_dashboard(
    driver: &mut SessionDriver,
    case_id: &CaseId,
    ctx: ProjectionContext,
    scroll: AutoScroll,
) -> Result<SessionStatus, String> {
    let mut terminal = setup_terminal()?;
    let mut state = DashboardState::new(case_id.clone(), ctx, scroll);

    let result = run_event_loop(&mut terminal, driver, &mut state);
    teardown_terminal(&mut terminal)?;

    result?;
    Ok(driver
        .session(case_id)
        .map(|session| session.status())
        .unwrap_or(SessionStatus::Idle))
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    driver: &mut SessionDriver,
    state: &mut DashboardState,
) -> Result<(), String> {
    loop {
        for _ in 0..MAX_UPDATES_PER_TICK {
            if driver.pump(PUMP_WAIT).is_none() {
                break;
            }
        }
        state.refresh(driver);
        draw_dashboard(terminal, driver, state)?;

        if !event::poll(UI_POLL_INTERVAL).map_err(|e| format!("failed to poll events: {e}"))? {
            continue;
        }
        let Event::Key(key) = event::read().map_err(|e| format!("failed to read event: {e}"))?
        else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            break;
        }

        if let Some(editor) = state.editor.as_mut() {
            match editor.handle(key.code) {
                EditOutcome::Editing => {}
                EditOutcome::Discard => {
                    state.editor = None;
                    state.notice = Some("edit discarded".to_string());
                }
                EditOutcome::Save(question_id, answer) => {
                    state.editor = None;
                    let result = match driver.session_mut(&state.case_id) {
                        Some(session) => session.edit_answer(&question_id, answer),
                        None => Err(AutomationError::UnknownCase {
                            case_id: state.case_id.to_string(),
                        }),
                    };
                    state.notice = Some(match result {
                        Ok(()) => format!("answer for {question_id} updated"),
                        Err(err) => err.to_string(),
                    });
                }
            }
            continue;
        }

        if let Some(step) = state.pending_confirm.take() {
            if key.code == KeyCode::Char('y') {
                state.notice = Some(match driver.reprocess_from(&state.case_id, step, true) {
                    Ok(()) => {
                        state.view.clear_overrides();
                        format!("reprocessing from step {step}")
                    }
                    Err(err) => err.to_string(),
                });
            } else {
                state.notice = Some("reprocess cancelled".to_string());
            }
            continue;
        }

        state.notice = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char('a') => {
                let enabled = state.scroll.toggle();
                state.notice = Some(format!(
                    "auto-scroll {}",
                    if enabled { "enabled" } else { "disabled" }
                ));
            }
            KeyCode::Char('c') => {
                state.notice = Some(match driver.cancel(&state.case_id) {
                    Ok(()) => "automation cancelled".to_string(),
                    Err(err) => err.to_string(),
                });
            }
            KeyCode::Char('n') => {
                let gated = driver
                    .session(&state.case_id)
                    .is_some_and(|session| session.gate().is_some());
                let result = if gated {
                    driver.resolve_gate(&state.case_id, GateResolution::default())
                } else {
                    driver.advance(&state.case_id)
                };
                state.notice = Some(match result {
                    Ok(Some(step)) => format!("started step {step}"),
                    Ok(None) => "workflow complete".to_string(),
                    Err(err) => err.to_string(),
                });
            }
            KeyCode::Char('e') => {
                state.editor = state.frame.as_ref().and_then(AnswerEditor::open);
                if state.editor.is_none() {
                    state.notice = Some("no answers to edit yet".to_string());
                }
            }
            KeyCode::Char('r') => {
                state.notice = Some(match driver.retry(&state.case_id) {
                    Ok(()) => "retrying".to_string(),
                    Err(err) => err.to_string(),
                });
            }
            KeyCode::Char(digit @ '1'..='9') => {
                state.pending_confirm = digit.to_digit(10);
            }
            KeyCode::Char('s') => toggle(state, SectionId::SearchResults),
            KeyCode::Char('p') => toggle(state, SectionId::Requirements),
            KeyCode::Char('f') => toggle(state, SectionId::FormAnswers),
            KeyCode::Char('h') => {
                let steps: Vec<u32> = state
                    .frame
                    .as_ref()
                    .map(|frame| frame.history.iter().map(|e| e.step_number).collect())
                    .unwrap_or_default();
                for step in steps {
                    state.view.toggle_history(step);
                }
            }
            KeyCode::Up => state.offset = state.offset.saturating_sub(1),
            KeyCode::Down => state.offset = state.offset.saturating_add(1),
            KeyCode::PageUp => state.offset = state.offset.saturating_sub(10),
            KeyCode::PageDown => state.offset = state.offset.saturating_add(10),
            _ => {}
        }
    }
    Ok(())
}

fn toggle(state: &mut DashboardState, section: SectionId) {
    let expanded = state.section_expanded(section);
    state.view.toggle_section(section, expanded);
}

fn tone_style(tone: LineTone) -> Style {
    match tone {
        LineTone::Normal => Style::default(),
        LineTone::Muted => Style::default().fg(Color::Gray),
        LineTone::Heading => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
        LineTone::Success => Style::default().fg(Color::Green),
        LineTone::Warning => Style::default().fg(Color::Yellow),
        LineTone::Danger => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

fn draw_dashboard(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    driver: &SessionDriver,
    state: &DashboardState,
) -> Result<(), String> {
    let Some(frame_view) = state.frame.as_ref() else {
        return Ok(());
    };
    let status_line = state.status_line(driver);
    terminal
        .draw(|frame| {
            let areas = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(4),
                    Constraint::Length(3),
                    Constraint::Min(8),
                    Constraint::Length(3),
                ])
                .split(frame.area());

            let header = Paragraph::new(vec![
                Line::raw(format!(
                    "{}  [{}]",
                    frame_view.header.step_label, frame_view.header.status_label
                )),
                Line::styled(
                    frame_view.header.description.clone(),
                    Style::default().fg(Color::Gray),
                ),
            ])
            .block(
                Block::default()
                    .title(format!("Case {}", frame_view.header.case_id))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(header, areas[0]);

            let activity = frame_view.activity.clone().unwrap_or_default();
            let gauge = Gauge::default()
                .block(Block::default().title(activity).borders(Borders::ALL))
                .gauge_style(Style::default().fg(Color::Green))
                .percent(frame_view.progress.percent.min(100) as u16)
                .label(frame_view.progress.label.clone());
            frame.render_widget(gauge, areas[1]);

            let body = body_lines(frame_view)
                .into_iter()
                .map(|line| Line::styled(line.text, tone_style(line.tone)))
                .collect::<Vec<_>>();
            let body_widget = Paragraph::new(body)
                .block(Block::default().title("Automation").borders(Borders::ALL))
                .wrap(Wrap { trim: false })
                .scroll((state.offset, 0));
            frame.render_widget(body_widget, areas[2]);

            let status_widget = Paragraph::new(status_line.clone())
                .block(Block::default().title("Keys").borders(Borders::ALL));
            frame.render_widget(status_widget, areas[3]);
        })
        .map_err(|e| format!("failed to render dashboard: {e}"))?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, String> {
    enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {e}"))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)
        .map_err(|e| format!("failed to enter alternate screen: {e}"))?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| format!("failed to initialize terminal: {e}"))
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), String> {
    disable_raw_mode().map_err(|e| format!("failed to disable raw mode: {e}"))?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)
        .map_err(|e| format!("failed to leave alternate screen: {e}"))?;
    terminal
        .show_cursor()
        .map_err(|e| format!("failed to restore cursor: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ErrorPanel, HeaderView, ProgressView, QuestionView, SectionView};

    fn question(id: &str, answer: Option<&str>) -> QuestionView {
        QuestionView {
            id: QuestionId::parse(id).expect("question id"),
            question: format!("Question {id}"),
            answer: answer.map(str::to_string),
            status: "completed".to_string(),
            source: None,
            user_edited: false,
            follow_up: None,
        }
    }

    fn form_frame(questions: Vec<QuestionView>) -> RenderFrame {
        frame_with(
            vec![SectionView {
                id: SectionId::FormAnswers,
                title: "Form Answers".to_string(),
                expanded: true,
                body: SectionBody::FormAnswers {
                    questions,
                    extractions: Vec::new(),
                    fields: Vec::new(),
                    completed: 2,
                    total: Some(3),
                },
            }],
            None,
        )
    }

    fn type_text(editor: &mut AnswerEditor, text: &str) {
        for c in text.chars() {
            assert_eq!(editor.handle(KeyCode::Char(c)), EditOutcome::Editing);
        }
    }

    fn frame_with(sections: Vec<SectionView>, error: Option<ErrorPanel>) -> RenderFrame {
        RenderFrame {
            header: HeaderView {
                case_id: "7".to_string(),
                step_label: "Step 2: Form Processing".to_string(),
                description: String::new(),
                icon: String::new(),
                status: SessionStatus::Running,
                status_label: "In Progress".to_string(),
            },
            progress: ProgressView {
                percent: 100,
                label: "100% Complete".to_string(),
                step_percent: None,
            },
            activity: None,
            sections,
            history: Vec::new(),
            gate: None,
            error,
            scroll_target: None,
            scroll_delay: None,
        }
    }

    #[test]
    fn collapsed_sections_render_only_their_heading() {
        let frame = frame_with(
            vec![SectionView {
                id: SectionId::Requirements,
                title: "Coverage Requirements".to_string(),
                expanded: false,
                body: SectionBody::Requirements {
                    lines: vec!["Coverage status: covered".to_string()],
                },
            }],
            None,
        );
        let lines = body_lines(&frame);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "> Coverage Requirements");
    }

    #[test]
    fn error_panel_is_first_and_anchored() {
        let frame = frame_with(
            Vec::new(),
            Some(ErrorPanel {
                message: "boom".to_string(),
                retry_hint: "press r to retry step 1".to_string(),
            }),
        );
        let lines = body_lines(&frame);
        assert_eq!(anchor_offset(&lines, &ScrollTarget::Error), Some(0));
        assert_eq!(anchor_offset(&lines, &ScrollTarget::Gate), None);
    }

    #[test]
    fn editor_cycles_answered_questions_including_follow_ups() {
        let mut primary = question("q1", Some("Yes"));
        primary.follow_up = Some(Box::new(question("q1_followup", Some("MRI"))));
        let frame = form_frame(vec![primary, question("q2", None), question("q3", Some("No"))]);

        let mut editor = AnswerEditor::open(&frame).expect("editable answers");
        assert_eq!(editor.selected_id().as_str(), "q1");
        assert_eq!(editor.buffer, "Yes");

        editor.handle(KeyCode::Tab);
        assert_eq!(editor.selected_id().as_str(), "q1_followup");
        assert_eq!(editor.buffer, "MRI");
        editor.handle(KeyCode::Tab);
        assert_eq!(editor.selected_id().as_str(), "q3");
        editor.handle(KeyCode::Tab);
        assert_eq!(editor.selected_id().as_str(), "q1");
        editor.handle(KeyCode::BackTab);
        assert_eq!(editor.selected_id().as_str(), "q3");
        assert!(editor.prompt().starts_with("edit [q3]: No_"));
    }

    #[test]
    fn editor_saves_the_typed_answer_for_the_selected_question() {
        let frame = form_frame(vec![question("q1", Some("Yes"))]);
        let mut editor = AnswerEditor::open(&frame).expect("editable answers");

        for _ in 0..3 {
            editor.handle(KeyCode::Backspace);
        }
        assert_eq!(editor.handle(KeyCode::Enter), EditOutcome::Editing);
        type_text(&mut editor, " No ");
        assert_eq!(
            editor.handle(KeyCode::Enter),
            EditOutcome::Save(QuestionId::parse("q1").expect("id"), "No".to_string())
        );
    }

    #[test]
    fn editor_needs_an_answer_and_can_be_discarded() {
        let unanswered = form_frame(vec![question("q1", None)]);
        assert!(AnswerEditor::open(&unanswered).is_none());
        assert!(AnswerEditor::open(&frame_with(Vec::new(), None)).is_none());

        let frame = form_frame(vec![question("q1", Some("Yes"))]);
        let mut editor = AnswerEditor::open(&frame).expect("editable answers");
        type_text(&mut editor, "q");
        assert_eq!(editor.buffer, "Yesq");
        assert_eq!(editor.handle(KeyCode::Esc), EditOutcome::Discard);
    }
}

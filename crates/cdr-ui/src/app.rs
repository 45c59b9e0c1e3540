//! Main application state and TUI event loop for the CDR analyzer.
//!
//! [`App`] owns the theme, the current screen and the analysis parameters,
//! and forwards every data change to the [`Session`]. Worker completions
//! arrive on an async channel and are applied between key presses.

use std::io;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;

use cdr_core::error::CdrError;
use cdr_core::models::{AnalysisRequest, DateRange, LocationKind, ReportKind, Role};
use cdr_core::time_utils::parse_cli_date;
use cdr_runtime::session::{Session, SessionEvent};
use cdr_runtime::worker::Completion;

use crate::chart_export::export_chart;
use crate::components::header::Header;
use crate::components::status_bar::{KeyHint, StatusBar};
use crate::mapping_view;
use crate::results_view::{self, ResultsSummary};
use crate::themes::Theme;

/// Largest accepted top-N.
pub const MAX_TOP_N: usize = 500;

const OPEN_KEYS: &[KeyHint] = &[("o", "open file"), ("q", "quit")];
const MAPPING_KEYS: &[KeyHint] = &[
    ("↑↓", "field"),
    ("←→", "column"),
    ("Enter", "confirm"),
    ("Esc", "back"),
    ("o", "open"),
    ("q", "quit"),
];
const RESULTS_KEYS: &[KeyHint] = &[
    ("a", "analyze"),
    ("k", "kind"),
    ("l", "location"),
    ("+/-", "top-n"),
    ("s/e", "dates"),
    ("x", "export table"),
    ("c", "export chart"),
    ("m", "mapping"),
    ("o", "open"),
    ("q", "quit"),
];
const PROMPT_KEYS: &[KeyHint] = &[("Enter", "accept"), ("Esc", "cancel")];

// ── Screen / Prompt ───────────────────────────────────────────────────────────

/// Which screen the TUI is currently rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Nothing loaded yet.
    Open,
    /// Column mapping review for the loaded table.
    Mapping,
    /// Report list and chart.
    Results,
}

/// A one-line text input awaiting Enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Open,
    ExportTable,
    ExportChart,
    StartDate,
    EndDate,
}

impl Prompt {
    pub fn label(self) -> &'static str {
        match self {
            Prompt::Open => "Open CDR file",
            Prompt::ExportTable => "Export table to (.csv/.xlsx/.json)",
            Prompt::ExportChart => "Export chart to (.png/.svg)",
            Prompt::StartDate => "Start date (YYYY-MM-DD)",
            Prompt::EndDate => "End date (YYYY-MM-DD)",
        }
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// Initial analysis parameters, usually from the command line.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub theme: String,
    pub kind: ReportKind,
    pub top_n: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Root application state for the CDR analyzer TUI.
pub struct App {
    /// Active colour theme.
    pub theme: Theme,
    pub screen: Screen,
    /// Set to `true` to break out of the event loop on the next iteration.
    pub should_quit: bool,
    pub session: Session,
    pub kind: ReportKind,
    /// Location column used when cycling back to a location report.
    pub location: LocationKind,
    pub top_n: usize,
    /// Explicit range bounds; `None` falls back to the data span.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Index into [`Role::ALL`] on the mapping screen.
    pub selected_role: usize,
    pub prompt: Option<Prompt>,
    pub input: String,
    /// Parameters changed while a job was running.
    rerun: bool,
}

impl App {
    pub fn new(session: Session, options: AppOptions) -> Self {
        let location = match options.kind {
            ReportKind::Location(kind) => kind,
            _ => LocationKind::Main,
        };
        Self {
            theme: Theme::from_name(&options.theme),
            screen: Screen::Open,
            should_quit: false,
            session,
            kind: options.kind,
            location,
            top_n: options.top_n.clamp(1, MAX_TOP_N),
            start: options.start,
            end: options.end,
            selected_role: 0,
            prompt: None,
            input: String::new(),
            rerun: false,
        }
    }

    // ── Public event loop ─────────────────────────────────────────────────────

    /// Run the interactive TUI, receiving worker completions from `rx`.
    ///
    /// Uses `crossterm::event::poll` (synchronous, with a 250 ms timeout) so
    /// that the terminal event loop stays on the current thread while
    /// completions arrive on the async channel via `try_recv`.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Completion>) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(250);

        let result = loop {
            if let Err(e) = terminal.draw(|frame| self.render(frame)) {
                break Err(e);
            }

            match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => self.handle_key(key),
                    Ok(_) => {}
                    Err(e) => break Err(e),
                },
                Ok(false) => {}
                Err(e) => break Err(e),
            }

            // Drain any finished jobs (non-blocking).
            loop {
                match rx.try_recv() {
                    Ok(completion) => self.on_completion(completion),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        self.should_quit = true;
                        break;
                    }
                }
            }

            if self.should_quit {
                break Ok(());
            }
        };

        // Restore terminal state unconditionally.
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    /// Start loading `path`.
    pub fn open(&mut self, path: &Path) {
        if let Err(e) = self.session.request_load(path) {
            self.session.report_error(&e);
        }
    }

    /// Request a report for the current parameters.
    ///
    /// While a job is running the request is remembered and sent once the
    /// worker is idle again.
    pub fn analyze(&mut self) {
        if self.session.canonical().is_none() {
            return;
        }
        if self.session.is_busy() {
            self.rerun = true;
            return;
        }
        let range = match self.effective_range() {
            Ok(range) => range,
            Err(e) => {
                self.session.report_error(&e);
                return;
            }
        };
        let request = AnalysisRequest {
            range,
            kind: self.kind,
            top_n: self.top_n,
        };
        if let Err(e) = self.session.request_analysis(request) {
            tracing::debug!(error = %e, "analysis request rejected");
        }
    }

    /// The explicit bounds, each defaulting to the edge of the data span.
    pub fn effective_range(&self) -> Result<DateRange, CdrError> {
        let data = self.session.data_range();
        let start = self
            .start
            .or(data.map(|r| r.start()))
            .ok_or_else(|| CdrError::NoData("No dates in the loaded data".to_string()))?;
        let end = self
            .end
            .or(data.map(|r| r.end()))
            .ok_or_else(|| CdrError::NoData("No dates in the loaded data".to_string()))?;
        DateRange::new(start, end)
    }

    /// Apply a worker completion and react to what changed.
    pub fn on_completion(&mut self, completion: Completion) {
        match self.session.apply(completion) {
            Some(SessionEvent::TableLoaded) => {
                self.screen = Screen::Mapping;
                self.selected_role = 0;
                self.rerun = false;
            }
            Some(SessionEvent::ReportReady) => self.screen = Screen::Results,
            Some(SessionEvent::Failed) | None => {}
        }

        if self.rerun && !self.session.is_busy() {
            self.rerun = false;
            self.analyze();
        }
    }

    fn confirm_mapping(&mut self) {
        if self.session.confirm_mapping().is_ok() {
            self.screen = Screen::Results;
            self.analyze();
        }
    }

    fn export_table(&mut self, path: &Path) {
        // The session records the outcome in its status line.
        let _ = self.session.export_table(path);
    }

    fn export_chart(&mut self, path: &Path) {
        let result = match self.session.report() {
            Some(report) => export_chart(report, path),
            None => Err(CdrError::NoData("No report to export".to_string())),
        };
        self.session.note_export(path, &result);
    }

    // ── Keys ──────────────────────────────────────────────────────────────────

    /// Handle one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if let Some(prompt) = self.prompt {
            self.handle_prompt_key(prompt, key.code);
            return;
        }

        match (self.screen, key.code) {
            (_, KeyCode::Char('q')) | (_, KeyCode::Char('Q')) => self.should_quit = true,
            (_, KeyCode::Char('o')) => self.start_prompt(Prompt::Open),

            (Screen::Mapping, KeyCode::Up) => {
                self.selected_role = self.selected_role.saturating_sub(1);
            }
            (Screen::Mapping, KeyCode::Down) => {
                self.selected_role = (self.selected_role + 1).min(Role::ALL.len() - 1);
            }
            (Screen::Mapping, KeyCode::Left) => {
                self.session.cycle_mapping(Role::ALL[self.selected_role], false);
            }
            (Screen::Mapping, KeyCode::Right) => {
                self.session.cycle_mapping(Role::ALL[self.selected_role], true);
            }
            (Screen::Mapping, KeyCode::Enter) => self.confirm_mapping(),
            (Screen::Mapping, KeyCode::Esc) => {
                if self.session.canonical().is_some() {
                    self.screen = Screen::Results;
                }
            }

            (Screen::Results, KeyCode::Char('a')) => self.analyze(),
            (Screen::Results, KeyCode::Char('m')) => {
                if self.session.table().is_some() {
                    self.screen = Screen::Mapping;
                }
            }
            (Screen::Results, KeyCode::Char('k')) => {
                self.kind = self.kind.next(self.location);
                self.analyze();
            }
            (Screen::Results, KeyCode::Char('l')) => {
                self.location = self.location.next();
                self.kind = ReportKind::Location(self.location);
                self.analyze();
            }
            (Screen::Results, KeyCode::Char('+')) | (Screen::Results, KeyCode::Char('=')) => {
                self.top_n = (self.top_n + 1).min(MAX_TOP_N);
                self.analyze();
            }
            (Screen::Results, KeyCode::Char('-')) => {
                self.top_n = self.top_n.saturating_sub(1).max(1);
                self.analyze();
            }
            (Screen::Results, KeyCode::Char('s')) => self.start_prompt(Prompt::StartDate),
            (Screen::Results, KeyCode::Char('e')) => self.start_prompt(Prompt::EndDate),
            (Screen::Results, KeyCode::Char('x')) => self.start_prompt(Prompt::ExportTable),
            (Screen::Results, KeyCode::Char('c')) => self.start_prompt(Prompt::ExportChart),
            _ => {}
        }
    }

    fn start_prompt(&mut self, prompt: Prompt) {
        self.input = match (prompt, self.effective_range()) {
            (Prompt::StartDate, Ok(range)) => range.start().format("%Y-%m-%d").to_string(),
            (Prompt::EndDate, Ok(range)) => range.end().format("%Y-%m-%d").to_string(),
            _ => String::new(),
        };
        self.prompt = Some(prompt);
    }

    fn handle_prompt_key(&mut self, prompt: Prompt, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.prompt = None;
                self.input.clear();
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Enter => {
                self.prompt = None;
                let value = std::mem::take(&mut self.input);
                self.submit_prompt(prompt, value.trim());
            }
            _ => {}
        }
    }

    fn submit_prompt(&mut self, prompt: Prompt, value: &str) {
        if value.is_empty() {
            return;
        }
        match prompt {
            Prompt::Open => self.open(Path::new(value)),
            Prompt::ExportTable => self.export_table(Path::new(value)),
            Prompt::ExportChart => self.export_chart(Path::new(value)),
            Prompt::StartDate | Prompt::EndDate => match parse_cli_date(value) {
                Ok(date) => {
                    if prompt == Prompt::StartDate {
                        self.start = Some(date);
                    } else {
                        self.end = Some(date);
                    }
                    self.analyze();
                }
                Err(reason) => self.session.report_error(&CdrError::Other(anyhow::anyhow!(reason))),
            },
        }
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    /// Render the current application state into `frame`.
    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let keys = if self.prompt.is_some() {
            PROMPT_KEYS
        } else {
            match self.screen {
                Screen::Open => OPEN_KEYS,
                Screen::Mapping => MAPPING_KEYS,
                Screen::Results => RESULTS_KEYS,
            }
        };
        let status = StatusBar::new(self.session.status(), keys, &self.theme);
        let prompt_height = if self.prompt.is_some() { 1 } else { 0 };

        let [header_area, body, prompt_area, status_area] = Layout::vertical([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(prompt_height),
            Constraint::Length(status.height()),
        ])
        .areas(area);

        let file = self
            .session
            .path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned());
        let span = self.session.data_range().map(|r| {
            format!(
                "{} to {}",
                r.start().format("%Y-%m-%d"),
                r.end().format("%Y-%m-%d")
            )
        });
        let header = Header::new(file.as_deref(), span, &self.theme);
        frame.render_widget(Paragraph::new(Text::from(header.to_lines())), header_area);

        match self.screen {
            Screen::Open => self.render_welcome(frame, body),
            Screen::Mapping => match self.session.table() {
                Some(table) => mapping_view::render_mapping_view(
                    frame,
                    body,
                    table,
                    self.session.draft(),
                    self.selected_role,
                    &self.theme,
                ),
                None => self.render_welcome(frame, body),
            },
            Screen::Results => match self.session.outcome() {
                Some(outcome) => {
                    let summary = ResultsSummary {
                        range: outcome.range,
                        filtered_count: outcome.filtered_count,
                        total_count: outcome.total_count,
                    };
                    results_view::render_results_view(
                        frame,
                        body,
                        &outcome.report,
                        &summary,
                        &self.theme,
                    );
                }
                None => results_view::render_no_report(frame, body, &self.theme),
            },
        }

        if let Some(prompt) = self.prompt {
            let line = Line::from(vec![
                Span::styled(format!("{}: ", prompt.label()), self.theme.label),
                Span::styled(self.input.clone(), self.theme.value),
                Span::styled("_", self.theme.dim),
            ]);
            frame.render_widget(Paragraph::new(line), prompt_area);
        }

        frame.render_widget(Paragraph::new(Text::from(status.to_lines())), status_area);
    }

    fn render_welcome(&self, frame: &mut Frame, area: Rect) {
        let text = vec![
            Line::from(""),
            Line::from(Span::styled("No file loaded", self.theme.warning)),
            Line::from(""),
            Line::from(Span::styled(
                "Press 'o' and enter the path of a CSV or Excel CDR export.",
                self.theme.dim,
            )),
            Line::from(Span::styled("Press 'q' or Ctrl+C to exit", self.theme.dim)),
        ];
        frame.render_widget(
            Paragraph::new(Text::from(text)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" CDR Analyzer "),
            ),
            area,
        );
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

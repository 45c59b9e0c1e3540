//! Session controller.
//!
//! Owns the loaded table, the mapping draft, the canonical set and the latest
//! analysis outcome. It is the only place that state changes: requests go out
//! to the [`crate::worker`] and the foreground hands finished jobs back through
//! [`Session::apply`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cdr_core::error::{CdrError, Result};
use cdr_core::formatting::{format_count, format_span};
use cdr_core::models::{AnalysisRequest, DateRange, DraftMapping, RawTable, Report, Role};
use cdr_data::analysis::{full_range, AnalysisOutcome};
use cdr_data::canonical::{canonicalize, CanonicalSet};
use cdr_data::export::export_report;
use cdr_data::mapper::{apply_overrides, cycle_column, propose, validate};
use tracing::{debug, info, warn};

use crate::worker::{Completion, Job, JobId, JobOutput, WorkerClient};

// ── Status ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Busy,
    Warning,
    Error,
}

/// The latest user-facing status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
    /// Remediation text shown under an error.
    pub hint: Option<&'static str>,
}

impl StatusLine {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            message: message.into(),
            hint: None,
        }
    }

    fn busy(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Busy,
            message: message.into(),
            hint: None,
        }
    }

    fn from_error(err: &CdrError) -> Self {
        Self {
            level: if err.is_fatal() {
                StatusLevel::Error
            } else {
                StatusLevel::Warning
            },
            message: err.to_string(),
            hint: err.hint(),
        }
    }
}

/// What applying a completion changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A table was loaded; the mapping draft needs confirming.
    TableLoaded,
    /// A new report is available.
    ReportReady,
    /// The job failed; details are in [`Session::status`].
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Load,
    Analyze,
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct Session {
    client: WorkerClient,
    next_id: JobId,
    pending: Option<(JobId, PendingKind)>,
    /// Column assignments from the command line, laid over every proposal.
    overrides: DraftMapping,
    path: Option<PathBuf>,
    table: Option<Arc<RawTable>>,
    draft: DraftMapping,
    canonical: Option<Arc<CanonicalSet>>,
    outcome: Option<AnalysisOutcome>,
    status: StatusLine,
}

impl Session {
    pub fn new(client: WorkerClient, overrides: DraftMapping) -> Self {
        Self {
            client,
            next_id: 1,
            pending: None,
            overrides,
            path: None,
            table: None,
            draft: DraftMapping::new(),
            canonical: None,
            outcome: None,
            status: StatusLine::info("Ready"),
        }
    }

    // ── Requests ──────────────────────────────────────────────────────────────

    /// Queue a file load. Rejected with [`CdrError::Busy`] while a job is
    /// outstanding.
    pub fn request_load(&mut self, path: &Path) -> Result<JobId> {
        let id = self.submit(
            Job::Load {
                path: path.to_path_buf(),
            },
            PendingKind::Load,
        )?;
        self.status = StatusLine::busy(format!("Loading {}...", path.display()));
        Ok(id)
    }

    /// Queue an analysis of the confirmed data.
    pub fn request_analysis(&mut self, request: AnalysisRequest) -> Result<JobId> {
        let Some(set) = self.canonical.clone() else {
            let err = CdrError::NoData(
                "Load a file and confirm the column mapping first".to_string(),
            );
            self.status = StatusLine::from_error(&err);
            return Err(err);
        };
        let id = self.submit(Job::Analyze { set, request }, PendingKind::Analyze)?;
        self.status = StatusLine::busy(format!("Running {}...", request.kind.label()));
        Ok(id)
    }

    fn submit(&mut self, job: Job, kind: PendingKind) -> Result<JobId> {
        if self.pending.is_some() {
            self.status = StatusLine::from_error(&CdrError::Busy);
            return Err(CdrError::Busy);
        }
        let id = self.next_id;
        self.client.submit(id, job)?;
        self.next_id += 1;
        self.pending = Some((id, kind));
        Ok(id)
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    // ── Completions ───────────────────────────────────────────────────────────

    /// Apply a finished job. Completions for anything but the outstanding job
    /// are ignored and return `None`.
    pub fn apply(&mut self, completion: Completion) -> Option<SessionEvent> {
        match self.pending {
            Some((id, _)) if id == completion.id => {}
            _ => {
                debug!(id = completion.id, "ignoring stale completion");
                return None;
            }
        }
        let kind = self.pending.take().map(|(_, k)| k);

        match completion.result {
            Ok(JobOutput::Loaded { path, table }) => {
                self.on_loaded(path, table);
                Some(SessionEvent::TableLoaded)
            }
            Ok(JobOutput::Analyzed(outcome)) => {
                self.status = StatusLine::info(format!(
                    "{}: {} of {} records",
                    outcome.report.title(),
                    format_count(outcome.filtered_count as u64),
                    format_count(outcome.total_count as u64)
                ));
                self.outcome = Some(outcome);
                Some(SessionEvent::ReportReady)
            }
            Err(err) => {
                warn!(error = %err, "job failed");
                if kind == Some(PendingKind::Analyze) {
                    self.outcome = None;
                }
                self.status = StatusLine::from_error(&err);
                Some(SessionEvent::Failed)
            }
        }
    }

    fn on_loaded(&mut self, path: PathBuf, table: Arc<RawTable>) {
        let proposal = propose(&table.column_names());
        self.draft = apply_overrides(proposal, &self.overrides);
        self.status = StatusLine::info(format!(
            "Loaded {} rows from {}",
            format_count(table.row_count() as u64),
            path.display()
        ));
        info!(
            rows = table.row_count(),
            columns = table.column_count(),
            "Table ready for mapping"
        );
        self.path = Some(path);
        self.table = Some(table);
        self.canonical = None;
        self.outcome = None;
    }

    // ── Mapping ───────────────────────────────────────────────────────────────

    pub fn draft(&self) -> &DraftMapping {
        &self.draft
    }

    /// Step `role` to the next (or previous) column of the loaded table.
    pub fn cycle_mapping(&mut self, role: Role, forward: bool) {
        if let Some(table) = &self.table {
            cycle_column(&mut self.draft, role, &table.column_names(), forward);
        }
    }

    /// Validate the draft and parse every row's timestamp.
    ///
    /// On success the canonical set replaces any previous one and the
    /// previous report is discarded.
    pub fn confirm_mapping(&mut self) -> Result<()> {
        let result = self.build_canonical();
        match &result {
            Ok(()) => {}
            Err(err) => self.status = StatusLine::from_error(err),
        }
        result
    }

    fn build_canonical(&mut self) -> Result<()> {
        let table = self
            .table
            .clone()
            .ok_or_else(|| CdrError::NoData("No file loaded".to_string()))?;
        let mapping = validate(&self.draft, &table)?;
        let set = canonicalize(table, mapping)?;

        let mut message = format!("{} records ready", format_count(set.len() as u64));
        if let Some((min, max)) = set.span() {
            message.push_str(&format!(" ({})", format_span(min, max)));
        }
        if set.unparseable() > 0 {
            message.push_str(&format!(
                ", {} rows with unreadable dates skipped",
                format_count(set.unparseable() as u64)
            ));
        }
        self.status = StatusLine::info(message);
        self.canonical = Some(Arc::new(set));
        self.outcome = None;
        Ok(())
    }

    // ── Export ────────────────────────────────────────────────────────────────

    /// Write the current report table to `path`.
    pub fn export_table(&mut self, path: &Path) -> Result<()> {
        let result = match self.report() {
            Some(report) => export_report(report, path),
            None => Err(CdrError::NoData("No report to export".to_string())),
        };
        self.status = match &result {
            Ok(()) => StatusLine::info(format!("Exported table to {}", path.display())),
            Err(err) => StatusLine::from_error(err),
        };
        result
    }

    /// Record the outcome of an export done elsewhere (charts).
    pub fn note_export(&mut self, path: &Path, result: &Result<()>) {
        self.status = match result {
            Ok(()) => StatusLine::info(format!("Exported chart to {}", path.display())),
            Err(err) => StatusLine::from_error(err),
        };
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn table(&self) -> Option<&RawTable> {
        self.table.as_deref()
    }

    pub fn canonical(&self) -> Option<&CanonicalSet> {
        self.canonical.as_deref()
    }

    pub fn outcome(&self) -> Option<&AnalysisOutcome> {
        self.outcome.as_ref()
    }

    pub fn report(&self) -> Option<&Report> {
        self.outcome.as_ref().map(|o| &o.report)
    }

    /// The range spanning all parsed dates of the confirmed data.
    pub fn data_range(&self) -> Option<DateRange> {
        self.canonical.as_deref().and_then(full_range)
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = StatusLine::info(message);
    }

    /// Show `err` in the status line.
    pub fn report_error(&mut self, err: &CdrError) {
        self.status = StatusLine::from_error(err);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

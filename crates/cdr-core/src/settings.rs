use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::models::{DraftMapping, ReportKind, Role};
use crate::time_utils::parse_cli_date;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Call-detail-record analysis: location, called-number and daily volume reports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cdr-analyzer",
    about = "Call-detail-record analysis: location, called-number and daily volume reports",
    version
)]
pub struct Settings {
    /// CDR file to load (.csv, .txt, .xlsx, .xls, .ods)
    pub file: Option<PathBuf>,

    /// View mode
    #[arg(long, default_value = "tui", value_parser = ["tui", "report"])]
    pub view: String,

    /// First day of the analysed range (YYYY-MM-DD); defaults to the earliest date in the file
    #[arg(long, value_parser = parse_cli_date)]
    pub start: Option<NaiveDate>,

    /// Last day of the analysed range (YYYY-MM-DD, inclusive); defaults to the latest date in the file
    #[arg(long, value_parser = parse_cli_date)]
    pub end: Option<NaiveDate>,

    /// Analysis type
    #[arg(long, default_value = "location", value_parser = ["location", "numbers", "date"])]
    pub analysis: String,

    /// Location column used by the location analysis
    #[arg(long, default_value = "main", value_parser = ["main", "sub", "cell"])]
    pub location: String,

    /// Number of top results for location and number reports (1-500)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=500))]
    pub top_n: u32,

    /// Column holding the call date
    #[arg(long)]
    pub date_col: Option<String>,

    /// Column holding the call time
    #[arg(long)]
    pub time_col: Option<String>,

    /// Column holding the called (B party) number
    #[arg(long)]
    pub number_col: Option<String>,

    /// Column holding the main location
    #[arg(long)]
    pub main_loc_col: Option<String>,

    /// Column holding the sub location
    #[arg(long)]
    pub sub_loc_col: Option<String>,

    /// Column holding the cell ID or address
    #[arg(long)]
    pub cell_col: Option<String>,

    /// Write the report table here (.csv, .xlsx or .json)
    #[arg(long)]
    pub export_table: Option<PathBuf>,

    /// Write the report chart here (.png or .svg)
    #[arg(long)]
    pub export_chart: Option<PathBuf>,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "classic", "auto"])]
    pub theme: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and resolve derived values.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] but from an explicit argument list, so
    /// tests can drive it without spawning subprocesses.
    pub fn try_load_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::try_parse_from(args).map(Self::resolve)
    }

    /// `--debug` overrides the log level.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The report kind selected by `--analysis` and `--location`.
    pub fn report_kind(&self) -> ReportKind {
        // Both flags are restricted by clap's value parsers.
        ReportKind::from_cli(&self.analysis, &self.location).unwrap_or(ReportKind::Numbers)
    }

    /// Column overrides given on the command line, as a partial mapping.
    pub fn column_overrides(&self) -> DraftMapping {
        let mut draft = DraftMapping::new();
        let pairs = [
            (Role::Date, &self.date_col),
            (Role::Time, &self.time_col),
            (Role::CalledNumber, &self.number_col),
            (Role::MainLocation, &self.main_loc_col),
            (Role::SubLocation, &self.sub_loc_col),
            (Role::CellId, &self.cell_col),
        ];
        for (role, column) in pairs {
            if column.is_some() {
                draft.set(role, column.clone());
            }
        }
        draft
    }

    pub fn top_n(&self) -> usize {
        self.top_n as usize
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

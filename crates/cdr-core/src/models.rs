use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{CdrError, Result};

// ── Role ──────────────────────────────────────────────────────────────────────

/// A semantic field slot that must be bound to a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Date,
    Time,
    CalledNumber,
    MainLocation,
    SubLocation,
    CellId,
}

impl Role {
    /// Every role in display order.
    pub const ALL: [Role; 6] = [
        Role::Date,
        Role::Time,
        Role::CalledNumber,
        Role::MainLocation,
        Role::SubLocation,
        Role::CellId,
    ];

    /// `true` for date, called number and main location.
    pub fn is_required(self) -> bool {
        matches!(self, Role::Date | Role::CalledNumber | Role::MainLocation)
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Role::Date => "Date",
            Role::Time => "Time",
            Role::CalledNumber => "Phone Number (B Party)",
            Role::MainLocation => "Main Location",
            Role::SubLocation => "Sub Location",
            Role::CellId => "Cell ID/Address",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── RawTable ──────────────────────────────────────────────────────────────────

/// One named column of untyped cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub values: Vec<String>,
}

/// A file's contents held in memory, column-major.
///
/// Every column has exactly [`RawTable::row_count`] values and column names
/// are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    columns: Vec<Column>,
    row_count: usize,
}

impl RawTable {
    /// Build a table from a header row and row-major data.
    ///
    /// Blank headers become `Unnamed: <i>` and repeated headers get a `.1`,
    /// `.2`, ... suffix. Short rows are padded with empty cells; cells past
    /// the last header are dropped.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let names = unique_column_names(headers);
        let row_count = rows.len();

        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(row_count),
            })
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or_default());
            }
        }

        Self { columns, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell text at (`row`, `column`); empty when out of bounds.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.columns
            .get(column)
            .and_then(|c| c.values.get(row))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The first `n` rows, row-major.
    pub fn preview(&self, n: usize) -> Vec<Vec<&str>> {
        (0..self.row_count.min(n))
            .map(|row| {
                (0..self.columns.len())
                    .map(|col| self.cell(row, col))
                    .collect()
            })
            .collect()
    }
}

fn unique_column_names(headers: Vec<String>) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut names = Vec::with_capacity(headers.len());

    for (i, header) in headers.into_iter().enumerate() {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            trimmed.to_string()
        };

        let mut name = base.clone();
        let mut n = seen.get(&base).copied().unwrap_or(0);
        while names.contains(&name) {
            n += 1;
            name = format!("{}.{}", base, n);
        }
        seen.insert(base, n);
        names.push(name);
    }

    names
}

// ── Mappings ──────────────────────────────────────────────────────────────────

/// A role-to-column assignment that has not been validated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftMapping {
    slots: BTreeMap<Role, String>,
}

impl DraftMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.slots.get(&role).map(String::as_str)
    }

    /// Assign `column` to `role`, or clear the role when `None` or blank.
    pub fn set(&mut self, role: Role, column: Option<String>) {
        match column {
            Some(c) if !c.trim().is_empty() => {
                self.slots.insert(role, c);
            }
            _ => {
                self.slots.remove(&role);
            }
        }
    }

    pub fn is_mapped(&self, role: Role) -> bool {
        self.slots.contains_key(&role)
    }
}

/// A validated mapping: required roles are present and every column exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub date: String,
    pub time: Option<String>,
    pub called_number: String,
    pub main_location: String,
    pub sub_location: Option<String>,
    pub cell_id: Option<String>,
}

impl ColumnMapping {
    /// Column bound to `role`, if any.
    pub fn column_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Date => Some(&self.date),
            Role::Time => self.time.as_deref(),
            Role::CalledNumber => Some(&self.called_number),
            Role::MainLocation => Some(&self.main_location),
            Role::SubLocation => self.sub_location.as_deref(),
            Role::CellId => self.cell_id.as_deref(),
        }
    }
}

// ── Canonical records ─────────────────────────────────────────────────────────

/// A source row plus the timestamp derived from its date/time cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalRecord {
    /// Row index into the originating [`RawTable`].
    pub row: usize,
    /// `None` when the date/time cells could not be parsed.
    pub timestamp: Option<NaiveDateTime>,
}

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(CdrError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// `true` when the calendar date of `ts` falls inside the range.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let date = ts.date();
        date >= self.start && date <= self.end
    }
}

// ── Report kinds ──────────────────────────────────────────────────────────────

/// Which location column a location report groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Main,
    Sub,
    Cell,
}

impl LocationKind {
    pub fn role(self) -> Role {
        match self {
            LocationKind::Main => Role::MainLocation,
            LocationKind::Sub => Role::SubLocation,
            LocationKind::Cell => Role::CellId,
        }
    }

    /// Cycle main → sub → cell → main.
    pub fn next(self) -> Self {
        match self {
            LocationKind::Main => LocationKind::Sub,
            LocationKind::Sub => LocationKind::Cell,
            LocationKind::Cell => LocationKind::Main,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LocationKind::Main => "Main City",
            LocationKind::Sub => "Sub City",
            LocationKind::Cell => "Cell ID",
        }
    }
}

impl FromStr for LocationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "main_city" => Ok(LocationKind::Main),
            "sub" | "sub_city" => Ok(LocationKind::Sub),
            "cell" | "cell_id" => Ok(LocationKind::Cell),
            other => Err(format!("unknown location type: {}", other)),
        }
    }
}

/// The analysis to run over a filtered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Location(LocationKind),
    Numbers,
    DateVolume,
}

impl ReportKind {
    /// Parse the `--analysis` / `--location` CLI pair.
    pub fn from_cli(analysis: &str, location: &str) -> std::result::Result<Self, String> {
        match analysis.to_lowercase().as_str() {
            "location" => Ok(ReportKind::Location(location.parse()?)),
            "numbers" => Ok(ReportKind::Numbers),
            "date" => Ok(ReportKind::DateVolume),
            other => Err(format!("unknown analysis type: {}", other)),
        }
    }

    /// Cycle location → numbers → date → location.
    pub fn next(self, location: LocationKind) -> Self {
        match self {
            ReportKind::Location(_) => ReportKind::Numbers,
            ReportKind::Numbers => ReportKind::DateVolume,
            ReportKind::DateVolume => ReportKind::Location(location),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportKind::Location(_) => "Location Analysis",
            ReportKind::Numbers => "Called Numbers",
            ReportKind::DateVolume => "Call Volume by Date",
        }
    }
}

/// Parameters for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub range: DateRange,
    pub kind: ReportKind,
    pub top_n: usize,
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Key used for rows whose grouping cell is blank.
pub const BLANK_KEY_LABEL: &str = "(blank)";

/// Result of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Counts per location value, descending, at most `top_n` rows.
    Location {
        subtype: LocationKind,
        top_n: usize,
        rows: Vec<(String, u64)>,
    },
    /// Counts per called number, descending, at most `top_n` rows.
    Numbers {
        top_n: usize,
        rows: Vec<(String, u64)>,
    },
    /// Counts per calendar date, ascending.
    DateVolume { rows: Vec<(NaiveDate, u64)> },
}

/// One flattened `(key, count)` pair of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub key: String,
    pub count: u64,
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::Location { subtype, .. } => ReportKind::Location(*subtype),
            Report::Numbers { .. } => ReportKind::Numbers,
            Report::DateVolume { .. } => ReportKind::DateVolume,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Report::Location { top_n, .. } => format!("Top {} Common Locations", top_n),
            Report::Numbers { top_n, .. } => format!("Top {} Most Called Numbers", top_n),
            Report::DateVolume { .. } => "Call Volume by Date".to_string(),
        }
    }

    /// Header of the key column in tables and exports.
    pub fn key_header(&self) -> &'static str {
        match self {
            Report::Location { .. } => "Location",
            Report::Numbers { .. } => "Phone Number",
            Report::DateVolume { .. } => "Date",
        }
    }

    /// Header of the count column in tables and exports.
    pub fn count_header(&self) -> &'static str {
        match self {
            Report::DateVolume { .. } => "Call Count",
            _ => "Count",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Report::Location { rows, .. } | Report::Numbers { rows, .. } => rows.len(),
            Report::DateVolume { rows } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows with keys rendered as text (`YYYY-MM-DD` for dates).
    pub fn rows(&self) -> Vec<ReportRow> {
        match self {
            Report::Location { rows, .. } | Report::Numbers { rows, .. } => rows
                .iter()
                .map(|(key, count)| ReportRow {
                    key: key.clone(),
                    count: *count,
                })
                .collect(),
            Report::DateVolume { rows } => rows
                .iter()
                .map(|(date, count)| ReportRow {
                    key: date.format("%Y-%m-%d").to_string(),
                    count: *count,
                })
                .collect(),
        }
    }

    /// Sum of the counts of the rows kept in the report.
    pub fn total_count(&self) -> u64 {
        self.rows().iter().map(|r| r.count).sum()
    }
}

/// Display form of a report key; blank keys become [`BLANK_KEY_LABEL`].
pub fn display_key(key: &str) -> &str {
    if key.trim().is_empty() {
        BLANK_KEY_LABEL
    } else {
        key
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn date(v: &str) -> NaiveDate {
        NaiveDate::parse_from_str(v, "%Y-%m-%d").unwrap()
    }

    // ── RawTable ──────────────────────────────────────────────────────────────

    #[test]
    fn test_raw_table_pads_short_rows() {
        let table = RawTable::new(
            vec![s("a"), s("b"), s("c")],
            vec![vec![s("1"), s("2"), s("3")], vec![s("4")]],
        );
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.cell(1, 0), "4");
        assert_eq!(table.cell(1, 2), "");
        assert!(table.columns().iter().all(|c| c.values.len() == 2));
    }

    #[test]
    fn test_raw_table_deduplicates_headers() {
        let table = RawTable::new(vec![s("City"), s("City"), s(""), s("City")], vec![]);
        assert_eq!(
            table.column_names(),
            vec!["City", "City.1", "Unnamed: 2", "City.2"]
        );
    }

    #[test]
    fn test_raw_table_trims_headers() {
        let table = RawTable::new(vec![s("  Call Date ")], vec![vec![s("x")]]);
        assert_eq!(table.column_index("Call Date"), Some(0));
    }

    #[test]
    fn test_raw_table_preview_limits_rows() {
        let rows = (0..10).map(|i| vec![i.to_string()]).collect();
        let table = RawTable::new(vec![s("n")], rows);
        let preview = table.preview(5);
        assert_eq!(preview.len(), 5);
        assert_eq!(preview[4], vec!["4"]);
    }

    #[test]
    fn test_raw_table_cell_out_of_bounds_is_empty() {
        let table = RawTable::new(vec![s("a")], vec![vec![s("1")]]);
        assert_eq!(table.cell(5, 0), "");
        assert_eq!(table.cell(0, 5), "");
    }

    // ── DraftMapping ──────────────────────────────────────────────────────────

    #[test]
    fn test_draft_mapping_set_and_clear() {
        let mut draft = DraftMapping::new();
        draft.set(Role::Date, Some(s("Call Date")));
        assert_eq!(draft.get(Role::Date), Some("Call Date"));

        draft.set(Role::Date, Some(s("  ")));
        assert!(!draft.is_mapped(Role::Date));

        draft.set(Role::Time, Some(s("Call Time")));
        draft.set(Role::Time, None);
        assert_eq!(draft.get(Role::Time), None);
    }

    #[test]
    fn test_role_required_set() {
        let required: Vec<Role> = Role::ALL.into_iter().filter(|r| r.is_required()).collect();
        assert_eq!(
            required,
            vec![Role::Date, Role::CalledNumber, Role::MainLocation]
        );
    }

    // ── DateRange ─────────────────────────────────────────────────────────────

    #[test]
    fn test_date_range_inclusive_of_whole_end_day() {
        let range = DateRange::new(date("2024-03-01"), date("2024-03-02")).unwrap();
        assert!(range.contains(date("2024-03-01").and_hms_opt(0, 0, 0).unwrap()));
        assert!(range.contains(date("2024-03-02").and_hms_opt(23, 59, 59).unwrap()));
        assert!(!range.contains(date("2024-03-03").and_hms_opt(0, 0, 0).unwrap()));
        assert!(!range.contains(date("2024-02-29").and_hms_opt(23, 59, 59).unwrap()));
    }

    #[test]
    fn test_date_range_rejects_reversed_bounds() {
        let err = DateRange::new(date("2024-03-05"), date("2024-03-01")).unwrap_err();
        assert!(matches!(err, CdrError::InvalidDateRange { .. }));
    }

    // ── ReportKind ────────────────────────────────────────────────────────────

    #[test]
    fn test_report_kind_from_cli() {
        assert_eq!(
            ReportKind::from_cli("location", "sub").unwrap(),
            ReportKind::Location(LocationKind::Sub)
        );
        assert_eq!(
            ReportKind::from_cli("numbers", "main").unwrap(),
            ReportKind::Numbers
        );
        assert_eq!(
            ReportKind::from_cli("date", "main").unwrap(),
            ReportKind::DateVolume
        );
        assert!(ReportKind::from_cli("heatmap", "main").is_err());
        assert!(ReportKind::from_cli("location", "region").is_err());
    }

    #[test]
    fn test_report_kind_cycles() {
        let kind = ReportKind::Location(LocationKind::Cell);
        let kind = kind.next(LocationKind::Cell);
        assert_eq!(kind, ReportKind::Numbers);
        let kind = kind.next(LocationKind::Cell);
        assert_eq!(kind, ReportKind::DateVolume);
        assert_eq!(
            kind.next(LocationKind::Cell),
            ReportKind::Location(LocationKind::Cell)
        );
    }

    // ── Report ────────────────────────────────────────────────────────────────

    #[test]
    fn test_report_titles_and_headers() {
        let loc = Report::Location {
            subtype: LocationKind::Main,
            top_n: 10,
            rows: vec![],
        };
        assert_eq!(loc.title(), "Top 10 Common Locations");
        assert_eq!(loc.key_header(), "Location");
        assert_eq!(loc.count_header(), "Count");

        let num = Report::Numbers {
            top_n: 5,
            rows: vec![],
        };
        assert_eq!(num.title(), "Top 5 Most Called Numbers");
        assert_eq!(num.key_header(), "Phone Number");

        let vol = Report::DateVolume { rows: vec![] };
        assert_eq!(vol.title(), "Call Volume by Date");
        assert_eq!(vol.count_header(), "Call Count");
        assert!(vol.is_empty());
    }

    #[test]
    fn test_report_rows_format_dates() {
        let report = Report::DateVolume {
            rows: vec![(date("2024-03-01"), 4), (date("2024-03-02"), 1)],
        };
        let rows = report.rows();
        assert_eq!(rows[0].key, "2024-03-01");
        assert_eq!(rows[0].count, 4);
        assert_eq!(report.total_count(), 5);
        assert_eq!(report.kind(), ReportKind::DateVolume);
    }

    #[test]
    fn test_display_key_blank() {
        assert_eq!(display_key(""), BLANK_KEY_LABEL);
        assert_eq!(display_key("Lagos"), "Lagos");
    }
}

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::models::Role;

/// Failures while reading a CDR file into a [`crate::models::RawTable`].
#[derive(Error, Debug)]
pub enum LoadError {
    /// The selected path does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// The file has zero bytes, or parsed into a table with no data rows.
    #[error("The file appears to be empty: {0}")]
    EmptyFile(PathBuf),

    /// The file could not be read or its contents could not be parsed.
    #[error("Failed to read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// No candidate text encoding produced a parseable table.
    #[error("Could not decode {0} with any standard encoding")]
    UnsupportedEncoding(PathBuf),
}

/// Failures while validating a column mapping.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MappingError {
    /// One or more required roles have no column assigned.
    #[error("Required columns are not mapped: {}", join_roles(.0))]
    MissingRequired(Vec<Role>),

    /// A role was mapped to a column the table does not contain.
    #[error("Column \"{column}\" mapped to {role} does not exist")]
    UnknownColumn { role: Role, column: String },
}

/// All errors produced by the CDR analyzer.
#[derive(Error, Debug)]
pub enum CdrError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// No row produced a timestamp; the date column or its format is wrong.
    #[error("Could not parse dates in any of {rows} rows. Please check the date format in your file.")]
    AllDatesUnparseable { rows: usize },

    /// The requested range holds no records. Carries the span actually present.
    #[error("No data found between {start} and {end}{}", available_suffix(.available))]
    NoDataInRange {
        start: NaiveDate,
        end: NaiveDate,
        available: Option<(NaiveDateTime, NaiveDateTime)>,
    },

    /// `start` is after `end`.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// A location report was requested for an optional role left unmapped.
    #[error("{0} column not mapped")]
    MissingOptionalColumn(Role),

    /// A report table or chart could not be written.
    #[error("Failed to export to {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    /// A load or analysis is already running.
    #[error("Another operation is still running")]
    Busy,

    /// The operation needs state that has not been produced yet.
    #[error("{0}")]
    NoData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CdrError {
    /// `false` for conditions the user fixes by adjusting input, not by
    /// starting over (currently only an empty date range).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CdrError::NoDataInRange { .. })
    }

    /// Remediation text shown under the message, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CdrError::Load(LoadError::Unreadable { .. })
            | CdrError::Load(LoadError::UnsupportedEncoding(_)) => Some(
                "Make sure the file is not open in another program, the format is correct \
                 and the file is not corrupted. Try saving as Excel (.xlsx) if CSV fails.",
            ),
            CdrError::AllDatesUnparseable { .. } => {
                Some("Map a different date column, or add the time column separately.")
            }
            CdrError::NoDataInRange { .. } => Some("Pick a range inside the available dates."),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the analyzer crates.
pub type Result<T> = std::result::Result<T, CdrError>;

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn available_suffix(available: &Option<(NaiveDateTime, NaiveDateTime)>) -> String {
    match available {
        Some((min, max)) => format!(". Available date range: {} to {}", min, max),
        None => String::new(),
    }
}

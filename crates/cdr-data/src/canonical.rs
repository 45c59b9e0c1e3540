//! Turns a mapped [`RawTable`] into timestamped canonical records.

use std::sync::Arc;

use chrono::NaiveDateTime;
use cdr_core::error::{CdrError, Result};
use cdr_core::models::{CanonicalRecord, ColumnMapping, RawTable, Role};
use cdr_core::time_utils::{parse_datetime, parse_date_time_pair};
use tracing::{debug, info};

/// A loaded table, its validated mapping and one record per source row.
#[derive(Debug, Clone)]
pub struct CanonicalSet {
    table: Arc<RawTable>,
    mapping: ColumnMapping,
    /// Column index per role, resolved once from `mapping`.
    indices: [Option<usize>; 6],
    records: Vec<CanonicalRecord>,
    unparseable: usize,
    span: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl CanonicalSet {
    pub fn table(&self) -> &RawTable {
        &self.table
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// All records in source order, including those without a timestamp.
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows whose date/time cells could not be parsed.
    pub fn unparseable(&self) -> usize {
        self.unparseable
    }

    /// Earliest and latest parsed timestamps.
    pub fn span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.span
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.indices[role_slot(role)].is_some()
    }

    /// Cell text of `record` for `role`; `None` when the role is unmapped.
    pub fn value(&self, role: Role, record: &CanonicalRecord) -> Option<&str> {
        self.indices[role_slot(role)].map(|col| self.table.cell(record.row, col))
    }
}

fn role_slot(role: Role) -> usize {
    match role {
        Role::Date => 0,
        Role::Time => 1,
        Role::CalledNumber => 2,
        Role::MainLocation => 3,
        Role::SubLocation => 4,
        Role::CellId => 5,
    }
}

// ── Canonicalization ──────────────────────────────────────────────────────────

/// Parse every row's timestamp.
///
/// Rows that fail to parse get a `None` timestamp. Fails with
/// [`CdrError::AllDatesUnparseable`] when no row parses.
pub fn canonicalize(table: Arc<RawTable>, mapping: ColumnMapping) -> Result<CanonicalSet> {
    let mut indices = [None; 6];
    for role in Role::ALL {
        indices[role_slot(role)] = mapping.column_for(role).and_then(|c| table.column_index(c));
    }

    let date_col = indices[role_slot(Role::Date)].ok_or_else(|| {
        CdrError::NoData(format!("Date column \"{}\" is not in the table", mapping.date))
    })?;
    let time_col = indices[role_slot(Role::Time)];

    let mut records = Vec::with_capacity(table.row_count());
    let mut unparseable = 0usize;
    let mut span: Option<(NaiveDateTime, NaiveDateTime)> = None;

    for row in 0..table.row_count() {
        let date = table.cell(row, date_col);
        let timestamp = match time_col {
            Some(col) => parse_date_time_pair(date, table.cell(row, col)),
            None => parse_datetime(date),
        };

        match timestamp {
            Some(ts) => {
                span = Some(match span {
                    Some((min, max)) => (min.min(ts), max.max(ts)),
                    None => (ts, ts),
                });
            }
            None => unparseable += 1,
        }
        records.push(CanonicalRecord { row, timestamp });
    }

    if span.is_none() {
        return Err(CdrError::AllDatesUnparseable {
            rows: table.row_count(),
        });
    }

    if unparseable > 0 {
        debug!("{} of {} rows have unparseable dates", unparseable, records.len());
    }
    if let Some((min, max)) = span {
        info!(
            rows = records.len(),
            unparseable,
            "Canonicalized records spanning {} to {}",
            min,
            max
        );
    }

    Ok(CanonicalSet {
        table,
        mapping,
        indices,
        records,
        unparseable,
        span,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Arc<RawTable> {
        Arc::new(RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        ))
    }

    fn mapping(time: Option<&str>) -> ColumnMapping {
        ColumnMapping {
            date: "Date".to_string(),
            time: time.map(str::to_string),
            called_number: "Number".to_string(),
            main_location: "City".to_string(),
            sub_location: None,
            cell_id: None,
        }
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_canonicalize_date_only() {
        let t = table(
            &["Date", "Number", "City"],
            &[&["2024-03-01", "A", "X"], &["2024-03-02 08:30:00", "B", "Y"]],
        );
        let set = canonicalize(t, mapping(None)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].timestamp, Some(ts("2024-03-01 00:00:00")));
        assert_eq!(set.records()[1].timestamp, Some(ts("2024-03-02 08:30:00")));
        assert_eq!(
            set.span(),
            Some((ts("2024-03-01 00:00:00"), ts("2024-03-02 08:30:00")))
        );
    }

    #[test]
    fn test_canonicalize_combines_time_column() {
        let t = table(
            &["Date", "Time", "Number", "City"],
            &[&["2024-03-01", "14:05:09", "A", "X"]],
        );
        let set = canonicalize(t, mapping(Some("Time"))).unwrap();
        assert_eq!(set.records()[0].timestamp, Some(ts("2024-03-01 14:05:09")));
    }

    #[test]
    fn test_canonicalize_tolerates_bad_rows() {
        let t = table(
            &["Date", "Number", "City"],
            &[&["garbage", "A", "X"], &["2024-03-01", "B", "Y"], &["", "C", "Z"]],
        );
        let set = canonicalize(t, mapping(None)).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.unparseable(), 2);
        assert!(set.records()[0].timestamp.is_none());
        assert!(set.records()[2].timestamp.is_none());
        assert_eq!(set.records()[2].row, 2);
    }

    #[test]
    fn test_canonicalize_all_unparseable() {
        let t = table(&["Date", "Number", "City"], &[&["n/a", "A", "X"], &["?", "B", "Y"]]);
        let err = canonicalize(t, mapping(None)).unwrap_err();
        assert!(matches!(err, CdrError::AllDatesUnparseable { rows: 2 }));
    }

    #[test]
    fn test_canonicalize_zero_rows_is_all_unparseable() {
        let t = table(&["Date", "Number", "City"], &[]);
        let err = canonicalize(t, mapping(None)).unwrap_err();
        assert!(matches!(err, CdrError::AllDatesUnparseable { rows: 0 }));
    }

    #[test]
    fn test_value_lookup_by_role() {
        let t = table(&["Date", "Number", "City"], &[&["2024-03-01", "A", "X"]]);
        let set = canonicalize(t, mapping(None)).unwrap();
        let record = set.records()[0];
        assert_eq!(set.value(Role::CalledNumber, &record), Some("A"));
        assert_eq!(set.value(Role::MainLocation, &record), Some("X"));
        assert_eq!(set.value(Role::SubLocation, &record), None);
        assert!(!set.has_role(Role::CellId));
    }
}

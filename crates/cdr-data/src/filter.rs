//! Date-range filtering of canonical records.

use cdr_core::models::{CanonicalRecord, DateRange};

/// The records of one analysis run, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredSet {
    range: DateRange,
    records: Vec<CanonicalRecord>,
}

impl FilteredSet {
    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Keep records whose calendar date falls in `range`. Records without a
/// timestamp never pass.
pub fn filter_records(records: &[CanonicalRecord], range: DateRange) -> FilteredSet {
    let records = records
        .iter()
        .filter(|r| r.timestamp.is_some_and(|ts| range.contains(ts)))
        .copied()
        .collect();
    FilteredSet { range, records }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

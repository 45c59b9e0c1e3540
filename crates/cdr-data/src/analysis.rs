//! Analysis pipeline: filter a canonical set by date, then aggregate.
//!
//! Returns an [`AnalysisOutcome`] ready for the presentation layer.

use cdr_core::error::{CdrError, Result};
use cdr_core::models::{AnalysisRequest, DateRange, Report};
use tracing::{debug, info};

use crate::aggregator::CallAggregator;
use crate::canonical::CanonicalSet;
use crate::filter::filter_records;

// ── Public types ──────────────────────────────────────────────────────────────

/// The complete output of [`run_analysis`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub report: Report,
    /// Records inside the requested range.
    pub filtered_count: usize,
    /// Records in the canonical set, parseable or not.
    pub total_count: usize,
    pub range: DateRange,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run one analysis.
///
/// 1. Keep the records inside `request.range`.
/// 2. Fail with [`CdrError::NoDataInRange`] when none remain, carrying the
///    span of the whole set so the user can pick a better range.
/// 3. Aggregate into the requested report.
pub fn run_analysis(set: &CanonicalSet, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let filtered = filter_records(set.records(), request.range);
    debug!(
        "{} of {} records between {} and {}",
        filtered.len(),
        set.len(),
        request.range.start(),
        request.range.end()
    );

    if filtered.is_empty() {
        return Err(CdrError::NoDataInRange {
            start: request.range.start(),
            end: request.range.end(),
            available: set.span(),
        });
    }

    let report = CallAggregator::aggregate(set, &filtered, request.kind, request.top_n)?;
    info!(
        kind = request.kind.label(),
        rows = report.len(),
        "Analysis complete over {} records",
        filtered.len()
    );

    Ok(AnalysisOutcome {
        report,
        filtered_count: filtered.len(),
        total_count: set.len(),
        range: request.range,
    })
}

/// The range covering every parsed timestamp of `set`.
pub fn full_range(set: &CanonicalSet) -> Option<DateRange> {
    let (min, max) = set.span()?;
    DateRange::new(min.date(), max.date()).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Call counting over a filtered record set.
//!
//! Location and number reports are ranked by count and truncated to the
//! requested top N; the date report lists every day in order.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use cdr_core::error::{CdrError, Result};
use cdr_core::models::{LocationKind, Report, ReportKind, Role};
use tracing::debug;

use crate::canonical::CanonicalSet;
use crate::filter::FilteredSet;

// ── CallAggregator ────────────────────────────────────────────────────────────

/// Stateless helper that builds [`Report`]s from a filtered set.
pub struct CallAggregator;

impl CallAggregator {
    /// Build the report of `kind`.
    pub fn aggregate(
        set: &CanonicalSet,
        filtered: &FilteredSet,
        kind: ReportKind,
        top_n: usize,
    ) -> Result<Report> {
        match kind {
            ReportKind::Location(subtype) => Self::location(set, filtered, subtype, top_n),
            ReportKind::Numbers => Ok(Self::numbers(set, filtered, top_n)),
            ReportKind::DateVolume => Ok(Self::date_volume(filtered)),
        }
    }

    /// Most common values of the `subtype` location column.
    ///
    /// Fails with [`CdrError::MissingOptionalColumn`] when that column is not
    /// mapped; there is no fallback to another location column.
    pub fn location(
        set: &CanonicalSet,
        filtered: &FilteredSet,
        subtype: LocationKind,
        top_n: usize,
    ) -> Result<Report> {
        let role = subtype.role();
        if !set.has_role(role) {
            return Err(CdrError::MissingOptionalColumn(role));
        }
        let rows = Self::rank_by(set, filtered, role, top_n);
        Ok(Report::Location {
            subtype,
            top_n,
            rows,
        })
    }

    /// Most frequently called numbers.
    pub fn numbers(set: &CanonicalSet, filtered: &FilteredSet, top_n: usize) -> Report {
        let rows = Self::rank_by(set, filtered, Role::CalledNumber, top_n);
        Report::Numbers { top_n, rows }
    }

    /// Calls per calendar date, ascending.
    pub fn date_volume(filtered: &FilteredSet) -> Report {
        let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for ts in filtered.records().iter().filter_map(|r| r.timestamp) {
            *by_day.entry(ts.date()).or_insert(0) += 1;
        }
        Report::DateVolume {
            rows: by_day.into_iter().collect(),
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Count values of `role`, sort by count descending and keep `top_n`.
    ///
    /// Equal counts keep the order in which their key first appears in the
    /// filtered sequence. Blank cells count under the empty key.
    fn rank_by(
        set: &CanonicalSet,
        filtered: &FilteredSet,
        role: Role,
        top_n: usize,
    ) -> Vec<(String, u64)> {
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<(String, u64)> = Vec::new();

        for record in filtered.records() {
            let key = set.value(role, record).unwrap_or("").trim();
            match position.get(key) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    position.insert(key, counts.len());
                    counts.push((key.to_string(), 1));
                }
            }
        }

        debug!("{} distinct {} values", counts.len(), role);

        // Stable sort keeps first-appearance order among equal counts.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(top_n);
        counts
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::filter::filter_records;
    use cdr_core::models::{ColumnMapping, DateRange, RawTable};
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn build(rows: &[[&str; 4]], sub: bool) -> CanonicalSet {
        let table = RawTable::new(
            ["Date", "Number", "Main City", "Sub City"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        );
        let mapping = ColumnMapping {
            date: "Date".to_string(),
            time: None,
            called_number: "Number".to_string(),
            main_location: "Main City".to_string(),
            sub_location: sub.then(|| "Sub City".to_string()),
            cell_id: None,
        };
        canonicalize(Arc::new(table), mapping).unwrap()
    }

    fn all(set: &CanonicalSet) -> FilteredSet {
        let range = DateRange::new(date("2000-01-01"), date("2100-01-01")).unwrap();
        filter_records(set.records(), range)
    }

    fn three_rows() -> CanonicalSet {
        build(
            &[
                ["2024-03-01", "A", "X", "s1"],
                ["2024-03-02", "A", "X", "s2"],
                ["2024-03-03", "B", "Y", "s1"],
            ],
            false,
        )
    }

    fn pairs(rows: &[(&str, u64)]) -> Vec<(String, u64)> {
        rows.iter().map(|(k, c)| (k.to_string(), *c)).collect()
    }

    // ── Scenarios ─────────────────────────────────────────────────────────────

    #[test]
    fn test_three_row_location_main() {
        let set = three_rows();
        let report = CallAggregator::location(&set, &all(&set), LocationKind::Main, 10).unwrap();
        assert_eq!(
            report,
            Report::Location {
                subtype: LocationKind::Main,
                top_n: 10,
                rows: pairs(&[("X", 2), ("Y", 1)]),
            }
        );
    }

    #[test]
    fn test_three_row_numbers() {
        let set = three_rows();
        let report = CallAggregator::numbers(&set, &all(&set), 10);
        assert_eq!(
            report,
            Report::Numbers {
                top_n: 10,
                rows: pairs(&[("A", 2), ("B", 1)]),
            }
        );
    }

    #[test]
    fn test_three_row_date_volume() {
        let set = three_rows();
        let report = CallAggregator::date_volume(&all(&set));
        assert_eq!(
            report,
            Report::DateVolume {
                rows: vec![
                    (date("2024-03-01"), 1),
                    (date("2024-03-02"), 1),
                    (date("2024-03-03"), 1),
                ],
            }
        );
    }

    #[test]
    fn test_sub_location_unmapped() {
        let set = three_rows();
        let err = CallAggregator::aggregate(
            &set,
            &all(&set),
            ReportKind::Location(LocationKind::Sub),
            10,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CdrError::MissingOptionalColumn(Role::SubLocation)
        ));
    }

    #[test]
    fn test_sub_location_mapped() {
        let set = build(
            &[
                ["2024-03-01", "A", "X", "s1"],
                ["2024-03-02", "A", "X", "s2"],
                ["2024-03-03", "B", "Y", "s1"],
            ],
            true,
        );
        let report = CallAggregator::location(&set, &all(&set), LocationKind::Sub, 10).unwrap();
        assert_eq!(report.rows()[0].key, "s1");
        assert_eq!(report.rows()[0].count, 2);
    }

    // ── Ranking properties ────────────────────────────────────────────────────

    #[test]
    fn test_ties_keep_first_appearance() {
        let set = build(
            &[
                ["2024-03-01", "C", "X", ""],
                ["2024-03-01", "B", "X", ""],
                ["2024-03-01", "A", "X", ""],
                ["2024-03-01", "A", "X", ""],
                ["2024-03-01", "B", "X", ""],
                ["2024-03-01", "C", "X", ""],
            ],
            false,
        );
        let report = CallAggregator::numbers(&set, &all(&set), 10);
        let keys: Vec<String> = report.rows().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_top_n_truncates_and_counts_descend() {
        let rows: Vec<[&str; 4]> = ["A", "B", "B", "C", "C", "C", "D", "D", "D", "D"]
            .iter()
            .map(|n| ["2024-03-01", *n, "X", ""])
            .collect();
        let set = build(&rows, false);
        let report = CallAggregator::numbers(&set, &all(&set), 3);
        let rows = report.rows();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].count >= w[1].count));
        assert_eq!(rows[0].key, "D");
    }

    #[test]
    fn test_untruncated_counts_sum_to_filtered_len() {
        let set = build(
            &[
                ["2024-03-01", "A", "X", ""],
                ["2024-03-01", "", "Y", ""],
                ["2024-03-02", "B", "", ""],
                ["2024-03-02", "A", "X", ""],
            ],
            false,
        );
        let filtered = all(&set);
        let numbers = CallAggregator::numbers(&set, &filtered, usize::MAX);
        assert_eq!(numbers.total_count(), filtered.len() as u64);
        let location =
            CallAggregator::location(&set, &filtered, LocationKind::Main, usize::MAX).unwrap();
        assert_eq!(location.total_count(), filtered.len() as u64);
        // Blank cells are grouped under the empty key.
        assert!(numbers.rows().iter().any(|r| r.key.is_empty() && r.count == 1));
    }

    #[test]
    fn test_date_volume_strictly_increasing_and_sums() {
        let set = build(
            &[
                ["2024-03-03 09:00:00", "A", "X", ""],
                ["2024-03-01 10:00:00", "A", "X", ""],
                ["2024-03-03 23:00:00", "B", "Y", ""],
                ["not a date", "B", "Y", ""],
            ],
            false,
        );
        let filtered = all(&set);
        let report = CallAggregator::date_volume(&filtered);
        match &report {
            Report::DateVolume { rows } => {
                assert!(rows.windows(2).all(|w| w[0].0 < w[1].0));
                assert_eq!(rows.len(), 2);
            }
            other => panic!("unexpected report: {other:?}"),
        }
        assert_eq!(report.total_count(), filtered.len() as u64);
    }

    #[test]
    fn test_empty_filtered_set_gives_empty_report() {
        let set = three_rows();
        let range = DateRange::new(date("2023-01-01"), date("2023-01-02")).unwrap();
        let filtered = filter_records(set.records(), range);
        assert!(CallAggregator::numbers(&set, &filtered, 10).is_empty());
        assert!(CallAggregator::date_volume(&filtered).is_empty());
    }
}

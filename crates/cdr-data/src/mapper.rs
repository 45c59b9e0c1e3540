//! Column-role detection and mapping validation.
//!
//! Detection runs an ordered keyword rule table against the column names;
//! the result is a [`DraftMapping`] the user can edit before it is validated
//! into a [`ColumnMapping`].

use cdr_core::error::{MappingError, Result};
use cdr_core::models::{ColumnMapping, DraftMapping, RawTable, Role};
use tracing::debug;

// ── Rule table ────────────────────────────────────────────────────────────────

/// Keyword predicate matched case-insensitively against a column name.
#[derive(Debug, Clone, Copy)]
pub struct MappingRule {
    pub role: Role,
    /// Every keyword must appear.
    pub all: &'static [&'static str],
    /// At least one keyword must appear (ignored when empty).
    pub any: &'static [&'static str],
    /// No keyword may appear.
    pub none: &'static [&'static str],
}

impl MappingRule {
    pub fn matches(&self, column: &str) -> bool {
        let name = column.to_lowercase();
        self.all.iter().all(|k| name.contains(k))
            && (self.any.is_empty() || self.any.iter().any(|k| name.contains(k)))
            && !self.none.iter().any(|k| name.contains(k))
    }
}

pub const MAPPING_RULES: &[MappingRule] = &[
    MappingRule {
        role: Role::Date,
        all: &[],
        any: &["date"],
        none: &[],
    },
    MappingRule {
        role: Role::Time,
        all: &[],
        any: &["time"],
        none: &["date"],
    },
    MappingRule {
        role: Role::CalledNumber,
        all: &[],
        any: &["party", "number", "b party", "called"],
        none: &[],
    },
    MappingRule {
        role: Role::MainLocation,
        all: &["main", "city"],
        any: &[],
        none: &[],
    },
    MappingRule {
        role: Role::SubLocation,
        all: &["sub", "city"],
        any: &[],
        none: &[],
    },
    MappingRule {
        role: Role::CellId,
        all: &[],
        any: &["cell", "address"],
        none: &[],
    },
];

// ── Public API ────────────────────────────────────────────────────────────────

/// Propose a mapping from column names. The first column matching a role's
/// rule wins; roles with no match stay unmapped.
pub fn propose(columns: &[&str]) -> DraftMapping {
    let mut draft = DraftMapping::new();
    for rule in MAPPING_RULES {
        if let Some(column) = columns.iter().find(|c| rule.matches(c)) {
            debug!("Detected {} column: {}", rule.role, column);
            draft.set(rule.role, Some(column.to_string()));
        }
    }
    draft
}

/// Lay explicit assignments over a proposal. Roles absent from `overrides`
/// keep the proposed column.
pub fn apply_overrides(mut draft: DraftMapping, overrides: &DraftMapping) -> DraftMapping {
    for role in Role::ALL {
        if let Some(column) = overrides.get(role) {
            draft.set(role, Some(column.to_string()));
        }
    }
    draft
}

/// Check that every required role is mapped and every mapped column exists.
pub fn validate(draft: &DraftMapping, table: &RawTable) -> Result<ColumnMapping> {
    let missing: Vec<Role> = Role::ALL
        .into_iter()
        .filter(|r| r.is_required() && !draft.is_mapped(*r))
        .collect();
    if !missing.is_empty() {
        return Err(MappingError::MissingRequired(missing).into());
    }

    for role in Role::ALL {
        if let Some(column) = draft.get(role) {
            if table.column_index(column).is_none() {
                return Err(MappingError::UnknownColumn {
                    role,
                    column: column.to_string(),
                }
                .into());
            }
        }
    }

    let required = |role: Role| draft.get(role).map(str::to_string).unwrap_or_default();
    let optional = |role: Role| draft.get(role).map(str::to_string);

    Ok(ColumnMapping {
        date: required(Role::Date),
        time: optional(Role::Time),
        called_number: required(Role::CalledNumber),
        main_location: required(Role::MainLocation),
        sub_location: optional(Role::SubLocation),
        cell_id: optional(Role::CellId),
    })
}

/// Step `role`'s assignment through `(none)` and then every column in
/// table order; `forward == false` steps backwards.
pub fn cycle_column(draft: &mut DraftMapping, role: Role, columns: &[&str], forward: bool) {
    // Slot 0 is "(none)", slot i + 1 is columns[i].
    let slots = columns.len() + 1;
    let current = draft
        .get(role)
        .and_then(|c| columns.iter().position(|name| *name == c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let next = if forward {
        (current + 1) % slots
    } else {
        (current + slots - 1) % slots
    };
    let column = next.checked_sub(1).map(|i| columns[i].to_string());
    draft.set(role, column);
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_core::error::CdrError;

    const COLUMNS: &[&str] = &[
        "Call Date",
        "Call Time",
        "B Party Number",
        "Main City",
        "Sub City",
        "Cell Address",
    ];

    fn table(columns: &[&str]) -> RawTable {
        RawTable::new(columns.iter().map(|c| c.to_string()).collect(), vec![])
    }

    // ── propose ───────────────────────────────────────────────────────────────

    #[test]
    fn test_propose_detects_all_roles() {
        let draft = propose(COLUMNS);
        assert_eq!(draft.get(Role::Date), Some("Call Date"));
        assert_eq!(draft.get(Role::Time), Some("Call Time"));
        assert_eq!(draft.get(Role::CalledNumber), Some("B Party Number"));
        assert_eq!(draft.get(Role::MainLocation), Some("Main City"));
        assert_eq!(draft.get(Role::SubLocation), Some("Sub City"));
        assert_eq!(draft.get(Role::CellId), Some("Cell Address"));
    }

    #[test]
    fn test_propose_time_excludes_date_columns() {
        let draft = propose(&["DateTime", "Start Time"]);
        assert_eq!(draft.get(Role::Date), Some("DateTime"));
        assert_eq!(draft.get(Role::Time), Some("Start Time"));
    }

    #[test]
    fn test_propose_is_case_insensitive_and_first_match_wins() {
        let draft = propose(&["CALLED", "number"]);
        assert_eq!(draft.get(Role::CalledNumber), Some("CALLED"));
    }

    #[test]
    fn test_propose_main_city_needs_both_keywords() {
        let draft = propose(&["City", "Main Site"]);
        assert!(!draft.is_mapped(Role::MainLocation));
    }

    #[test]
    fn test_propose_no_match_leaves_unmapped() {
        let draft = propose(&["foo", "bar"]);
        assert!(Role::ALL.iter().all(|r| !draft.is_mapped(*r)));
    }

    // ── apply_overrides ───────────────────────────────────────────────────────

    #[test]
    fn test_apply_overrides_replaces_only_given_roles() {
        let mut overrides = DraftMapping::new();
        overrides.set(Role::MainLocation, Some("Sub City".to_string()));
        let draft = apply_overrides(propose(COLUMNS), &overrides);
        assert_eq!(draft.get(Role::MainLocation), Some("Sub City"));
        assert_eq!(draft.get(Role::Date), Some("Call Date"));
    }

    // ── validate ──────────────────────────────────────────────────────────────

    #[test]
    fn test_validate_complete_mapping() {
        let mapping = validate(&propose(COLUMNS), &table(COLUMNS)).unwrap();
        assert_eq!(mapping.date, "Call Date");
        assert_eq!(mapping.time.as_deref(), Some("Call Time"));
        assert_eq!(mapping.cell_id.as_deref(), Some("Cell Address"));
    }

    #[test]
    fn test_validate_optional_roles_may_be_missing() {
        let columns = &["Date", "Number", "Main City"];
        let mapping = validate(&propose(columns), &table(columns)).unwrap();
        assert!(mapping.time.is_none());
        assert!(mapping.sub_location.is_none());
        assert!(mapping.cell_id.is_none());
    }

    #[test]
    fn test_validate_reports_all_missing_required() {
        let columns = &["Call Time", "Sub City"];
        let err = validate(&propose(columns), &table(columns)).unwrap_err();
        match err {
            CdrError::Mapping(MappingError::MissingRequired(roles)) => {
                assert_eq!(
                    roles,
                    vec![Role::Date, Role::CalledNumber, Role::MainLocation]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_rejects_unknown_column() {
        let mut draft = propose(COLUMNS);
        draft.set(Role::CellId, Some("Tower".to_string()));
        let err = validate(&draft, &table(COLUMNS)).unwrap_err();
        assert!(matches!(
            err,
            CdrError::Mapping(MappingError::UnknownColumn { role: Role::CellId, .. })
        ));
    }

    // ── cycle_column ──────────────────────────────────────────────────────────

    #[test]
    fn test_cycle_column_wraps_through_none() {
        let columns = &["A", "B"];
        let mut draft = DraftMapping::new();
        cycle_column(&mut draft, Role::Time, columns, true);
        assert_eq!(draft.get(Role::Time), Some("A"));
        cycle_column(&mut draft, Role::Time, columns, true);
        assert_eq!(draft.get(Role::Time), Some("B"));
        cycle_column(&mut draft, Role::Time, columns, true);
        assert_eq!(draft.get(Role::Time), None);
        cycle_column(&mut draft, Role::Time, columns, false);
        assert_eq!(draft.get(Role::Time), Some("B"));
    }
}

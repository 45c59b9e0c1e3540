use chrono::NaiveDateTime;

/// Format a count with thousands separators.
///
/// # Examples
///
/// ```
/// use cdr_core::formatting::format_count;
///
/// assert_eq!(format_count(7), "7");
/// assert_eq!(format_count(1234), "1,234");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format a call count the way result lists show it, e.g. `"1,204 calls"`.
///
/// # Examples
///
/// ```
/// use cdr_core::formatting::format_calls;
///
/// assert_eq!(format_calls(1), "1 call");
/// assert_eq!(format_calls(1204), "1,204 calls");
/// ```
pub fn format_calls(count: u64) -> String {
    if count == 1 {
        "1 call".to_string()
    } else {
        format!("{} calls", format_count(count))
    }
}

/// Format a `(min, max)` timestamp span as `"min to max"`.
pub fn format_span(min: NaiveDateTime, max: NaiveDateTime) -> String {
    format!(
        "{} to {}",
        min.format("%Y-%m-%d %H:%M:%S"),
        max.format("%Y-%m-%d %H:%M:%S")
    )
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

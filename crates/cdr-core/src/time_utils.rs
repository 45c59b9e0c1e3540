use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

// ── Accepted layouts ──────────────────────────────────────────────────────────

/// Date-time layouts tried in order. Month-first slash forms come before
/// day-first ones, so `03/01/2024` reads as March 1st while `13/01/2024`
/// still parses as January 13th.
///
/// chrono's `%Y` also takes one to three digits, so a `%Y` match with a year
/// below [`MIN_FOUR_DIGIT_YEAR`] is discarded and the `%y` layouts get their
/// turn.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M:%S %p",
    "%d/%m/%Y %I:%M %p",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%y %I:%M %p",
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%y %H:%M",
    "%d-%b-%y %H:%M:%S",
    "%d-%b-%y %H:%M",
    "%Y%m%d%H%M%S",
    "%Y%m%d %H%M%S",
    "%Y%m%d %H:%M:%S",
];

/// Date-only layouts; the result is taken at midnight.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m/%d/%y",
    "%d/%m/%y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %B %Y",
    "%Y%m%d",
];

const MIN_FOUR_DIGIT_YEAR: i32 = 1000;

/// Time-of-day layouts for a separate time column.
const TIME_FORMATS: &[&str] = &[
    "%H:%M:%S%.f",
    "%H:%M:%S",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
    "%H%M%S",
];

/// Excel's day zero for serial date numbers (1900 date system).
fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("regex is valid"))
}

/// Five-digit serials cover 1927-2173 and never collide with `YYYYMMDD`.
fn excel_serial_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}(\.\d+)?$").expect("regex is valid"))
}

fn day_fraction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0?\.\d+$").expect("regex is valid"))
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse a cell that holds a date, optionally with a time of day.
///
/// RFC 3339 values keep their wall-clock time and drop the offset. Date-only
/// values resolve to midnight. Returns `None` for blank or unrecognised text.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = normalise(raw);
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            if dt.year() >= MIN_FOUR_DIGIT_YEAR {
                return Some(dt);
            }
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            if d.year() >= MIN_FOUR_DIGIT_YEAR {
                return d.and_hms_opt(0, 0, 0);
            }
        }
    }

    if excel_serial_re().is_match(&s) {
        return s.parse::<f64>().ok().and_then(excel_serial_to_datetime);
    }

    None
}

/// Parse a time-of-day cell (`14:05:09`, `2:05 PM`, `140509`, or an Excel
/// day fraction such as `0.5`).
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let s = normalise(raw);
    if s.is_empty() {
        return None;
    }

    for fmt in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(&s, fmt) {
            return Some(t);
        }
    }

    if day_fraction_re().is_match(&s) {
        let fraction: f64 = s.parse().ok()?;
        let secs = (fraction * 86_400.0).round() as u32;
        return NaiveTime::from_num_seconds_from_midnight_opt(secs.min(86_399), 0);
    }

    None
}

/// Combine a date cell and a time cell into one timestamp.
///
/// The cells are first joined as `"<date> <time>"` and parsed as a single
/// value. When that fails, each part is parsed on its own and the date's
/// calendar day is combined with the time of day.
pub fn parse_date_time_pair(date: &str, time: &str) -> Option<NaiveDateTime> {
    let combined = format!("{} {}", date.trim(), time.trim());
    if let Some(dt) = parse_datetime(&combined) {
        return Some(dt);
    }

    let day = parse_datetime(date)?.date();
    let tod = parse_time_of_day(time)?;
    Some(day.and_time(tod))
}

/// Convert an Excel serial day number to a timestamp (second precision).
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let secs = (serial * 86_400.0).round() as i64;
    excel_epoch().checked_add_signed(Duration::seconds(secs))
}

/// Parse a `YYYY-MM-DD` command-line date.
pub fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got \"{}\": {}", s, e))
}

fn normalise(raw: &str) -> String {
    whitespace_re().replace_all(raw.trim(), " ").into_owned()
}

// ── Tests ──────────────────────────────────────────────────────────────────────

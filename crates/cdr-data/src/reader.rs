//! CDR file loading.
//!
//! Reads delimited text (with encoding and delimiter detection) and
//! spreadsheet workbooks into an in-memory [`RawTable`].

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use cdr_core::error::{LoadError, Result};
use cdr_core::models::RawTable;
use encoding_rs::Encoding;
use tracing::{debug, info, warn};

/// Extensions handed to the spreadsheet parser. Everything else is read as
/// delimited text.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Encodings tried, in order, for text without a byte-order mark.
const ENCODING_CANDIDATES: &[&str] = &["utf-8", "latin-1", "iso-8859-1", "cp1252", "utf-16"];

const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t', b'|'];

/// Lines inspected when guessing the delimiter.
const SNIFF_LINES: usize = 10;

// ── Public API ────────────────────────────────────────────────────────────────

/// Load `path` into a [`RawTable`].
///
/// The first row is the header. Fails with [`LoadError::EmptyFile`] when the
/// file has no bytes or no data rows.
pub fn load_table(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()).into());
    }

    let size = std::fs::metadata(path)
        .map_err(|e| unreadable(path, e))?
        .len();
    if size == 0 {
        return Err(LoadError::EmptyFile(path.to_path_buf()).into());
    }

    let table = if is_spreadsheet(path) {
        read_workbook(path)?
    } else {
        let bytes = std::fs::read(path).map_err(|e| unreadable(path, e))?;
        read_delimited(path, &bytes)?
    };

    if table.is_empty() {
        return Err(LoadError::EmptyFile(path.to_path_buf()).into());
    }

    info!(
        "Loaded {} rows x {} columns from {}",
        table.row_count(),
        table.column_count(),
        path.display()
    );
    Ok(table)
}

/// `true` when `path` is read with the spreadsheet parser.
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SPREADSHEET_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

// ── Delimited text ────────────────────────────────────────────────────────────

struct Attempt {
    encoding: &'static Encoding,
    /// Selected by a byte-order mark, which is stripped before decoding.
    from_bom: bool,
}

fn decode_attempts(bytes: &[u8]) -> Vec<Attempt> {
    let mut attempts: Vec<Attempt> = Vec::new();

    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        debug!("Byte-order mark selects {}", encoding.name());
        attempts.push(Attempt {
            encoding,
            from_bom: true,
        });
    }

    let has_zero_byte = bytes.contains(&0);
    for label in ENCODING_CANDIDATES {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            debug!("Encoding label {} is not recognised, skipping", label);
            continue;
        };
        if attempts.iter().any(|a| a.encoding == encoding) {
            continue;
        }
        // ASCII-range text in UTF-16 always carries zero bytes; without them
        // a UTF-16 decode only produces noise.
        if is_utf16(encoding) && !has_zero_byte {
            continue;
        }
        attempts.push(Attempt {
            encoding,
            from_bom: false,
        });
    }

    attempts
}

fn is_utf16(encoding: &'static Encoding) -> bool {
    encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE
}

/// Decode with malformed sequences replaced by U+FFFD. A candidate is only
/// rejected when the result holds NUL characters, which marks a wrong
/// code-unit width rather than a few bad bytes.
fn decode(bytes: &[u8], attempt: &Attempt) -> Option<String> {
    let (text, had_errors) = if attempt.from_bom {
        attempt.encoding.decode_with_bom_removal(bytes)
    } else {
        attempt.encoding.decode_without_bom_handling(bytes)
    };

    if text.contains('\0') {
        return None;
    }
    if had_errors {
        warn!(
            "Replaced malformed {} sequences while decoding",
            attempt.encoding.name()
        );
    }
    Some(text.into_owned())
}

fn read_delimited(path: &Path, bytes: &[u8]) -> Result<RawTable> {
    let mut parse_failure: Option<String> = None;

    for attempt in decode_attempts(bytes) {
        let name = attempt.encoding.name();
        let Some(text) = decode(bytes, &attempt) else {
            debug!("Decoding {} as {} failed", path.display(), name);
            continue;
        };

        let delimiter = sniff_delimiter(&text);
        match parse_delimited(&text, delimiter) {
            Ok((headers, rows)) => {
                if headers.iter().all(|h| h.trim().is_empty()) {
                    return Err(LoadError::EmptyFile(path.to_path_buf()).into());
                }
                info!(
                    encoding = name,
                    delimiter = %char::from(delimiter).escape_default(),
                    "Decoded {}",
                    path.display()
                );
                return Ok(RawTable::new(headers, rows));
            }
            Err(reason) => {
                debug!("Parsing {} as {} failed: {}", path.display(), name, reason);
                parse_failure = Some(reason);
            }
        }
    }

    match parse_failure {
        Some(reason) => Err(LoadError::Unreadable {
            path: path.to_path_buf(),
            reason,
        }
        .into()),
        None => Err(LoadError::UnsupportedEncoding(path.to_path_buf()).into()),
    }
}

/// Pick the delimiter whose per-line count is consistent and non-zero over
/// the first lines, preferring the highest count. Falls back to `,`.
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if lines.is_empty() {
        return b',';
    }

    let mut best: Option<(u8, usize)> = None;
    for &candidate in DELIMITER_CANDIDATES {
        let first = count_unquoted(lines[0], candidate);
        if first == 0 {
            continue;
        }
        if lines.iter().any(|l| count_unquoted(l, candidate) != first) {
            continue;
        }
        if best.map_or(true, |(_, n)| first > n) {
            best = Some((candidate, first));
        }
    }

    best.map(|(d, _)| d).unwrap_or(b',')
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

type ParsedRows = (Vec<String>, Vec<Vec<String>>);

fn parse_delimited(text: &str, delimiter: u8) -> std::result::Result<ParsedRows, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let mut cells: Vec<String> = record.iter().map(String::from).collect();

        if cells.len() > headers.len() {
            if cells[headers.len()..].iter().any(|c| !c.is_empty()) {
                return Err(format!(
                    "row {} has {} fields, expected {}",
                    i + 2,
                    cells.len(),
                    headers.len()
                ));
            }
            cells.truncate(headers.len());
        }
        if cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push(cells);
    }

    Ok((headers, rows))
}

// ── Spreadsheets ──────────────────────────────────────────────────────────────

fn read_workbook(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::EmptyFile(path.to_path_buf()))?
        .map_err(|e| unreadable(path, e))?;

    let mut rows = range
        .rows()
        .map(|r| r.iter().map(cell_text).collect::<Vec<String>>())
        .filter(|r| r.iter().any(|c| !c.is_empty()));

    let Some(headers) = rows.next() else {
        return Err(LoadError::EmptyFile(path.to_path_buf()).into());
    };
    let data: Vec<Vec<String>> = rows.collect();

    debug!(
        "Read {} data rows from the first sheet of {}",
        data.len(),
        path.display()
    );
    Ok(RawTable::new(headers, data))
}

/// Render a spreadsheet cell as text.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => float_text(*v),
        Data::Bool(v) => v.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => float_text(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        _ => String::new(),
    }
}

/// Integral values print without a fractional part so phone numbers stored
/// as numbers keep their digits.
fn float_text(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

fn unreadable(path: &Path, e: impl std::fmt::Display) -> LoadError {
    LoadError::Unreadable {
        path: PathBuf::from(path),
        reason: e.to_string(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

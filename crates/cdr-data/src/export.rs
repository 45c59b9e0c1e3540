//! Report table export to CSV, Excel and JSON.

use std::path::Path;

use cdr_core::error::{CdrError, Result};
use cdr_core::models::{Report, ReportKind, ReportRow};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use tracing::info;

/// Output format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
    Json,
}

impl TableFormat {
    /// Anything other than `.xlsx` or `.json` is written as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("xlsx") => TableFormat::Xlsx,
            Some("json") => TableFormat::Json,
            _ => TableFormat::Csv,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    title: String,
    kind: ReportKind,
    key_header: &'a str,
    count_header: &'a str,
    rows: Vec<ReportRow>,
}

/// Write `report` as a two-column table at `path`.
pub fn export_report(report: &Report, path: &Path) -> Result<()> {
    let format = TableFormat::from_path(path);
    let written = match format {
        TableFormat::Csv => write_csv(report, path),
        TableFormat::Xlsx => write_xlsx(report, path),
        TableFormat::Json => write_json(report, path),
    };
    written.map_err(|reason| CdrError::Export {
        path: path.to_path_buf(),
        reason,
    })?;

    info!(
        "Exported {} rows ({:?}) to {}",
        report.len(),
        format,
        path.display()
    );
    Ok(())
}

fn write_csv(report: &Report, path: &Path) -> std::result::Result<(), String> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| e.to_string())?;
    wtr.write_record([report.key_header(), report.count_header()])
        .map_err(|e| e.to_string())?;
    for row in report.rows() {
        wtr.write_record([row.key.as_str(), row.count.to_string().as_str()])
            .map_err(|e| e.to_string())?;
    }
    wtr.flush().map_err(|e| e.to_string())
}

fn write_xlsx(report: &Report, path: &Path) -> std::result::Result<(), String> {
    let mut workbook = Workbook::new();
    let header_fmt = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Report").map_err(|e| e.to_string())?;
    sheet
        .write_string_with_format(0, 0, report.key_header(), &header_fmt)
        .map_err(|e| e.to_string())?;
    sheet
        .write_string_with_format(0, 1, report.count_header(), &header_fmt)
        .map_err(|e| e.to_string())?;

    for (i, row) in report.rows().iter().enumerate() {
        let r = (i + 1) as u32;
        sheet
            .write_string(r, 0, &row.key)
            .map_err(|e| e.to_string())?;
        sheet
            .write_number(r, 1, row.count as f64)
            .map_err(|e| e.to_string())?;
    }
    sheet.set_column_width(0, 28).map_err(|e| e.to_string())?;
    sheet.set_column_width(1, 12).map_err(|e| e.to_string())?;

    workbook.save(path).map_err(|e| e.to_string())
}

fn write_json(report: &Report, path: &Path) -> std::result::Result<(), String> {
    let doc = JsonReport {
        title: report.title(),
        kind: report.kind(),
        key_header: report.key_header(),
        count_header: report.count_header(),
        rows: report.rows(),
    };
    let file = std::fs::File::create(path).map_err(|e| e.to_string())?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &doc).map_err(|e| e.to_string())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

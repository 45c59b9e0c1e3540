//! Chart export to PNG and SVG with plotters.
//!
//! Ranked reports become horizontal bar charts with the top entry first;
//! call volume by date becomes a line chart with a marker on every date.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use cdr_core::error::{CdrError, Result};
use cdr_core::formatting::format_count;
use cdr_core::models::{display_key, Report};

/// Raster size: 10 x 6 inches at 300 DPI.
pub const PNG_SIZE: (u32, u32) = (3000, 1800);
/// Vector canvas size; scales freely.
pub const SVG_SIZE: (u32, u32) = (1000, 600);

/// DejaVu Sans, registered as the `sans-serif` family used by every chart.
const FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
const FONT_FAMILY: &str = "sans-serif";

const BAR_COLOR: RGBColor = RGBColor(31, 119, 180);
const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const MARKER_COLOR: RGBColor = RGBColor(214, 39, 40);

/// Chart output format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartFormat {
    Png,
    Svg,
}

impl ChartFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("png") => Ok(ChartFormat::Png),
            Some("svg") => Ok(ChartFormat::Svg),
            other => Err(CdrError::Export {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported chart format '{}'; use .png or .svg",
                    other.unwrap_or("")
                ),
            }),
        }
    }
}

/// Draw `report` to `path` as PNG or SVG.
pub fn export_chart(report: &Report, path: &Path) -> Result<()> {
    let format = ChartFormat::from_path(path)?;
    if !register_font() {
        return Err(CdrError::Export {
            path: path.to_path_buf(),
            reason: "the bundled chart font could not be loaded".to_string(),
        });
    }
    if report.is_empty() {
        return Err(CdrError::Export {
            path: path.to_path_buf(),
            reason: "the report has no rows to chart".to_string(),
        });
    }

    let drawn = match format {
        ChartFormat::Png => {
            let root = BitMapBackend::new(path, PNG_SIZE).into_drawing_area();
            draw_report(root, report)
        }
        ChartFormat::Svg => {
            let root = SVGBackend::new(path, SVG_SIZE).into_drawing_area();
            draw_report(root, report)
        }
    };
    drawn.map_err(|e| CdrError::Export {
        path: path.to_path_buf(),
        reason: format!("{:#}", e),
    })?;

    info!("Exported {:?} chart to {}", format, path.display());
    Ok(())
}

fn register_font() -> bool {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    *REGISTERED.get_or_init(|| {
        plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES).is_ok()
    })
}

fn draw_report<DB>(root: DrawingArea<DB, Shift>, report: &Report) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    // Font and margin sizes are tuned for the SVG canvas width.
    let scale = root.dim_in_pixel().0 as f64 / SVG_SIZE.0 as f64;

    match report {
        Report::DateVolume { rows } => draw_volume(&root, report, rows, scale)?,
        _ => draw_ranking(&root, report, scale)?,
    }

    root.present()?;
    Ok(())
}

fn draw_ranking<DB>(root: &DrawingArea<DB, Shift>, report: &Report, scale: f64) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let rows = report.rows();
    let n = rows.len() as u32;
    let max = rows.iter().map(|r| r.count).max().unwrap_or(0).max(1);
    let labels: Vec<String> = rows.iter().map(|r| display_key(&r.key).to_string()).collect();

    // Segment 0 is the bottom of the chart; the first row goes on top.
    let slot = |i: usize| n - 1 - i as u32;

    let mut chart = ChartBuilder::on(root)
        .caption(report.title(), (FONT_FAMILY, 24.0 * scale))
        .margin((20.0 * scale) as u32)
        .set_label_area_size(LabelAreaPosition::Left, (180.0 * scale) as u32)
        .set_label_area_size(LabelAreaPosition::Bottom, (50.0 * scale) as u32)
        .build_cartesian_2d(0u64..(max + max / 10 + 1), (0u32..n).into_segmented())?;

    let label_for = |v: &SegmentValue<u32>| match v {
        SegmentValue::CenterOf(i) => n
            .checked_sub(i + 1)
            .and_then(|idx| labels.get(idx as usize))
            .cloned()
            .unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(labels.len())
        .y_label_formatter(&label_for)
        .x_label_formatter(&|v| format_count(*v))
        .x_desc(report.count_header())
        .label_style((FONT_FAMILY, 14.0 * scale))
        .axis_desc_style((FONT_FAMILY, 16.0 * scale))
        .draw()?;

    chart.draw_series(
        Histogram::horizontal(&chart)
            .style(BAR_COLOR.filled())
            .margin((4.0 * scale) as u32)
            .data(rows.iter().enumerate().map(|(i, r)| (slot(i), r.count))),
    )?;

    chart.draw_series(rows.iter().enumerate().map(|(i, r)| {
        Text::new(
            format!(" {}", format_count(r.count)),
            (r.count, SegmentValue::CenterOf(slot(i))),
            (FONT_FAMILY, 13.0 * scale),
        )
    }))?;

    Ok(())
}

fn draw_volume<DB>(
    root: &DrawingArea<DB, Shift>,
    report: &Report,
    rows: &[(NaiveDate, u64)],
    scale: f64,
) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Ok(());
    };
    let first = first.0;
    let span = (last.0 - first).num_days().max(1);
    let y_max = rows.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1);

    // Days since the first date, so gaps between dates keep their width.
    let points: Vec<(i64, u64)> = rows
        .iter()
        .map(|(date, count)| ((*date - first).num_days(), *count))
        .collect();

    let mut chart = ChartBuilder::on(root)
        .caption(report.title(), (FONT_FAMILY, 24.0 * scale))
        .margin((20.0 * scale) as u32)
        .set_label_area_size(LabelAreaPosition::Left, (70.0 * scale) as u32)
        .set_label_area_size(LabelAreaPosition::Bottom, (60.0 * scale) as u32)
        .build_cartesian_2d(0i64..span, 0u64..(y_max + y_max / 10 + 1))?;

    chart
        .configure_mesh()
        .x_labels(rows.len().clamp(2, 10))
        .x_label_formatter(&|d| (first + Duration::days(*d)).format("%Y-%m-%d").to_string())
        .y_label_formatter(&|v| format_count(*v))
        .x_desc("Date")
        .y_desc(report.count_header())
        .label_style((FONT_FAMILY, 14.0 * scale))
        .axis_desc_style((FONT_FAMILY, 16.0 * scale))
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().copied(),
        LINE_COLOR.stroke_width((2.0 * scale).max(1.0) as u32),
    ))?;

    let radius = (4.0 * scale).max(2.0) as i32;
    chart.draw_series(
        points
            .iter()
            .map(|&p| Circle::new(p, radius, MARKER_COLOR.filled())),
    )?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

//! Report views for the CDR analyzer TUI.
//!
//! Renders the ranked list of `key: N calls` lines on the left and a chart
//! on the right: horizontal bars for location and number rankings, a line
//! with point markers for call volume by date.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    symbols::Marker,
    text::{Line, Span, Text},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph,
    },
    Frame,
};

use cdr_core::formatting::{format_calls, format_count};
use cdr_core::models::{display_key, DateRange, Report};

use crate::mapping_view::truncate_to_width;
use crate::themes::Theme;

/// Widest a bar label may get.
const BAR_LABEL_WIDTH: usize = 20;

/// Context line shown above the results.
#[derive(Debug, Clone, Copy)]
pub struct ResultsSummary {
    pub range: DateRange,
    pub filtered_count: usize,
    pub total_count: usize,
}

/// The ordered `"key: N calls"` lines of `report`.
///
/// # Examples
///
/// ```
/// use cdr_core::models::Report;
/// use cdr_ui::results_view::result_lines;
///
/// let report = Report::Numbers { top_n: 10, rows: vec![("A".into(), 2), ("".into(), 1)] };
/// assert_eq!(result_lines(&report), vec!["A: 2 calls", "(blank): 1 call"]);
/// ```
pub fn result_lines(report: &Report) -> Vec<String> {
    report
        .rows()
        .iter()
        .map(|row| format!("{}: {}", display_key(&row.key), format_calls(row.count)))
        .collect()
}

/// Render `report` with its summary line, list and chart.
pub fn render_results_view(
    frame: &mut Frame,
    area: Rect,
    report: &Report,
    summary: &ResultsSummary,
    theme: &Theme,
) {
    let [summary_area, body] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(3)]).areas(area);

    let summary_line = Line::from(vec![
        Span::styled(report.title(), theme.header),
        Span::styled("  ", theme.dim),
        Span::styled(
            format!(
                "{} to {}",
                summary.range.start().format("%Y-%m-%d"),
                summary.range.end().format("%Y-%m-%d")
            ),
            theme.value,
        ),
        Span::styled(
            format!(
                "  ({} of {} records)",
                format_count(summary.filtered_count as u64),
                format_count(summary.total_count as u64)
            ),
            theme.dim,
        ),
    ]);
    frame.render_widget(Paragraph::new(summary_line), summary_area);

    let [list_area, chart_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(body);

    render_list(frame, list_area, report, theme);
    match report {
        Report::DateVolume { .. } => render_line_chart(frame, chart_area, report, theme),
        _ => render_bar_chart(frame, chart_area, report, theme),
    }
}

fn render_list(frame: &mut Frame, area: Rect, report: &Report, theme: &Theme) {
    let lines: Vec<Line> = result_lines(report)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Line::from(Span::styled(text, theme.row_style(i))))
        .collect();

    let total = Line::from(Span::styled(
        format!("Total: {}", format_calls(report.total_count())),
        theme.table_total,
    ));

    let mut all = lines;
    all.push(Line::from(""));
    all.push(total);

    let list = Paragraph::new(Text::from(all)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.table_border)
            .title(format!(" {} ", report.key_header())),
    );
    frame.render_widget(list, area);
}

fn render_bar_chart(frame: &mut Frame, area: Rect, report: &Report, theme: &Theme) {
    let bars: Vec<Bar> = report
        .rows()
        .into_iter()
        .map(|row| {
            Bar::default()
                .value(row.count)
                .label(Line::from(truncate_to_width(
                    display_key(&row.key),
                    BAR_LABEL_WIDTH,
                )))
                .text_value(format_count(row.count))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(format!(" {} ", report.title())),
        )
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .bar_style(theme.bar)
        .value_style(theme.bar_value)
        .label_style(theme.label)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn render_line_chart(frame: &mut Frame, area: Rect, report: &Report, theme: &Theme) {
    let Report::DateVolume { rows } = report else {
        return;
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.table_border)
        .title(format!(" {} ", report.title()));

    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        frame.render_widget(block, area);
        return;
    };

    // Days since the first date on x, so gaps between dates stay visible.
    let points: Vec<(f64, f64)> = rows
        .iter()
        .map(|(date, count)| ((*date - first.0).num_days() as f64, *count as f64))
        .collect();
    let x_max = ((last.0 - first.0).num_days() as f64).max(1.0);
    let y_max = rows.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64;

    let datasets = vec![
        Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.line)
            .data(&points),
        Dataset::default()
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(theme.marker)
            .data(&points),
    ];

    let mid = first.0 + chrono::Duration::days((x_max / 2.0) as i64);
    let x_labels = vec![
        first.0.format("%m-%d").to_string(),
        mid.format("%m-%d").to_string(),
        last.0.format("%m-%d").to_string(),
    ];
    let y_labels = vec![
        "0".to_string(),
        format_count((y_max / 2.0).round() as u64),
        format_count(y_max as u64),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title("Date")
                .style(theme.dim)
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Calls")
                .style(theme.dim)
                .bounds([0.0, y_max])
                .labels(y_labels),
        );
    frame.render_widget(chart, area);
}

/// Placeholder shown on the results screen before any report exists.
pub fn render_no_report(frame: &mut Frame, area: Rect, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("No report yet", theme.warning)),
        Line::from(""),
        Line::from(Span::styled(
            "Press 'o' to open a CDR file or 'a' to run the analysis.",
            theme.dim,
        )),
        Line::from(Span::styled("Press 'q' or Ctrl+C to exit", theme.dim)),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(text)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" CDR Analyzer "),
        ),
        area,
    );
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_core::models::LocationKind;
    use chrono::NaiveDate;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn summary() -> ResultsSummary {
        ResultsSummary {
            range: DateRange::new(date(1), date(17)).unwrap(),
            filtered_count: 7,
            total_count: 9,
        }
    }

    fn location_report() -> Report {
        Report::Location {
            subtype: LocationKind::Main,
            top_n: 10,
            rows: vec![
                ("Lagos".to_string(), 4),
                ("Abuja".to_string(), 2),
                (String::new(), 1),
            ],
        }
    }

    fn volume_report() -> Report {
        Report::DateVolume {
            rows: vec![(date(1), 3), (date(2), 1), (date(9), 5)],
        }
    }

    fn render(report: &Report, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        terminal
            .draw(|frame| {
                let area = frame.area();
                render_results_view(frame, area, report, &summary(), &theme);
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_result_lines_format() {
        assert_eq!(
            result_lines(&location_report()),
            vec!["Lagos: 4 calls", "Abuja: 2 calls", "(blank): 1 call"]
        );
    }

    #[test]
    fn test_result_lines_date_volume_ascending() {
        assert_eq!(
            result_lines(&volume_report()),
            vec![
                "2024-03-01: 3 calls",
                "2024-03-02: 1 call",
                "2024-03-09: 5 calls"
            ]
        );
    }

    #[test]
    fn test_render_location_report_shows_list() {
        let content = render(&location_report(), 120, 30);
        assert!(content.contains("Lagos: 4 calls"));
        assert!(content.contains("Top 10 Common Locations"));
    }

    #[test]
    fn test_render_date_volume_does_not_panic() {
        let content = render(&volume_report(), 120, 30);
        assert!(content.contains("2024-03-09: 5 calls"));
    }

    #[test]
    fn test_render_single_date_does_not_panic() {
        let report = Report::DateVolume {
            rows: vec![(date(4), 2)],
        };
        render(&report, 80, 20);
    }

    #[test]
    fn test_render_empty_reports_do_not_panic() {
        render(&Report::DateVolume { rows: vec![] }, 80, 20);
        render(
            &Report::Numbers {
                top_n: 5,
                rows: vec![],
            },
            80,
            20,
        );
    }

    #[test]
    fn test_render_small_terminal_does_not_panic() {
        render(&location_report(), 30, 8);
        render(&volume_report(), 30, 8);
    }

    #[test]
    fn test_render_no_report_does_not_panic() {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::light();
        terminal
            .draw(|frame| {
                let area = frame.area();
                render_no_report(frame, area, &theme);
            })
            .unwrap();
    }
}

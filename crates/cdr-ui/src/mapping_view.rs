//! Column mapping screen.
//!
//! Lists every role with the column currently assigned to it, highlights the
//! role being edited, and shows the first rows of the loaded table so the
//! user can check the proposal before confirming.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use cdr_core::models::{DraftMapping, RawTable, Role};

use crate::themes::Theme;

/// Rows shown in the preview table.
pub const PREVIEW_ROWS: usize = 5;

/// Widest a preview cell may get before it is cut with `…`.
const PREVIEW_CELL_WIDTH: usize = 18;

/// Render the role list above a preview of `table`.
///
/// `selected` indexes [`Role::ALL`].
pub fn render_mapping_view(
    frame: &mut Frame,
    area: Rect,
    table: &RawTable,
    draft: &DraftMapping,
    selected: usize,
    theme: &Theme,
) {
    let [roles_area, preview_area] = Layout::vertical([
        Constraint::Length(Role::ALL.len() as u16 + 3),
        Constraint::Min(4),
    ])
    .areas(area);

    render_roles(frame, roles_area, draft, selected, theme);
    render_preview(frame, preview_area, table, theme);
}

fn render_roles(frame: &mut Frame, area: Rect, draft: &DraftMapping, selected: usize, theme: &Theme) {
    let header = Row::new(vec![
        Cell::from("Field").style(theme.table_header),
        Cell::from("Column").style(theme.table_header),
    ]);

    let rows: Vec<Row> = Role::ALL
        .iter()
        .enumerate()
        .map(|(i, role)| {
            let label = if role.is_required() {
                Line::from(vec![
                    Span::raw(role.label()),
                    Span::styled(" *", theme.required),
                ])
            } else {
                Line::from(role.label())
            };
            let column = match draft.get(*role) {
                Some(name) => Span::styled(name.to_string(), theme.value),
                None => Span::styled("(none)", theme.dim),
            };
            let style = if i == selected {
                theme.selected
            } else {
                theme.row_style(i)
            };
            Row::new(vec![Cell::from(label), Cell::from(Line::from(column))]).style(style)
        })
        .collect();

    let widths = [Constraint::Length(26), Constraint::Min(20)];
    let list = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.table_border)
            .title(" Column Mapping  (* required) "),
    );
    frame.render_widget(list, area);
}

fn render_preview(frame: &mut Frame, area: Rect, table: &RawTable, theme: &Theme) {
    let names = table.column_names();
    let header = Row::new(
        names
            .iter()
            .map(|n| Cell::from(truncate_to_width(n, PREVIEW_CELL_WIDTH)).style(theme.table_header)),
    );

    let rows: Vec<Row> = table
        .preview(PREVIEW_ROWS)
        .into_iter()
        .enumerate()
        .map(|(i, cells)| {
            Row::new(
                cells
                    .into_iter()
                    .map(|c| Cell::from(truncate_to_width(c, PREVIEW_CELL_WIDTH))),
            )
            .style(theme.row_style(i))
        })
        .collect();

    let widths = vec![Constraint::Length(PREVIEW_CELL_WIDTH as u16); names.len()];
    let preview = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.table_border)
            .title(format!(
                " Preview ({} of {} rows) ",
                table.row_count().min(PREVIEW_ROWS),
                table.row_count()
            )),
    );
    frame.render_widget(preview, area);
}

/// Cut `text` to at most `max` terminal columns, ending in `…` when cut.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > max {
            // Make room for the ellipsis.
            while width + 1 > max {
                match out.pop() {
                    Some(c) => width -= c.width().unwrap_or(0),
                    None => break,
                }
            }
            out.push('…');
            return out;
        }
        width += w;
        out.push(ch);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn sample_table() -> RawTable {
        RawTable::new(
            vec!["Call Date".into(), "B Party Number".into(), "Main City".into()],
            vec![
                vec!["2024-03-01".into(), "08031234567".into(), "Lagos".into()],
                vec!["2024-03-02".into(), "08031234567".into(), "Abuja".into()],
            ],
        )
    }

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_to_width("Lagos", 10), "Lagos");
        assert_eq!(truncate_to_width("", 3), "");
    }

    #[test]
    fn test_truncate_long_text_gets_ellipsis() {
        assert_eq!(truncate_to_width("B Party Number", 8), "B Party…");
    }

    #[test]
    fn test_truncate_wide_chars() {
        // Each CJK character is two columns wide.
        assert_eq!(truncate_to_width("東京都港区", 5), "東京…");
    }

    #[test]
    fn test_render_mapping_view_does_not_panic() {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        let table = sample_table();
        let mut draft = DraftMapping::new();
        draft.set(Role::Date, Some("Call Date".into()));

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_mapping_view(frame, area, &table, &draft, 2, &theme);
            })
            .unwrap();
    }

    #[test]
    fn test_render_mapping_view_shows_role_and_column() {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        let table = sample_table();
        let mut draft = DraftMapping::new();
        draft.set(Role::MainLocation, Some("Main City".into()));

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_mapping_view(frame, area, &table, &draft, 0, &theme);
            })
            .unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(content.contains("Main Location"));
        assert!(content.contains("Main City"));
        assert!(content.contains("(none)"));
    }

    #[test]
    fn test_render_mapping_view_tiny_area_does_not_panic() {
        let backend = TestBackend::new(20, 5);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::classic();
        let table = RawTable::new(vec!["A".into()], vec![]);

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_mapping_view(frame, area, &table, &DraftMapping::new(), 5, &theme);
            })
            .unwrap();
    }
}

use crate::themes::Theme;
use ratatui::text::{Line, Span};

/// Decoration placed either side of the application title.
pub const ACCENT: &str = "☎ ─ ☎";

/// Header rendering four lines:
///
/// 1. Application title with accents (ALL CAPS).
/// 2. A 60-column `=` separator.
/// 3. File and date-span information in `[ file | span ]` format.
/// 4. An empty line.
pub struct Header<'a> {
    /// File name of the loaded CDR file, if any.
    pub file: Option<&'a str>,
    /// Human-readable date span of the loaded data, if any.
    pub span: Option<String>,
    pub theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(file: Option<&'a str>, span: Option<String>, theme: &'a Theme) -> Self {
        Self { file, span, theme }
    }

    /// Render the header as a `Vec<Line>` containing exactly four lines.
    ///
    /// The returned lines are:
    ///
    /// 1. `"☎ ─ ☎ CDR ANALYZER ☎ ─ ☎"`
    /// 2. `"============================================================"` (60 `=` chars)
    /// 3. `"[ calls.csv | 2024-03-01 to 2024-03-17 ]"`
    /// 4. `""`
    pub fn to_lines(&self) -> Vec<Line<'a>> {
        let separator = "=".repeat(60);
        let file = self.file.unwrap_or("no file loaded").to_string();
        let span = self.span.clone().unwrap_or_else(|| "no dates".to_string());

        vec![
            Line::from(vec![
                Span::styled(ACCENT, self.theme.header_accent),
                Span::styled(" CDR ANALYZER ", self.theme.header),
                Span::styled(ACCENT, self.theme.header_accent),
            ]),
            Line::from(Span::styled(separator, self.theme.separator)),
            Line::from(vec![
                Span::styled("[ ", self.theme.label),
                Span::styled(file, self.theme.value),
                Span::styled(" | ", self.theme.label),
                Span::styled(span, self.theme.value),
                Span::styled(" ]", self.theme.label),
            ]),
            Line::from(""),
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

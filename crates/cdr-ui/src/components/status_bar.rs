use crate::themes::Theme;
use cdr_runtime::session::{StatusLevel, StatusLine};
use ratatui::text::{Line, Span};

/// A key binding shown in the footer, e.g. `("o", "open")`.
pub type KeyHint = (&'static str, &'static str);

/// Footer with the latest status message, an optional remediation hint and
/// the key bindings of the current screen.
pub struct StatusBar<'a> {
    pub status: &'a StatusLine,
    pub keys: &'a [KeyHint],
    pub theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(status: &'a StatusLine, keys: &'a [KeyHint], theme: &'a Theme) -> Self {
        Self {
            status,
            keys,
            theme,
        }
    }

    /// Symbol prefixed to the message for each level.
    pub fn symbol(&self) -> &'static str {
        match self.status.level {
            StatusLevel::Info => "●",
            StatusLevel::Busy => "⏳",
            StatusLevel::Warning => "⚠",
            StatusLevel::Error => "✖",
        }
    }

    /// Number of lines [`StatusBar::to_lines`] returns.
    pub fn height(&self) -> u16 {
        if self.status.hint.is_some() {
            3
        } else {
            2
        }
    }

    /// Render the footer.
    ///
    /// Format: `"● Loaded 3 rows from calls.csv"`, then the hint (if any),
    /// then `"o open  a analyze  q quit"`.
    pub fn to_lines(&self) -> Vec<Line<'a>> {
        let style = self.theme.status_style(self.status.level);
        let mut lines = vec![Line::from(vec![
            Span::styled(self.symbol(), style),
            Span::raw(" "),
            Span::styled(self.status.message.clone(), style),
        ])];

        if let Some(hint) = self.status.hint {
            lines.push(Line::from(Span::styled(format!("  {}", hint), self.theme.dim)));
        }

        let mut keys = Vec::with_capacity(self.keys.len() * 3);
        for (i, (key, action)) in self.keys.iter().enumerate() {
            if i > 0 {
                keys.push(Span::raw("  "));
            }
            keys.push(Span::styled(*key, self.theme.bold));
            keys.push(Span::styled(format!(" {}", action), self.theme.dim));
        }
        lines.push(Line::from(keys));
        lines
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Terminal colorization for validation output
//!
//! Applies ANSI escape codes to diagnostics and status lines using crossterm.

use crossterm::style::{Color, Stylize};
use erdiagram::er::{Diagnostic, Severity};

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Cyan,
    }
}

/// Format a diagnostic, coloring the severity and dimming the rule name
///
/// Plain output matches the diagnostic's `Display`.
pub fn colorize_diagnostic(diagnostic: &Diagnostic, colorize: bool) -> String {
    if !colorize {
        return diagnostic.to_string();
    }
    format!(
        "{}{}: {}: {}",
        diagnostic
            .severity
            .to_string()
            .with(severity_color(diagnostic.severity))
            .bold(),
        format!("[{}]", diagnostic.rule).dark_grey(),
        diagnostic.element,
        diagnostic.message
    )
}

/// Prefix a status line with a check mark or a cross
pub fn colorize_status(ok: bool, text: &str, colorize: bool) -> String {
    let (mark, color) = if ok {
        ("✓", Color::Green)
    } else {
        ("✗", Color::Red)
    };
    if colorize {
        format!("{} {}", mark.with(color).bold(), text)
    } else {
        format!("{} {}", mark, text)
    }
}

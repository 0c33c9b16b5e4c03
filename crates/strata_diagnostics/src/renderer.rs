//! Diagnostic rendering for human-readable terminal output.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use crate::sink::MessageHandler;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[E101]: unknown directive `@dependz`
///   --> layers/app/model/Customer.sc:3
///    |
///  3 | @dependz app.model.Order
///    |
///    = note: ...
/// ```
///
/// The source line is read from disk when the location carries a line number.
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let label = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return label;
        }
        let color = match diag.severity {
            Severity::Error => "31",
            Severity::Warning => "33",
            Severity::Note | Severity::Help => "36",
        };
        format!("\x1b[1;{color}m{label}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = format!("{}: {}\n", self.header(diag), diag.message);

        if let Some(loc) = &diag.location {
            out.push_str(&format!("  --> {loc}\n"));
            if let Some(line) = loc.line {
                if let Some(text) = source_line(&loc.path, line) {
                    let line_num = line.to_string();
                    let padding = " ".repeat(line_num.len());
                    out.push_str(&format!("{padding} |\n"));
                    out.push_str(&format!("{line_num} | {text}\n"));
                    out.push_str(&format!("{padding} |\n"));
                }
            }
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

fn source_line(path: &std::path::Path, line: u32) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    content
        .lines()
        .nth((line as usize).checked_sub(1)?)
        .map(|l| l.to_string())
}

/// Fallback [`MessageHandler`] that prints each diagnostic to stderr.
///
/// Diagnostics below `min_severity` are dropped.
pub struct StderrHandler {
    renderer: TerminalRenderer,
    min_severity: Severity,
}

impl StderrHandler {
    /// Creates a handler printing diagnostics at or above `min_severity`.
    pub fn new(color: bool, min_severity: Severity) -> Self {
        Self {
            renderer: TerminalRenderer::new(color),
            min_severity,
        }
    }
}

impl MessageHandler for StderrHandler {
    fn handle(&self, diag: &Diagnostic) {
        if diag.severity >= self.min_severity {
            eprint!("{}", self.renderer.render(diag));
        }
    }
}

//! Diagnostics for the metapp transformation pipeline
//!
//! A [`Diagnostic`] carries a severity, an optional code, a primary span and
//! any number of labels, notes and help lines. [`ErrorFormatter`] renders
//! them rustc-style against a [`SourceMap`], with optional ANSI colors.

use std::fmt;

pub use source_map::{FileId, SourceFile, SourceMap, SourcePosition, SourceSpan};

pub mod cpp;

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Note => write!(f, "note"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Primary,
    Secondary,
}

/// A message attached to a span of code
#[derive(Debug, Clone)]
pub struct Label {
    pub span: SourceSpan,
    pub message: String,
    pub style: LabelStyle,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: Option<String>,
    pub message: String,
    pub span: SourceSpan,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub help: Vec<String>,
}

/// Collection of diagnostics for one batch run
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
    }
}

/// Builder for creating diagnostics
pub struct DiagnosticBuilder {
    diagnostic: Diagnostic,
}

impl DiagnosticBuilder {
    fn with_severity(severity: DiagnosticSeverity, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            diagnostic: Diagnostic {
                severity,
                code: None,
                message: message.into(),
                span,
                labels: Vec::new(),
                notes: Vec::new(),
                help: Vec::new(),
            },
        }
    }

    pub fn error(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, message, span)
    }

    pub fn warning(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, message, span)
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.diagnostic.code = Some(code.into());
        self
    }

    pub fn label(mut self, span: SourceSpan, message: impl Into<String>) -> Self {
        self.diagnostic.labels.push(Label {
            span,
            message: message.into(),
            style: LabelStyle::Primary,
        });
        self
    }

    pub fn secondary_label(mut self, span: SourceSpan, message: impl Into<String>) -> Self {
        self.diagnostic.labels.push(Label {
            span,
            message: message.into(),
            style: LabelStyle::Secondary,
        });
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.diagnostic.notes.push(note.into());
        self
    }

    pub fn help(mut self, help_msg: impl Into<String>) -> Self {
        self.diagnostic.help.push(help_msg.into());
        self
    }

    pub fn build(self) -> Diagnostic {
        self.diagnostic
    }
}

/// Renders diagnostics with a source snippet and caret underline
#[derive(Default)]
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new() -> Self {
        Self { use_colors: false }
    }

    pub fn with_colors() -> Self {
        Self { use_colors: true }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_diagnostics(&self, diagnostics: &Diagnostics, source_map: &SourceMap) -> String {
        diagnostics
            .diagnostics
            .iter()
            .map(|d| self.format_diagnostic(d, source_map))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn format_diagnostic(&self, diagnostic: &Diagnostic, source_map: &SourceMap) -> String {
        let mut output = String::new();

        let severity_color = match diagnostic.severity {
            DiagnosticSeverity::Error => "\x1b[31m",
            DiagnosticSeverity::Warning => "\x1b[33m",
            DiagnosticSeverity::Note => "\x1b[36m",
        };
        let mut header = diagnostic.severity.to_string();
        if let Some(code) = &diagnostic.code {
            header.push_str(&format!("[{}]", code));
        }
        output.push_str(&self.paint(severity_color, &header));
        output.push_str(&format!(": {}\n", diagnostic.message));

        if let Some(file) = source_map.get_file(diagnostic.span.file_id) {
            let start = diagnostic.span.start;
            output.push_str(&format!(
                "  {} {}:{}:{}\n",
                self.paint("\x1b[96m", "-->"),
                file.name,
                start.line,
                start.column
            ));

            if let Some(line) = file.get_line(start.line) {
                let gutter = " ".repeat(start.line.to_string().len());
                let bar = self.paint("\x1b[96m", "|");
                output.push_str(&format!("{} {}\n", gutter, bar));
                output.push_str(&format!("{} {} {}\n", start.line, bar, line));

                let end_column = if diagnostic.span.end.line == start.line {
                    diagnostic.span.end.column
                } else {
                    line.len() + 1
                };
                let width = end_column.saturating_sub(start.column).max(1);
                let mut underline = format!(
                    "{} {} {}{}",
                    gutter,
                    bar,
                    " ".repeat(start.column.saturating_sub(1)),
                    self.paint(severity_color, &"^".repeat(width))
                );
                if let Some(label) = diagnostic
                    .labels
                    .iter()
                    .find(|l| l.style == LabelStyle::Primary)
                {
                    underline.push(' ');
                    underline.push_str(&self.paint(severity_color, &label.message));
                }
                output.push_str(&underline);
                output.push('\n');
            }
        }

        for label in diagnostic
            .labels
            .iter()
            .filter(|l| l.style == LabelStyle::Secondary)
        {
            if let Some(file) = source_map.get_file(label.span.file_id) {
                output.push_str(&format!(
                    "  {} {}:{}:{}: {}\n",
                    self.paint("\x1b[96m", "-->"),
                    file.name,
                    label.span.start.line,
                    label.span.start.column,
                    label.message
                ));
            }
        }

        for help_msg in &diagnostic.help {
            output.push_str(&format!("     {}: {}\n", self.paint("\x1b[32m", "help"), help_msg));
        }
        for note in &diagnostic.notes {
            output.push_str(&format!("{}: {}\n", self.paint("\x1b[34m", "note"), note));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(source_map: &mut SourceMap, text: &str, start: usize, end: usize) -> SourceSpan {
        let file_id = source_map.add_file("test.hpp".to_string(), text.to_string());
        source_map.span_from_offsets(file_id, start, end).unwrap()
    }

    #[test]
    fn test_diagnostic_builder() {
        let mut source_map = SourceMap::new();
        let span = span_at(&mut source_map, "class A {", 6, 7);

        let diagnostic = DiagnosticBuilder::error("test error", span.clone())
            .code("E0001")
            .label(span, "here")
            .help("try this")
            .note("additional info")
            .build();

        assert_eq!(diagnostic.severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostic.code.as_deref(), Some("E0001"));
        assert_eq!(diagnostic.labels.len(), 1);
        assert_eq!(diagnostic.help.len(), 1);
        assert_eq!(diagnostic.notes.len(), 1);
    }

    #[test]
    fn test_plain_formatting_points_at_column() {
        let mut source_map = SourceMap::new();
        let span = span_at(&mut source_map, "int x = ;\n", 8, 9);
        let diagnostic = DiagnosticBuilder::error("unexpected ';'", span.clone())
            .code("E0001")
            .label(span, "expected an expression")
            .build();

        let text = ErrorFormatter::new().format_diagnostic(&diagnostic, &source_map);
        assert!(text.starts_with("error[E0001]: unexpected ';'"));
        assert!(text.contains("--> test.hpp:1:9"));
        assert!(text.contains("1 | int x = ;"));
        assert!(text.contains("        ^ expected an expression"));
    }

    #[test]
    fn test_has_errors_ignores_warnings() {
        let mut source_map = SourceMap::new();
        let span = span_at(&mut source_map, "x", 0, 1);
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(DiagnosticBuilder::warning("careful", span.clone()).build());
        assert!(!diagnostics.has_errors());
        diagnostics.push(DiagnosticBuilder::error("broken", span).build());
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 2);
    }
}

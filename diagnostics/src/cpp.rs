//! Diagnostic builders for the C++ transformation
//!
//! Codes:
//! - `E0001` structural parse error (input the scope rules cannot consume)
//! - `E0002` `}` with no open scope
//! - `E0003` scope still open at end of input
//! - `E0010` meta-evaluator protocol failure

use crate::{Diagnostic, DiagnosticBuilder, SourceSpan};

pub struct CppDiagnostics;

impl CppDiagnostics {
    /// Input at `span` matched none of the rules of the enclosing scope
    pub fn structural_parse_error(span: SourceSpan, residual: &str, scope: &str) -> Diagnostic {
        let first_line = residual.lines().next().unwrap_or("").trim();
        DiagnosticBuilder::error(
            format!("could not parse `{}`", truncate(first_line, 60)),
            span.clone(),
        )
        .code("E0001")
        .label(span, format!("no {} rule matches here", scope))
        .help("only the subset of C++ declarations understood by metapp may appear here")
        .build()
    }

    pub fn unexpected_scope_close(span: SourceSpan) -> Diagnostic {
        DiagnosticBuilder::error("unexpected '}'", span.clone())
            .code("E0002")
            .label(span, "no scope is open at this point")
            .build()
    }

    /// `open_span` points at the header of the innermost open scope
    pub fn unterminated_scope(end_span: SourceSpan, open_span: SourceSpan, scope: &str) -> Diagnostic {
        DiagnosticBuilder::error(format!("unterminated {}", scope), end_span.clone())
            .code("E0003")
            .label(end_span, "input ends here")
            .secondary_label(open_span, format!("{} opened here", scope))
            .help("add the missing '}'")
            .build()
    }

    pub fn protocol_error(span: SourceSpan, generator: &str, message: &str) -> Diagnostic {
        DiagnosticBuilder::error(
            format!("meta evaluator failed while applying `{}`", generator),
            span.clone(),
        )
        .code("E0010")
        .label(span, "generated for this class")
        .note(message.to_string())
        .build()
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceMap;

    #[test]
    fn test_structural_error_truncates_long_lines() {
        let mut source_map = SourceMap::new();
        let long = format!("@@@ {}", "x".repeat(100));
        let file_id = source_map.add_file("a.hpp".to_string(), long.clone());
        let span = source_map.span_from_offsets(file_id, 0, 3).unwrap();

        let diagnostic = CppDiagnostics::structural_parse_error(span, &long, "namespace");
        assert_eq!(diagnostic.code.as_deref(), Some("E0001"));
        assert!(diagnostic.message.ends_with("...`"));
        assert_eq!(diagnostic.labels[0].message, "no namespace rule matches here");
    }

    #[test]
    fn test_unterminated_scope_has_two_labels() {
        let mut source_map = SourceMap::new();
        let file_id = source_map.add_file("b.hpp".to_string(), "class A {\n".to_string());
        let open = source_map.span_from_offsets(file_id, 0, 9).unwrap();
        let end = source_map.span_from_offsets(file_id, 10, 10).unwrap();

        let diagnostic = CppDiagnostics::unterminated_scope(end, open, "class");
        assert_eq!(diagnostic.code.as_deref(), Some("E0003"));
        assert_eq!(diagnostic.labels.len(), 2);
        assert_eq!(diagnostic.message, "unterminated class");
    }
}

//! Incremental parsing over a line-fed window
//!
//! The grammar rules are complete parsers: a rule that fails on the current
//! window may succeed once more lines arrive. The feeder grows the window a
//! line at a time until a step consumes something, and only when the input is
//! exhausted does a stuck window become a structural error.

use std::fmt;

use diagnostics::cpp::CppDiagnostics;
use diagnostics::{Diagnostic, FileId, SourceMap};

use crate::cpp_ast::Namespace;
use crate::cpp_parser::{blank_len, is_blank};
use crate::nesting::{NestingError, NestingParser, ScopeKind};

/// Window over `source` from the first unconsumed byte to the last fed line
#[derive(Debug, Clone)]
pub struct LineFeeder<'s> {
    source: &'s str,
    pos: usize,
    fed_end: usize,
}

impl<'s> LineFeeder<'s> {
    pub fn new(source: &'s str) -> Self {
        LineFeeder {
            source,
            pos: 0,
            fed_end: 0,
        }
    }

    pub fn window(&self) -> &'s str {
        &self.source[self.pos..self.fed_end]
    }

    /// Extend the window by one line; false once the source is exhausted
    pub fn feed_line(&mut self) -> bool {
        if self.fed_end == self.source.len() {
            return false;
        }
        self.fed_end = match self.source[self.fed_end..].find('\n') {
            Some(nl) => self.fed_end + nl + 1,
            None => self.source.len(),
        };
        true
    }

    pub fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.fed_end);
    }

    /// Absolute offset of the window start
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// How driving a source ended
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEnd<'s> {
    /// Everything consumed; `trailing` is whitespace and comments
    Complete { trailing: &'s str },
    /// Input exhausted with a window no step could consume
    Stalled { offset: usize, residual: &'s str },
}

/// Feed `source` to `step` line by line
///
/// `step` receives the current window and returns how many bytes it consumed,
/// or `None` when it needs more input.
pub fn drive<'s, E>(
    source: &'s str,
    mut step: impl FnMut(&'s str) -> Result<Option<usize>, E>,
) -> Result<FeedEnd<'s>, E> {
    let mut feeder = LineFeeder::new(source);
    loop {
        let window = feeder.window();
        if is_blank(window) {
            if !feeder.feed_line() {
                return Ok(FeedEnd::Complete { trailing: window });
            }
            continue;
        }
        match step(window)? {
            Some(n) if n > 0 => feeder.consume(n),
            _ => {
                if !feeder.feed_line() {
                    return Ok(FeedEnd::Stalled {
                        offset: feeder.position(),
                        residual: window,
                    });
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseFailure {
    /// No rule of the enclosing scope matches the text at `offset`
    Structural {
        offset: usize,
        residual: String,
        scope: ScopeKind,
    },
    Nesting(NestingError),
}

impl ParseFailure {
    /// Failure for a stalled window, pointing past its leading blanks
    pub fn structural(offset: usize, residual: &str, scope: ScopeKind) -> Self {
        let skipped = blank_len(residual);
        ParseFailure::Structural {
            offset: offset + skipped,
            residual: residual[skipped..].trim_end().to_string(),
            scope,
        }
    }

    pub fn to_diagnostic(&self, source_map: &SourceMap, file_id: FileId) -> Diagnostic {
        match self {
            ParseFailure::Structural {
                offset,
                residual,
                scope,
            } => {
                let first_line = residual.lines().next().unwrap_or("").len().max(1);
                let span = source_map.span_or_file_start(file_id, *offset, offset + first_line);
                CppDiagnostics::structural_parse_error(span, residual, &scope.to_string())
            }
            ParseFailure::Nesting(e) => e.to_diagnostic(source_map, file_id),
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::Structural {
                offset,
                residual,
                scope,
            } => write!(
                f,
                "no {} rule matches `{}` at offset {}",
                scope,
                residual.lines().next().unwrap_or(""),
                offset
            ),
            ParseFailure::Nesting(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseFailure::Nesting(e) => Some(e),
            ParseFailure::Structural { .. } => None,
        }
    }
}

impl From<NestingError> for ParseFailure {
    fn from(e: NestingError) -> Self {
        ParseFailure::Nesting(e)
    }
}

/// Parse a whole file into its global namespace
pub fn parse_source(source: &str) -> Result<Namespace, ParseFailure> {
    let mut parser = NestingParser::new();
    let end = drive(source, |window| {
        Ok::<_, NestingError>(parser.step(window)?.map(|step| step.consumed))
    })?;
    match end {
        FeedEnd::Complete { .. } => Ok(parser.finish()?),
        FeedEnd::Stalled { offset, residual } => Err(ParseFailure::structural(
            offset,
            residual,
            parser.current_kind(),
        )),
    }
}

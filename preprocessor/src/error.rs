//! Errors that abort the transformation of one file

use diagnostics::cpp::CppDiagnostics;
use diagnostics::{Diagnostic, FileId, SourceMap};
use parser::{NestingError, ParseFailure};
use std::fmt;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::evaluator::ProtocolError;

#[derive(Debug)]
pub enum TransformError {
    /// Structural parse failure or a broken scope nesting
    Parse(ParseFailure),
    /// The evaluator failed while expanding a meta-class instance
    Protocol {
        generator: String,
        class: String,
        /// Offset of the meta-class header in the source
        offset: usize,
        source: ProtocolError,
    },
    /// The evaluator could not be started or did not complete the handshake
    Evaluator(ProtocolError),
    Io { path: PathBuf, source: std::io::Error },
    Config(ConfigError),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::Parse(e) => write!(f, "{}", e),
            TransformError::Protocol {
                generator,
                class,
                source,
                ..
            } => write!(
                f,
                "expanding meta-class {} with {} failed: {}",
                class, generator, source
            ),
            TransformError::Evaluator(e) => write!(f, "{}", e),
            TransformError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            TransformError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransformError::Parse(e) => Some(e),
            TransformError::Protocol { source, .. } => Some(source),
            TransformError::Evaluator(e) => Some(e),
            TransformError::Io { source, .. } => Some(source),
            TransformError::Config(e) => Some(e),
        }
    }
}

impl From<ParseFailure> for TransformError {
    fn from(e: ParseFailure) -> Self {
        TransformError::Parse(e)
    }
}

impl From<NestingError> for TransformError {
    fn from(e: NestingError) -> Self {
        TransformError::Parse(ParseFailure::Nesting(e))
    }
}

impl From<ConfigError> for TransformError {
    fn from(e: ConfigError) -> Self {
        TransformError::Config(e)
    }
}

impl TransformError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransformError::Io {
            path: path.into(),
            source,
        }
    }

    /// Source-located report; `None` for errors without a position
    pub fn to_diagnostic(&self, source_map: &SourceMap, file_id: FileId) -> Option<Diagnostic> {
        match self {
            TransformError::Parse(e) => Some(e.to_diagnostic(source_map, file_id)),
            TransformError::Protocol {
                generator,
                class,
                offset,
                source,
            } => {
                let span =
                    source_map.span_or_file_start(file_id, *offset, offset + class.len().max(1));
                Some(CppDiagnostics::protocol_error(
                    span,
                    generator,
                    &source.to_string(),
                ))
            }
            TransformError::Evaluator(_) | TransformError::Io { .. } | TransformError::Config(_) => {
                None
            }
        }
    }
}

//! C++ declaration parser for metapp
//!
//! A nom grammar over `&str` recognizing the declarations that open and close
//! scopes, and a nesting stack driver that tracks those scopes over input
//! delivered a line at a time.

pub mod cpp_ast;
pub mod cpp_parser;
pub mod cpp_parser_decls;
pub mod cpp_parser_expr;
pub mod cpp_parser_types;
pub mod custom_error;
pub mod incremental;
pub mod nesting;

// Re-export diagnostics from the diagnostics crate
pub use diagnostics::*;

pub use cpp_ast::*;
pub use cpp_parser_decls::MetaClassHeader;
pub use incremental::{drive, parse_source, FeedEnd, LineFeeder, ParseFailure};
pub use nesting::{
    ClosedScope, Declaration, Nesting, NestingError, NestingParser, NodeRef, ParseEvent,
    ScopeKind, Step,
};

//! Custom error type that captures context strings from nom's context() combinator
//!
//! Progress is measured by how little input was left when a branch failed:
//! the error with the shortest remaining input got furthest.

use nom::error::{ContextError, ErrorKind, FromExternalError, ParseError};

/// A context label and the length of the input left where it was attached
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWithLocation {
    pub context: &'static str,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextualError<I> {
    pub input: I,
    pub code: ErrorKind,
    pub contexts: Vec<ContextWithLocation>,
}

impl<I: AsRef<str>> ContextualError<I> {
    pub fn new(input: I, code: ErrorKind) -> Self {
        Self {
            input,
            code,
            contexts: Vec::new(),
        }
    }

    /// Remaining input length at the deepest failure
    pub fn remaining(&self) -> usize {
        self.contexts
            .iter()
            .map(|c| c.remaining)
            .chain(std::iter::once(self.input.as_ref().len()))
            .min()
            .unwrap_or(0)
    }

    /// Byte offset of the deepest failure inside `full`
    pub fn offset_in(&self, full: &str) -> usize {
        full.len().saturating_sub(self.remaining())
    }

    /// The innermost context label, if any
    pub fn deepest_context(&self) -> Option<&'static str> {
        self.contexts
            .iter()
            .min_by_key(|c| c.remaining)
            .map(|c| c.context)
    }
}

impl<I: AsRef<str>> ParseError<I> for ContextualError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        Self::new(input, kind)
    }

    fn append(input: I, kind: ErrorKind, other: Self) -> Self {
        if other.remaining() <= input.as_ref().len() {
            other
        } else {
            Self::new(input, kind)
        }
    }

    fn or(self, other: Self) -> Self {
        // alt() keeps the branch that got furthest
        let (mine, theirs) = (self.remaining(), other.remaining());
        if mine < theirs || (mine == theirs && self.contexts.len() >= other.contexts.len()) {
            self
        } else {
            other
        }
    }
}

impl<I: AsRef<str>> ContextError<I> for ContextualError<I> {
    fn add_context(input: I, ctx: &'static str, mut other: Self) -> Self {
        let remaining = other.input.as_ref().len().min(input.as_ref().len());
        other.contexts.push(ContextWithLocation {
            context: ctx,
            remaining,
        });
        other
    }
}

impl<I: AsRef<str>, E> FromExternalError<I, E> for ContextualError<I> {
    fn from_external_error(input: I, kind: ErrorKind, _e: E) -> Self {
        Self::new(input, kind)
    }
}

impl<I: AsRef<str>> std::fmt::Display for ContextualError<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.deepest_context() {
            Some(context) => write!(f, "expected {}", context),
            None => {
                let rest: String = self.input.as_ref().chars().take(20).collect();
                write!(f, "error {:?} at: {}", self.code, rest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nom::{bytes::complete::tag, error::context, IResult, Parser};

    type TestResult<'a, T> = IResult<&'a str, T, ContextualError<&'a str>>;

    fn hello(input: &str) -> TestResult<&str> {
        context("'hello'", tag("hello")).parse(input)
    }

    fn hello_world(input: &str) -> TestResult<(&str, &str)> {
        context("greeting", (tag("hello "), context("'world'", tag("world")))).parse(input)
    }

    #[test]
    fn test_context_capture() {
        match hello("world") {
            Err(nom::Err::Error(e)) => {
                assert_eq!(e.contexts[0].context, "'hello'");
                assert_eq!(e.to_string(), "expected 'hello'");
            }
            _ => panic!("Expected error with context"),
        }
    }

    #[test]
    fn test_deepest_failure_offset() {
        let input = "hello there";
        match hello_world(input) {
            Err(nom::Err::Error(e)) => {
                assert_eq!(e.offset_in(input), 6);
                assert_eq!(e.deepest_context(), Some("'world'"));
            }
            _ => panic!("Expected error"),
        }
    }

    #[test]
    fn test_or_keeps_furthest_branch() {
        let input = "abcdef";
        let shallow = ContextualError::new(input, ErrorKind::Tag);
        let deep = ContextualError::new(&input[4..], ErrorKind::Char);
        let kept = shallow.or(deep);
        assert_eq!(kept.code, ErrorKind::Char);
        assert_eq!(kept.offset_in(input), 4);
    }
}

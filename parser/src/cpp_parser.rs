//! Lexical layer of the C++ grammar
//!
//! Every rule skips leading whitespace and comments itself (`ws`) and never
//! requires trailing whitespace, so a declaration may arrive split over
//! several chunks. The balanced-run scanner backs the opaque statement and
//! declaration rules: it walks tokens it does not understand while keeping
//! brackets, string and character literals and comments intact.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while},
    character::complete::{char, multispace1, satisfy, space0},
    combinator::{not, opt, recognize, value, verify},
    error::ErrorKind,
    multi::{many0, many1},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

use crate::cpp_ast::{Access, Directive};
use crate::custom_error::ContextualError;

/// Parser result type with contextual errors to capture context strings
pub type PResult<'a, T> = IResult<&'a str, T, ContextualError<&'a str>>;

/// A recoverable failure at `input`
pub(crate) fn fail<T>(input: &str, kind: ErrorKind) -> PResult<'_, T> {
    Err(nom::Err::Error(ContextualError::new(input, kind)))
}

// =============================================================================
// Whitespace and Comments
// =============================================================================

/// Skip whitespace and comments
pub fn ws(input: &str) -> PResult<()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), line_comment),
            value((), block_comment),
        ))),
    )
    .parse(input)
}

/// Skip whitespace and comments, require at least some
pub fn ws1(input: &str) -> PResult<()> {
    value(
        (),
        many1(alt((
            value((), multispace1),
            value((), line_comment),
            value((), block_comment),
        ))),
    )
    .parse(input)
}

/// Line comment: `// comment`, the newline is left for `ws`
fn line_comment(input: &str) -> PResult<&str> {
    recognize((tag("//"), take_while(|c: char| c != '\n'))).parse(input)
}

/// Block comment: `/* comment */`
fn block_comment(input: &str) -> PResult<&str> {
    recognize((tag("/*"), take_until("*/"), tag("*/"))).parse(input)
}

/// Length of the whitespace and comments at the start of `input`
pub fn blank_len(input: &str) -> usize {
    match ws(input) {
        Ok((rest, _)) => input.len() - rest.len(),
        Err(_) => 0,
    }
}

/// True when `input` holds nothing but whitespace and comments
pub fn is_blank(input: &str) -> bool {
    matches!(ws(input), Ok((rest, _)) if rest.is_empty())
}

// =============================================================================
// Basic Elements
// =============================================================================

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Words that can never name a type, variable or function
pub(crate) fn is_keyword(s: &str) -> bool {
    matches!(
        s,
        "alignas" | "alignof" | "break" | "case" | "catch" | "char" | "class" | "const"
            | "consteval" | "constexpr" | "constinit" | "continue" | "default" | "delete"
            | "do" | "double" | "else" | "enum" | "explicit" | "export" | "extern" | "false"
            | "float" | "for" | "friend" | "goto" | "if" | "inline" | "int" | "long"
            | "mutable" | "namespace" | "new" | "noexcept" | "nullptr" | "operator"
            | "private" | "protected" | "public" | "return" | "short" | "signed" | "static"
            | "struct" | "switch" | "template" | "thread_local" | "throw" | "true" | "try"
            | "typedef" | "typename" | "union" | "unsigned" | "using" | "virtual"
            | "volatile" | "while"
    )
}

/// Identifier text without keyword filtering or leading whitespace
pub(crate) fn raw_identifier(input: &str) -> PResult<&str> {
    recognize((
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))
    .parse(input)
}

/// Parse a keyword
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (input, _) = ws(input)?;
        terminated(tag(kw), not(satisfy(is_ident_char))).parse(input)
    }
}

/// Parse an identifier
pub fn identifier(input: &str) -> PResult<String> {
    let (input, _) = ws(input)?;
    let (input, id) = verify(raw_identifier, |s: &str| !is_keyword(s)).parse(input)?;
    Ok((input, id.to_string()))
}

/// Parse a symbol with whitespace
pub fn symbol<'a>(sym: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (input, _) = ws(input)?;
        tag(sym)(input)
    }
}

/// Byte offset of `current` inside `full`
pub fn position(full: &str, current: &str) -> usize {
    full.len() - current.len()
}

/// `[[nodiscard]]`, `[[deprecated("x")]]`
pub fn attribute(input: &str) -> PResult<&str> {
    preceded(ws, recognize((tag("[["), take_until("]]"), tag("]]")))).parse(input)
}

/// Body of a quoted literal starting at `input`, escapes kept verbatim
pub(crate) fn quoted_body(input: &str, quote: char) -> PResult<&str> {
    let (rest, _) = char(quote)(input)?;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\n' => break,
            c if c == quote => return Ok((&rest[i + 1..], &rest[..i])),
            _ => {}
        }
    }
    fail(input, ErrorKind::Char)
}

// =============================================================================
// Scope punctuation
// =============================================================================

/// `{`
pub fn scope_open(input: &str) -> PResult<&str> {
    symbol("{")(input)
}

/// `}` with an optional `;`; yields the offset of the brace inside `input`
pub fn scope_close(input: &str) -> PResult<usize> {
    let (rest, _) = ws(input)?;
    let brace = position(input, rest);
    let (rest, _) = char('}')(rest)?;
    let (rest, _) = opt(preceded(ws, char(';'))).parse(rest)?;
    Ok((rest, brace))
}

/// `;` on its own
pub fn empty_declaration(input: &str) -> PResult<&str> {
    symbol(";")(input)
}

/// `public:`, `protected:`, `private:`
pub fn access_specifier(input: &str) -> PResult<Access> {
    terminated(
        alt((
            value(Access::Public, keyword("public")),
            value(Access::Protected, keyword("protected")),
            value(Access::Private, keyword("private")),
        )),
        (symbol(":"), not(char(':'))),
    )
    .parse(input)
}

// =============================================================================
// Preprocessor directives
// =============================================================================

/// `#...` up to the end of the line, following backslash continuations
pub fn directive(input: &str) -> PResult<Directive> {
    let (start, _) = ws(input)?;
    let (_, _) = char('#')(start)?;

    let mut end = 0;
    loop {
        match start[end..].find('\n') {
            Some(nl) => {
                let line_end = end + nl;
                if start[..line_end].trim_end_matches('\r').ends_with('\\') {
                    end = line_end + 1;
                } else {
                    end = line_end;
                    break;
                }
            }
            None => {
                if start.ends_with('\\') || (end > 0 && end == start.len()) {
                    // the continuation line has not arrived yet
                    return fail(start, ErrorKind::Eof);
                }
                end = start.len();
                break;
            }
        }
    }

    let text = start[..end].trim_end_matches('\r');
    let include = include_path(text).ok().map(|(_, path)| path);
    Ok((
        &start[end..],
        Directive {
            text: text.to_string(),
            include,
        },
    ))
}

/// `#include <path>` or `#include "path"`
pub fn include_path(input: &str) -> PResult<String> {
    let (input, _) = char('#')(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = tag("include")(input)?;
    let (input, _) = space0(input)?;
    let (input, path) = alt((
        delimited(char('<'), is_not(">\n"), char('>')),
        delimited(char('"'), is_not("\"\n"), char('"')),
    ))
    .parse(input)?;
    Ok((input, path.to_string()))
}

// =============================================================================
// Balanced token runs
// =============================================================================

/// How a balanced run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// `;` at bracket depth zero
    Semicolon,
    /// `}` closing the enclosing scope
    CloseBrace,
    /// `{` at bracket depth zero
    OpenBrace,
}

enum Token {
    Structural(usize, u8),
    End,
    Unterminated,
}

/// Walks bytes, skipping literals and comments, yielding bracket and separator bytes
struct Tokens<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a str) -> Self {
        Tokens {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn skip_quoted(&mut self, quote: u8) -> bool {
        let mut i = self.pos + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => return false,
                b if b == quote => {
                    self.pos = i + 1;
                    return true;
                }
                _ => i += 1,
            }
        }
        false
    }

    fn next(&mut self) -> Token {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'"' => {
                    if !self.skip_quoted(b'"') {
                        return Token::Unterminated;
                    }
                }
                // a quote after a digit is a digit separator
                b'\'' if self.pos == 0 || !is_ident_byte(self.bytes[self.pos - 1]) => {
                    if !self.skip_quoted(b'\'') {
                        return Token::Unterminated;
                    }
                }
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    match self.bytes[self.pos..].iter().position(|&c| c == b'\n') {
                        Some(nl) => self.pos += nl,
                        None => self.pos = self.bytes.len(),
                    }
                }
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    let body = &self.bytes[self.pos + 2..];
                    match body.windows(2).position(|w| w == b"*/") {
                        Some(close) => self.pos += close + 4,
                        None => return Token::Unterminated,
                    }
                }
                b'(' | b')' | b'[' | b']' | b'{' | b'}' | b';' | b',' => {
                    self.pos += 1;
                    return Token::Structural(self.pos - 1, b);
                }
                _ => self.pos += 1,
            }
        }
        Token::End
    }
}

fn closer_for(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

/// Scan a run of balanced tokens and report where and how it ends
///
/// Returns `None` when the run is incomplete (more input needed) or a closing
/// bracket does not match.
pub fn balanced_run(input: &str, stop_at_open_brace: bool) -> Option<(usize, RunEnd)> {
    let mut tokens = Tokens::new(input);
    let mut stack: Vec<u8> = Vec::new();
    loop {
        match tokens.next() {
            Token::Structural(at, b) => match b {
                b'{' if stack.is_empty() && stop_at_open_brace => {
                    return Some((at, RunEnd::OpenBrace))
                }
                b'(' | b'[' | b'{' => stack.push(b),
                b'}' if stack.is_empty() => return Some((at, RunEnd::CloseBrace)),
                b')' | b']' | b'}' => match stack.pop() {
                    Some(open) if closer_for(open) == b => {}
                    _ => return None,
                },
                b';' if stack.is_empty() => return Some((at, RunEnd::Semicolon)),
                _ => {}
            },
            Token::End | Token::Unterminated => return None,
        }
    }
}

/// Offset of the bracket closing the one just before `input`
pub fn matching_close(input: &str, open: u8) -> Option<usize> {
    let mut tokens = Tokens::new(input);
    let mut stack = vec![open];
    loop {
        match tokens.next() {
            Token::Structural(at, b) => match b {
                b'(' | b'[' | b'{' => stack.push(b),
                b')' | b']' | b'}' => match stack.pop() {
                    Some(o) if closer_for(o) == b => {
                        if stack.is_empty() {
                            return Some(at);
                        }
                    }
                    _ => return None,
                },
                _ => {}
            },
            Token::End | Token::Unterminated => return None,
        }
    }
}

/// Offset of the first `,` or unmatched closing bracket at depth zero
pub fn list_item_end(input: &str) -> Option<usize> {
    let mut tokens = Tokens::new(input);
    let mut depth = 0usize;
    loop {
        match tokens.next() {
            Token::Structural(at, b) => match b {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' if depth == 0 => return Some(at),
                b')' | b']' | b'}' => depth -= 1,
                b',' if depth == 0 => return Some(at),
                _ => {}
            },
            Token::End | Token::Unterminated => return None,
        }
    }
}

/// Offset where an initializer or default argument ends: the first `,` or
/// `;` at depth zero, or an unmatched closing bracket
pub fn value_end(input: &str) -> Option<usize> {
    let mut tokens = Tokens::new(input);
    let mut depth = 0usize;
    loop {
        match tokens.next() {
            Token::Structural(at, b) => match b {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' if depth == 0 => return Some(at),
                b')' | b']' | b'}' => depth -= 1,
                b',' | b';' if depth == 0 => return Some(at),
                _ => {}
            },
            Token::End | Token::Unterminated => return None,
        }
    }
}

/// A bracketed group `(...)`, `[...]` or `{...}` as written, brackets included
pub fn bracket_group(input: &str) -> PResult<&str> {
    let (start, _) = ws(input)?;
    let open = match start.as_bytes().first() {
        Some(&b) if b == b'(' || b == b'[' || b == b'{' => b,
        _ => return fail(start, ErrorKind::Char),
    };
    match matching_close(&start[1..], open) {
        Some(close) => Ok((&start[close + 2..], &start[..close + 2])),
        None => fail(start, ErrorKind::TakeUntil),
    }
}

fn group_opening_with(input: &str, open: char) -> PResult<&str> {
    let (rest, group) = bracket_group(input)?;
    if group.starts_with(open) {
        Ok((rest, group))
    } else {
        fail(input, ErrorKind::Char)
    }
}

pub fn paren_group(input: &str) -> PResult<&str> {
    group_opening_with(input, '(')
}

pub fn square_group(input: &str) -> PResult<&str> {
    group_opening_with(input, '[')
}

pub fn brace_group(input: &str) -> PResult<&str> {
    group_opening_with(input, '{')
}

/// Balanced run ending in `;`, used for declarations this grammar does not model
pub fn opaque_declaration(input: &str) -> PResult<&str> {
    let (start, _) = ws(input)?;
    match balanced_run(start, false) {
        Some((end, RunEnd::Semicolon)) => Ok((&start[end + 1..], &start[..end + 1])),
        _ => fail(start, ErrorKind::TakeUntil),
    }
}

/// Statement inside a function body: up to `;`, or up to the scope's `}`
pub fn opaque_statement(input: &str) -> PResult<&str> {
    let (start, _) = ws(input)?;
    match balanced_run(start, false) {
        Some((end, RunEnd::Semicolon)) => Ok((&start[end + 1..], &start[..end + 1])),
        Some((end, RunEnd::CloseBrace)) if !is_blank(&start[..end]) => {
            Ok((&start[end..], &start[..end]))
        }
        _ => fail(start, ErrorKind::TakeUntil),
    }
}

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "try", "catch", "case", "default",
];

/// Head of a nested block such as `if (x) {`, `else {` or `[&](int a) {`
pub fn block_head(input: &str) -> PResult<&str> {
    let (start, _) = ws(input)?;
    let end = match balanced_run(start, true) {
        Some((end, RunEnd::OpenBrace)) if end > 0 => end,
        _ => return fail(start, ErrorKind::TakeUntil),
    };
    let head = start[..end].trim_end();
    let first_word = raw_identifier(head).map(|(_, w)| w).unwrap_or("");
    let opens_block = CONTROL_KEYWORDS.contains(&first_word)
        || head.ends_with(')')
        || head.ends_with(']')
        || head.ends_with("mutable")
        || head.ends_with(':');
    if opens_block {
        Ok((&start[end + 1..], &start[..end + 1]))
    } else {
        fail(start, ErrorKind::Verify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_skips_comments() {
        let (rest, _) = ws("  // line\n /* block */ x").unwrap();
        assert_eq!(rest, "x");
        assert!(is_blank(" /* a */ // b\n"));
        assert!(!is_blank(" /* unterminated"));
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        assert!(keyword("class")(" class Foo").is_ok());
        assert!(keyword("class")("classic").is_err());
        assert!(identifier("const_value").is_ok());
        assert!(identifier("const").is_err());
    }

    #[test]
    fn test_balanced_run_endings() {
        assert_eq!(balanced_run("f(a; b);", false), Some((7, RunEnd::Semicolon)));
        assert_eq!(balanced_run("x = \"};\" }", false), Some((9, RunEnd::CloseBrace)));
        assert_eq!(balanced_run("if (x) {", true), Some((7, RunEnd::OpenBrace)));
        assert_eq!(balanced_run("g(1,", false), None);
        assert_eq!(balanced_run("a = 1'000;", false), Some((9, RunEnd::Semicolon)));
        assert_eq!(balanced_run("c = '}';", false), Some((7, RunEnd::Semicolon)));
    }

    #[test]
    fn test_directive_with_continuation() {
        let (rest, d) = directive("#define X \\\n  1\nint y;").unwrap();
        assert_eq!(d.text, "#define X \\\n  1");
        assert_eq!(rest, "\nint y;");
        assert!(d.include.is_none());
        assert!(directive("#define Y \\\n").is_err());

        let (_, inc) = directive("  #include <vector>\n").unwrap();
        assert_eq!(inc.include.as_deref(), Some("vector"));
        let (_, inc) = directive("# include \"meta.hpp\"\n").unwrap();
        assert_eq!(inc.include.as_deref(), Some("meta.hpp"));
    }

    #[test]
    fn test_scope_close_reports_brace() {
        let (rest, brace) = scope_close("\n  };\nint x;").unwrap();
        assert_eq!(brace, 3);
        assert_eq!(rest, "\nint x;");
    }

    #[test]
    fn test_block_head() {
        assert!(block_head("if (a < b) {").is_ok());
        assert!(block_head("} else {").is_err());
        assert!(block_head("else {").is_ok());
        assert!(block_head("auto f = [&](int a) {").is_ok());
        assert!(block_head("x = {").is_err());
    }

    #[test]
    fn test_bracket_group() {
        let (rest, group) = bracket_group(" (a, (b)) c").unwrap();
        assert_eq!(group, "(a, (b))");
        assert_eq!(rest, " c");
        assert!(brace_group(" (a)").is_err());
        assert_eq!(value_end("f(a, b), c"), Some(7));
        assert_eq!(value_end("x)"), Some(1));
    }
}

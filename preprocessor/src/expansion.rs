//! Meta-class expansion over the nesting driver
//!
//! The expander sits between the line feeder and the [`NestingParser`]. It
//! copies every consumed chunk to the output, rewriting three things on the
//! way:
//!
//! - `generator Name {` headers of known generators become `class Name {`,
//!   and the text the evaluator produces for the finished class is spliced
//!   right after its closing `};`
//! - `constexpr` is dropped from meta functions (generators defined in the
//!   file), whose names are collected for the dispatch entry point
//! - with reflection on, classes get a friend grant before their closing
//!   brace and specializations are emitted after the outermost scope closes

use indexmap::IndexSet;
use log::{debug, trace};
use parser::cpp_parser::{blank_len, is_blank, scope_close};
use parser::cpp_parser_decls::meta_class_open;
use parser::{
    Class, ClosedScope, Declaration, Namespace, Nesting, NestingParser, NodeRef, ParseEvent,
    ScopeKind,
};

use crate::error::TransformError;
use crate::evaluator::Evaluator;
use crate::reflection;

#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionState {
    Idle,
    /// Inside the body of a generator function opened at `depth`
    InsideMetaFunction { depth: usize },
    /// Inside a meta-class instance opened at `depth`
    InsideMetaClassBody {
        generator: String,
        class_name: String,
        depth: usize,
        /// Offset of the instance's header
        offset: usize,
    },
}

/// Everything an expanded file produced besides its text
#[derive(Debug, Clone, PartialEq)]
pub struct Expanded {
    pub body: String,
    /// Paths of the `#include` directives, in order
    pub includes: Vec<String>,
    /// Generators defined in this file, qualified by their enclosing scopes
    pub discovered: IndexSet<String>,
    pub global: Namespace,
}

/// Per-file expansion context
pub struct Expander<'e> {
    driver: NestingParser,
    state: ExpansionState,
    evaluator: Option<&'e mut dyn Evaluator>,
    known: IndexSet<String>,
    discovered: IndexSet<String>,
    includes: Vec<String>,
    reflection: bool,
    /// Specializations waiting for the outermost scope to close
    pending: Vec<String>,
    out: String,
    /// Length of the whole source, to tell the last window apart
    source_len: usize,
}

/// Remove the first whole-word `constexpr`
fn strip_constexpr(text: &str) -> String {
    let mut search = 0;
    while let Some(found) = text[search..].find("constexpr") {
        let start = search + found;
        let end = start + "constexpr".len();
        let is_word_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
        let before = text[..start].chars().next_back().map_or(false, is_word_char);
        let after = text[end..].chars().next().map_or(false, is_word_char);
        if !before && !after {
            let rest = text[end..].trim_start_matches([' ', '\t']);
            return format!("{}{}", &text[..start], rest);
        }
        search = end;
    }
    text.to_string()
}

impl<'e> Expander<'e> {
    pub fn new(
        evaluator: Option<&'e mut dyn Evaluator>,
        reflection: bool,
        source_len: usize,
    ) -> Self {
        let known = evaluator
            .as_ref()
            .map(|e| e.generators().clone())
            .unwrap_or_default();
        Expander {
            driver: NestingParser::new(),
            state: ExpansionState::Idle,
            evaluator,
            known,
            discovered: IndexSet::new(),
            includes: Vec::new(),
            reflection,
            pending: Vec::new(),
            out: String::new(),
            source_len,
        }
    }

    pub fn state(&self) -> &ExpansionState {
        &self.state
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.driver.current_kind()
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    /// Consume a prefix of `window`; `None` when more input is needed
    pub fn step(&mut self, window: &str) -> Result<Option<usize>, TransformError> {
        trace!(
            "window at {}: {:?}",
            self.driver.offset(),
            window.lines().next().unwrap_or("")
        );
        if let Some(consumed) = self.try_meta_class(window) {
            return Ok(Some(consumed));
        }
        if self.awaiting_terminator(window) {
            return Ok(None);
        }

        let base = self.driver.offset();
        let step = match self.driver.step(window)? {
            Some(step) => step,
            None => return Ok(None),
        };
        let text = &window[..step.consumed];
        match step.event {
            ParseEvent::Opened(ScopeKind::Function) => self.opened_function(text),
            ParseEvent::Opened(kind) => {
                debug!("open {} at depth {}", kind, self.driver.depth());
                self.out.push_str(text);
            }
            ParseEvent::Closed { scope, brace } => self.closed(scope, text, brace - base)?,
            ParseEvent::Declared(Declaration::Enumeration(node)) => {
                self.out.push_str(text);
                self.queue_enum(&node);
                self.flush_at_top_level();
            }
            ParseEvent::Directive(directive) => {
                if let Some(path) = directive.include {
                    debug!("include {}", path);
                    self.includes.push(path);
                }
                self.out.push_str(text);
            }
            _ => self.out.push_str(text),
        }
        Ok(Some(step.consumed))
    }

    /// `generator Name [: bases] {` for a generator the evaluator offers
    fn try_meta_class(&mut self, window: &str) -> Option<usize> {
        if self.state != ExpansionState::Idle || self.known.is_empty() {
            return None;
        }
        if !matches!(
            self.driver.current_kind(),
            ScopeKind::Namespace | ScopeKind::Class
        ) {
            return None;
        }
        let known = &self.known;
        let is_generator = |name: &str| known.contains(name);
        let (rest, header) = meta_class_open(window, &is_generator).ok()?;
        let consumed = window.len() - rest.len();

        let span = header.generator_span;
        self.out.push_str(&window[..span.start]);
        self.out.push_str("class");
        self.out.push_str(&window[span.end..consumed]);

        let generator = header.generator.clone();
        let class_name = header.name.clone();
        let offset = self.driver.offset() + blank_len(window);
        let class = Class::from_header(header.into_class_header());
        self.driver.open_class(window, consumed, class);
        debug!(
            "meta-class {} with generator {} at depth {}",
            class_name,
            generator,
            self.driver.depth()
        );
        self.state = ExpansionState::InsideMetaClassBody {
            generator,
            class_name,
            depth: self.driver.depth(),
            offset,
        };
        Some(consumed)
    }

    /// A meta-class instance's `}` ends the window but a `;` may follow
    ///
    /// Generated text goes after the whole `};`, so the close waits for the
    /// next line unless the source has ended.
    fn awaiting_terminator(&self, window: &str) -> bool {
        let opened = match &self.state {
            ExpansionState::InsideMetaClassBody { depth, .. } => *depth,
            _ => return false,
        };
        if self.driver.depth() != opened || self.driver.offset() + window.len() >= self.source_len
        {
            return false;
        }
        match scope_close(window) {
            Ok((rest, _)) => {
                let closed = &window[..window.len() - rest.len()];
                is_blank(rest) && !closed.ends_with(';')
            }
            Err(_) => false,
        }
    }

    fn opened_function(&mut self, text: &str) {
        let depth = self.driver.depth();
        let meta_name = match (&self.state, self.driver.current()) {
            (ExpansionState::Idle, Some(Nesting::Function(function))) if function.is_constexpr => {
                if function.has_generator_shape() {
                    let mut path = self.driver.scope_path();
                    path.push(&function.name);
                    let qualified = path.join("::");
                    self.discovered.insert(qualified.clone());
                    Some(qualified)
                } else if self.known.contains(&function.name) {
                    Some(function.name.clone())
                } else {
                    None
                }
            }
            _ => None,
        };
        match meta_name {
            Some(name) => {
                debug!("meta function {} at depth {}", name, depth);
                let lead = blank_len(text);
                self.out.push_str(&text[..lead]);
                self.out.push_str(&strip_constexpr(&text[lead..]));
                self.state = ExpansionState::InsideMetaFunction { depth };
            }
            None => {
                debug!("open function at depth {}", depth);
                self.out.push_str(text);
            }
        }
    }

    fn closed(
        &mut self,
        scope: ClosedScope,
        text: &str,
        brace: usize,
    ) -> Result<(), TransformError> {
        let depth = self.driver.depth();
        debug!("close {:?} back to depth {}", scope, depth);
        match scope {
            ClosedScope::Class(node) => {
                let reflected = self.reflection
                    && !self.driver.inside_function()
                    && !self.driver.inside_templated_class();
                match self.driver.class_at(&node) {
                    Some(class) if reflected => {
                        self.out.push_str(&text[..brace]);
                        self.out.push_str(&reflection::friend_declaration(&class.name));
                        self.out.push_str(&text[brace..]);
                    }
                    _ => self.out.push_str(text),
                }
                self.expand_meta_class(&node, depth)?;
                if reflected {
                    self.queue_class(&node);
                }
            }
            ClosedScope::Function(_) | ClosedScope::Block => {
                self.out.push_str(text);
                if let ExpansionState::InsideMetaFunction { depth: opened } = self.state {
                    if depth < opened {
                        self.state = ExpansionState::Idle;
                    }
                }
            }
            ClosedScope::Namespace(_) => self.out.push_str(text),
        }
        self.flush_at_top_level();
        Ok(())
    }

    /// Evaluate a finished meta-class instance and splice the result
    fn expand_meta_class(&mut self, node: &NodeRef, depth: usize) -> Result<(), TransformError> {
        let (generator, offset) = match &self.state {
            ExpansionState::InsideMetaClassBody {
                generator,
                depth: opened,
                offset,
                ..
            } if depth < *opened => (generator.clone(), *offset),
            _ => return Ok(()),
        };
        self.state = ExpansionState::Idle;

        let (class, evaluator) = match (self.driver.class_at(node), self.evaluator.as_mut()) {
            (Some(class), Some(evaluator)) => (class, evaluator),
            _ => return Ok(()),
        };
        let generated =
            evaluator
                .evaluate(&generator, class)
                .map_err(|source| TransformError::Protocol {
                    generator: generator.clone(),
                    class: class.name.clone(),
                    offset,
                    source,
                })?;
        self.out.push_str(&generated);
        Ok(())
    }

    fn queue_class(&mut self, node: &NodeRef) {
        if let Some(class) = self.driver.class_at(node) {
            let path = self.driver.scope_path();
            self.pending
                .push(reflection::class_specialization(&path, class));
        }
    }

    fn queue_enum(&mut self, node: &NodeRef) {
        if !self.reflection || self.driver.inside_templated_class() {
            return;
        }
        if let Some(enumeration) = self.driver.enum_at(node) {
            if enumeration.name.is_empty() {
                return;
            }
            let path = self.driver.scope_path();
            self.pending
                .push(reflection::enum_specialization(&path, enumeration));
        }
    }

    fn flush_at_top_level(&mut self) {
        if self.driver.depth() != 1 || self.pending.is_empty() {
            return;
        }
        for specialization in self.pending.drain(..) {
            self.out.push('\n');
            self.out.push_str(&specialization);
        }
    }

    /// Finish the file; `trailing` is the unconsumed whitespace and comments
    pub fn finish(mut self, trailing: &str) -> Result<Expanded, TransformError> {
        self.out.push_str(trailing);
        let global = self.driver.finish()?;
        Ok(Expanded {
            body: self.out,
            includes: self.includes,
            discovered: self.discovered,
            global,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_constexpr_whole_word_only() {
        assert_eq!(
            strip_constexpr("\nconstexpr void gen(meta::type t, const meta::type s) {"),
            "\nvoid gen(meta::type t, const meta::type s) {"
        );
        assert_eq!(strip_constexpr("int not_constexpr_x() {"), "int not_constexpr_x() {");
    }
}

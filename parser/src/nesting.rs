//! Nesting stack driver
//!
//! The driver keeps every open scope of a file on a stack. The kind of the
//! innermost scope selects the rules tried against the unconsumed input; a
//! scope-open rule pushes a node, a scope-close pops it and moves it into the
//! nearest enclosing namespace or class. The global namespace sits below the
//! stack and is never popped.

use std::fmt;

use diagnostics::cpp::CppDiagnostics;
use diagnostics::{Diagnostic, FileId, SourceMap};
use nom::{branch::alt, combinator::map, Parser};

use crate::cpp_ast::*;
use crate::cpp_parser::{
    access_specifier, blank_len, block_head, directive, empty_declaration, opaque_declaration,
    opaque_statement, scope_close, scope_open, PResult,
};
use crate::cpp_parser_decls::{
    class_forward, class_open, enum_declaration, function_declaration, function_open,
    is_constructor_of, namespace_open, var_declaration,
};

/// An open scope
#[derive(Debug, Clone, PartialEq)]
pub enum Nesting {
    Namespace(Namespace),
    Class(Class),
    Function(Function),
    /// `{` inside a function: control-flow bodies, closures, bare blocks
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Namespace,
    Class,
    Function,
    Block,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Namespace => write!(f, "namespace"),
            ScopeKind::Class => write!(f, "class"),
            ScopeKind::Function => write!(f, "function"),
            ScopeKind::Block => write!(f, "block"),
        }
    }
}

impl Nesting {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Nesting::Namespace(_) => ScopeKind::Namespace,
            Nesting::Class(_) => ScopeKind::Class,
            Nesting::Function(_) => ScopeKind::Function,
            Nesting::Block => ScopeKind::Block,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Nesting::Namespace(ns) => &ns.name,
            Nesting::Class(class) => &class.name,
            Nesting::Function(function) => &function.name,
            Nesting::Block => "",
        }
    }
}

/// Where a node was attached: the depth of its parent (0 is the global
/// namespace) and its index in the parent's list. Valid until the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    pub depth: usize,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClosedScope {
    Namespace(String),
    Class(NodeRef),
    Function(String),
    Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Variables(Vec<String>),
    Function(String),
    Enumeration(NodeRef),
    /// Matched by the opaque declaration rule only
    Opaque,
}

/// What a successful step did
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    Opened(ScopeKind),
    /// `brace` is the absolute offset of the closing `}`
    Closed { scope: ClosedScope, brace: usize },
    ForwardDeclared(String),
    Declared(Declaration),
    AccessChanged(Access),
    Directive(Directive),
    /// A statement inside a function body
    Statement,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Bytes of the input the step consumed
    pub consumed: usize,
    pub event: ParseEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NestingError {
    /// `}` with only the global namespace open
    UnexpectedClose { offset: usize },
    /// End of input with scopes still open; reports the innermost one
    Unterminated {
        scope: ScopeKind,
        name: String,
        opened_at: usize,
    },
}

impl fmt::Display for NestingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NestingError::UnexpectedClose { offset } => {
                write!(f, "unexpected '}}' at offset {} with no open scope", offset)
            }
            NestingError::Unterminated {
                scope,
                name,
                opened_at,
            } => {
                if name.is_empty() {
                    write!(f, "unterminated {} opened at offset {}", scope, opened_at)
                } else {
                    write!(
                        f,
                        "unterminated {} '{}' opened at offset {}",
                        scope, name, opened_at
                    )
                }
            }
        }
    }
}

impl std::error::Error for NestingError {}

impl NestingError {
    pub fn to_diagnostic(&self, source_map: &SourceMap, file_id: FileId) -> Diagnostic {
        match self {
            NestingError::UnexpectedClose { offset } => CppDiagnostics::unexpected_scope_close(
                source_map.span_or_file_start(file_id, *offset, offset + 1),
            ),
            NestingError::Unterminated {
                scope, opened_at, ..
            } => {
                let end = source_map
                    .get_file(file_id)
                    .map(|file| file.content.len())
                    .unwrap_or(0);
                CppDiagnostics::unterminated_scope(
                    source_map.span_or_file_start(file_id, end, end),
                    source_map.span_or_file_start(file_id, *opened_at, opened_at + 1),
                    &scope.to_string(),
                )
            }
        }
    }
}

/// Result of the rule set of one scope kind
#[derive(Debug)]
enum Matched {
    ClassOpen(ClassHeader),
    ClassForward(String),
    FunctionOpen(Function),
    FunctionDeclared(Function),
    NamespaceOpen(String),
    ScopeClose(usize),
    Variables(Vec<Var>),
    Access(Access),
    Enumeration(Enumeration),
    Directive(Directive),
    BlockOpen,
    Empty,
    Opaque,
    Statement,
}

fn namespace_rules(input: &str) -> PResult<Matched> {
    alt((
        map(class_open, Matched::ClassOpen),
        map(class_forward, |header| Matched::ClassForward(header.name)),
        map(function_open, Matched::FunctionOpen),
        map(function_declaration, Matched::FunctionDeclared),
        map(namespace_open, Matched::NamespaceOpen),
        map(scope_close, Matched::ScopeClose),
        map(var_declaration, Matched::Variables),
        map(enum_declaration, Matched::Enumeration),
        map(directive, Matched::Directive),
        map(empty_declaration, |_| Matched::Empty),
        map(opaque_declaration, |_| Matched::Opaque),
    ))
    .parse(input)
}

fn class_rules(input: &str) -> PResult<Matched> {
    alt((
        map(class_open, Matched::ClassOpen),
        map(class_forward, |header| Matched::ClassForward(header.name)),
        map(function_open, Matched::FunctionOpen),
        map(function_declaration, Matched::FunctionDeclared),
        map(scope_close, Matched::ScopeClose),
        map(var_declaration, Matched::Variables),
        map(access_specifier, Matched::Access),
        map(enum_declaration, Matched::Enumeration),
        map(directive, Matched::Directive),
        map(empty_declaration, |_| Matched::Empty),
        map(opaque_declaration, |_| Matched::Opaque),
    ))
    .parse(input)
}

/// Function and block bodies share one rule set
fn body_rules(input: &str) -> PResult<Matched> {
    alt((
        map(class_open, Matched::ClassOpen),
        map(class_forward, |header| Matched::ClassForward(header.name)),
        map(scope_open, |_| Matched::BlockOpen),
        map(scope_close, Matched::ScopeClose),
        map(var_declaration, Matched::Variables),
        map(block_head, |_| Matched::BlockOpen),
        map(directive, Matched::Directive),
        map(empty_declaration, |_| Matched::Empty),
        map(opaque_statement, |_| Matched::Statement),
    ))
    .parse(input)
}

/// Mutable view of the scope a finished node attaches to
enum Container<'a> {
    Namespace(&'a mut Namespace),
    Class(&'a mut Class),
}

/// Drives the scope rules over one file
#[derive(Debug, Clone)]
pub struct NestingParser {
    global: Namespace,
    stack: Vec<Nesting>,
    /// Absolute offset of each open scope's header, parallel to `stack`
    open_offsets: Vec<usize>,
    /// Absolute offset of the first unconsumed byte
    offset: usize,
}

impl Default for NestingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl NestingParser {
    pub fn new() -> Self {
        NestingParser {
            global: Namespace::default(),
            stack: Vec::new(),
            open_offsets: Vec::new(),
            offset: 0,
        }
    }

    /// Number of open scopes, counting the global namespace
    pub fn depth(&self) -> usize {
        self.stack.len() + 1
    }

    /// Innermost open scope, `None` when only the global namespace is open
    pub fn current(&self) -> Option<&Nesting> {
        self.stack.last()
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.current().map_or(ScopeKind::Namespace, Nesting::kind)
    }

    /// Open scopes above the global namespace, outermost first
    pub fn nestings(&self) -> &[Nesting] {
        &self.stack
    }

    pub fn global(&self) -> &Namespace {
        &self.global
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Names of the enclosing named namespaces and classes, outermost first
    pub fn scope_path(&self) -> Vec<&str> {
        self.stack
            .iter()
            .filter(|n| matches!(n, Nesting::Namespace(_) | Nesting::Class(_)))
            .map(Nesting::name)
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn inside_function(&self) -> bool {
        self.stack
            .iter()
            .any(|n| matches!(n, Nesting::Function(_) | Nesting::Block))
    }

    /// Whether any enclosing class carries template parameters
    pub fn inside_templated_class(&self) -> bool {
        self.stack
            .iter()
            .any(|n| matches!(n, Nesting::Class(class) if class.is_templated()))
    }

    pub fn class_at(&self, node: &NodeRef) -> Option<&Class> {
        match self.container_at(node.depth)? {
            (Some(ns), _) => ns.classes.get(node.index),
            (_, Some(class)) => class.classes.get(node.index),
            _ => None,
        }
    }

    pub fn enum_at(&self, node: &NodeRef) -> Option<&Enumeration> {
        match self.container_at(node.depth)? {
            (Some(ns), _) => ns.enums.get(node.index),
            (_, Some(class)) => class.enums.get(node.index),
            _ => None,
        }
    }

    fn container_at(&self, depth: usize) -> Option<(Option<&Namespace>, Option<&Class>)> {
        if depth == 0 {
            return Some((Some(&self.global), None));
        }
        match self.stack.get(depth - 1)? {
            Nesting::Namespace(ns) => Some((Some(ns), None)),
            Nesting::Class(class) => Some((None, Some(class))),
            _ => None,
        }
    }

    /// Nearest enclosing namespace or class and its depth
    fn container_mut(&mut self) -> (usize, Container<'_>) {
        let found = self
            .stack
            .iter()
            .rposition(|n| matches!(n, Nesting::Namespace(_) | Nesting::Class(_)));
        match found {
            Some(i) => match &mut self.stack[i] {
                Nesting::Namespace(ns) => (i + 1, Container::Namespace(ns)),
                Nesting::Class(class) => (i + 1, Container::Class(class)),
                _ => (0, Container::Namespace(&mut self.global)),
            },
            None => (0, Container::Namespace(&mut self.global)),
        }
    }

    /// Nearest enclosing namespace and its depth
    fn namespace_mut(&mut self) -> (usize, &mut Namespace) {
        let found = self
            .stack
            .iter()
            .rposition(|n| matches!(n, Nesting::Namespace(_)));
        match found {
            Some(i) => match &mut self.stack[i] {
                Nesting::Namespace(ns) => (i + 1, ns),
                _ => (0, &mut self.global),
            },
            None => (0, &mut self.global),
        }
    }

    fn push(&mut self, nesting: Nesting, header_start: usize) {
        self.stack.push(nesting);
        self.open_offsets.push(header_start);
    }

    /// Run the rules of the innermost scope once against `input`, the text
    /// starting at [`NestingParser::offset`]
    ///
    /// `Ok(None)` means no rule matched; more input may make one match.
    pub fn step(&mut self, input: &str) -> Result<Option<Step>, NestingError> {
        let attempt = match self.current_kind() {
            ScopeKind::Namespace => namespace_rules(input),
            ScopeKind::Class => class_rules(input),
            ScopeKind::Function | ScopeKind::Block => body_rules(input),
        };
        let (rest, matched) = match attempt {
            Ok(ok) => ok,
            Err(_) => return Ok(None),
        };
        let consumed = input.len() - rest.len();
        let header = Span::new(self.offset + blank_len(input), self.offset + consumed);
        let event = self.apply(matched, header)?;
        self.offset += consumed;
        Ok(Some(Step { consumed, event }))
    }

    /// Push a class whose header was recognized outside the scope rules
    pub fn open_class(&mut self, input: &str, consumed: usize, mut class: Class) -> Step {
        let start = self.offset + blank_len(input);
        class.span = Span::new(start, self.offset + consumed);
        self.push(Nesting::Class(class), start);
        self.offset += consumed;
        Step {
            consumed,
            event: ParseEvent::Opened(ScopeKind::Class),
        }
    }

    /// Advance past text consumed outside the scope rules
    pub fn skip(&mut self, consumed: usize) {
        self.offset += consumed;
    }

    fn apply(&mut self, matched: Matched, header: Span) -> Result<ParseEvent, NestingError> {
        let event = match matched {
            Matched::ClassOpen(class_header) => {
                let mut class = Class::from_header(class_header);
                class.span = header;
                self.push(Nesting::Class(class), header.start);
                ParseEvent::Opened(ScopeKind::Class)
            }
            Matched::ClassForward(name) => ParseEvent::ForwardDeclared(name),
            Matched::FunctionOpen(mut function) => {
                function.span = header;
                self.push(Nesting::Function(function), header.start);
                ParseEvent::Opened(ScopeKind::Function)
            }
            Matched::FunctionDeclared(mut function) => {
                function.span = header;
                self.declare_function(function)
            }
            Matched::NamespaceOpen(name) => {
                self.push(Nesting::Namespace(Namespace::new(name)), header.start);
                ParseEvent::Opened(ScopeKind::Namespace)
            }
            Matched::ScopeClose(brace) => self.close(self.offset + brace)?,
            Matched::Variables(vars) => {
                let names = vars.iter().map(|v| v.name.clone()).collect();
                match self.stack.last_mut() {
                    None => self.global.variables.extend(vars),
                    Some(Nesting::Namespace(ns)) => ns.variables.extend(vars),
                    Some(Nesting::Class(class)) => {
                        for var in vars {
                            class.add_member(var);
                        }
                    }
                    // locals are not part of the model
                    Some(Nesting::Function(_)) | Some(Nesting::Block) => {}
                }
                ParseEvent::Declared(Declaration::Variables(names))
            }
            Matched::Access(access) => {
                if let Some(Nesting::Class(class)) = self.stack.last_mut() {
                    class.current_access = access;
                }
                ParseEvent::AccessChanged(access)
            }
            Matched::Enumeration(enumeration) => {
                let (depth, container) = self.container_mut();
                let index = match container {
                    Container::Namespace(ns) => {
                        ns.enums.push(enumeration);
                        ns.enums.len() - 1
                    }
                    Container::Class(class) => {
                        class.enums.push(enumeration);
                        class.enums.len() - 1
                    }
                };
                ParseEvent::Declared(Declaration::Enumeration(NodeRef { depth, index }))
            }
            Matched::Directive(directive) => ParseEvent::Directive(directive),
            Matched::BlockOpen => {
                self.push(Nesting::Block, header.start);
                ParseEvent::Opened(ScopeKind::Block)
            }
            Matched::Empty => ParseEvent::Empty,
            Matched::Opaque => ParseEvent::Declared(Declaration::Opaque),
            Matched::Statement => ParseEvent::Statement,
        };
        Ok(event)
    }

    fn declare_function(&mut self, function: Function) -> ParseEvent {
        let class_name = match self.stack.last() {
            Some(Nesting::Class(class)) => Some(class.name.as_str()),
            _ => None,
        };
        // `MACRO(x);` has the shape of a constructor declaration
        if function.is_constructor() && !is_constructor_of(&function, class_name) {
            return ParseEvent::Declared(Declaration::Opaque);
        }

        let name = function.name.clone();
        match self.stack.last_mut() {
            Some(Nesting::Class(class)) => {
                if !function.has_specifier(DeclSpecifier::Friend) {
                    class.add_method(into_method(function));
                }
            }
            Some(Nesting::Namespace(ns)) => ns.functions.push(function),
            None => self.global.functions.push(function),
            Some(Nesting::Function(_)) | Some(Nesting::Block) => {}
        }
        ParseEvent::Declared(Declaration::Function(name))
    }

    fn close(&mut self, brace: usize) -> Result<ParseEvent, NestingError> {
        let node = match self.stack.pop() {
            Some(node) => node,
            None => return Err(NestingError::UnexpectedClose { offset: brace }),
        };
        self.open_offsets.pop();

        let scope = match node {
            Nesting::Namespace(ns) => {
                let name = ns.name.clone();
                let (_, parent) = self.namespace_mut();
                parent.namespaces.push(ns);
                ClosedScope::Namespace(name)
            }
            Nesting::Class(mut class) => {
                class.span.end = brace + 1;
                let (depth, container) = self.container_mut();
                let index = match container {
                    Container::Namespace(ns) => {
                        ns.classes.push(class);
                        ns.classes.len() - 1
                    }
                    Container::Class(parent) => {
                        parent.classes.push(class);
                        parent.classes.len() - 1
                    }
                };
                ClosedScope::Class(NodeRef { depth, index })
            }
            Nesting::Function(function) => {
                let name = function.name.clone();
                let is_friend = function.has_specifier(DeclSpecifier::Friend);
                if is_friend {
                    self.namespace_mut().1.functions.push(function);
                } else {
                    match self.container_mut() {
                        (_, Container::Class(class)) => class.add_method(into_method(function)),
                        (_, Container::Namespace(ns)) => ns.functions.push(function),
                    }
                }
                ClosedScope::Function(name)
            }
            Nesting::Block => ClosedScope::Block,
        };
        Ok(ParseEvent::Closed { scope, brace })
    }

    /// The finished global namespace, or the innermost scope left open
    pub fn finish(self) -> Result<Namespace, NestingError> {
        match (self.stack.last(), self.open_offsets.last()) {
            (Some(node), Some(&opened_at)) => Err(NestingError::Unterminated {
                scope: node.kind(),
                name: node.name().to_string(),
                opened_at,
            }),
            _ => Ok(self.global),
        }
    }
}

/// Functions declared inside a class are methods even without qualifiers
fn into_method(mut function: Function) -> Function {
    if function.kind == FunctionKind::Free {
        function.kind = FunctionKind::Method(MethodQualifiers::default());
    }
    function
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(parser: &mut NestingParser, source: &str) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        let mut rest = source;
        while !crate::cpp_parser::is_blank(rest) {
            match parser.step(rest) {
                Ok(Some(step)) => {
                    rest = &rest[step.consumed..];
                    events.push(step.event);
                }
                other => panic!("stuck at {:?}: {:?}", rest, other),
            }
        }
        events
    }

    #[test]
    fn test_class_attaches_to_namespace() {
        let mut parser = NestingParser::new();
        let events = run(
            &mut parser,
            "namespace app {\nclass A : public B {\npublic:\n  int x;\n  void f();\nprivate:\n  int y;\n};\n}\n",
        );
        assert!(matches!(events[0], ParseEvent::Opened(ScopeKind::Namespace)));
        let global = parser.finish().unwrap();
        let app = &global.namespaces[0];
        assert_eq!(app.name, "app");
        let class = &app.classes[0];
        assert_eq!(class.members.public.len(), 1);
        assert_eq!(class.members.private.len(), 1);
        assert_eq!(class.methods.public.len(), 1);
        assert!(matches!(
            class.methods.public[0].kind,
            FunctionKind::Method(_)
        ));
    }

    #[test]
    fn test_close_reports_node_ref() {
        let mut parser = NestingParser::new();
        let events = run(&mut parser, "struct Outer { struct Inner { int a; }; };");
        let closed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Closed {
                    scope: ClosedScope::Class(node),
                    brace,
                } => Some((*node, *brace)),
                _ => None,
            })
            .collect();
        assert_eq!(closed.len(), 2);
        assert_eq!(closed[0].0, NodeRef { depth: 1, index: 0 });
        assert_eq!(closed[0].1, 37);
        assert_eq!(closed[1].0, NodeRef { depth: 0, index: 0 });
        let outer = &parser.global().classes[0];
        assert_eq!(outer.classes[0].name, "Inner");
    }

    #[test]
    fn test_function_body_blocks() {
        let mut parser = NestingParser::new();
        run(
            &mut parser,
            "int f(int n) {\n  int total = 0;\n  for (int i = 0; i < n; ++i) {\n    if (i % 2) { total += i; } else { total -= 1; }\n  }\n  return total;\n}\n",
        );
        assert_eq!(parser.depth(), 1);
        let global = parser.finish().unwrap();
        assert_eq!(global.functions.len(), 1);
        assert!(global.variables.is_empty());
    }

    #[test]
    fn test_local_class_attaches_to_enclosing_namespace() {
        let mut parser = NestingParser::new();
        run(&mut parser, "void f() { struct Local { int v; }; }");
        let global = parser.finish().unwrap();
        assert_eq!(global.classes[0].name, "Local");
        assert_eq!(global.functions[0].name, "f");
    }

    #[test]
    fn test_unexpected_close() {
        let mut parser = NestingParser::new();
        assert_eq!(
            parser.step("  }"),
            Err(NestingError::UnexpectedClose { offset: 2 })
        );
    }

    #[test]
    fn test_unterminated_scope_reports_innermost() {
        let mut parser = NestingParser::new();
        run(&mut parser, "namespace n {\n  class C {\n    int x;\n");
        match parser.finish() {
            Err(NestingError::Unterminated {
                scope,
                name,
                opened_at,
            }) => {
                assert_eq!(scope, ScopeKind::Class);
                assert_eq!(name, "C");
                assert_eq!(opened_at, 16);
            }
            other => panic!("expected unterminated scope, got {:?}", other),
        }
    }

    #[test]
    fn test_scope_path_skips_anonymous() {
        let mut parser = NestingParser::new();
        run(&mut parser, "namespace a { namespace { struct S {");
        assert_eq!(parser.scope_path(), vec!["a", "S"]);
        assert!(!parser.inside_function());
    }
}

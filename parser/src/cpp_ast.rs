//! C++ declaration AST
//!
//! Only the subset of C++ that drives scope tracking is modelled: namespaces,
//! classes, function signatures, variables, enumerations, types and a small
//! expression language for initializers and default arguments.

use std::fmt;

/// Byte range in the transformed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset of the start (inclusive)
    pub start: usize,
    /// Byte offset of the end (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn shifted(self, by: usize) -> Span {
        Span::new(self.start + by, self.end + by)
    }
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeQualifier {
    Const,
    /// `constexpr`, compile-time only
    Constexpr,
    Volatile,
    Pointer,
    LRef,
    RRef,
}

impl TypeQualifier {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeQualifier::Const => "const",
            TypeQualifier::Constexpr => "constexpr",
            TypeQualifier::Volatile => "volatile",
            TypeQualifier::Pointer => "*",
            TypeQualifier::LRef => "&",
            TypeQualifier::RRef => "&&",
        }
    }

    fn is_word(self) -> bool {
        matches!(
            self,
            TypeQualifier::Const | TypeQualifier::Constexpr | TypeQualifier::Volatile
        )
    }
}

/// A possibly qualified, possibly templated type
///
/// `const std::vector<int>&` is `leading: [Const]`, `name: ["std", "vector"]`,
/// `template_args: Some([int])`, `trailing: [LRef]`. Multi-word fundamental
/// types such as `unsigned long long int` are a single name segment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Type {
    pub leading: Vec<TypeQualifier>,
    pub name: Vec<String>,
    pub template_args: Option<Vec<TemplateArg>>,
    pub trailing: Vec<TypeQualifier>,
}

impl Type {
    /// A plain unqualified type such as `int` or `long double`
    pub fn simple(name: &str) -> Self {
        Type {
            name: vec![name.to_string()],
            ..Type::default()
        }
    }

    /// Name segments joined with `::`, without qualifiers or template arguments
    pub fn qualified_name(&self) -> String {
        self.name.join("::")
    }

    pub fn has_qualifier(&self, qualifier: TypeQualifier) -> bool {
        self.leading.contains(&qualifier) || self.trailing.contains(&qualifier)
    }

    pub fn is_templated(&self) -> bool {
        self.template_args.is_some()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for q in &self.leading {
            write!(f, "{} ", q.as_str())?;
        }
        write!(f, "{}", self.qualified_name())?;
        if let Some(args) = &self.template_args {
            write!(f, "<")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        for q in &self.trailing {
            if q.is_word() {
                write!(f, " {}", q.as_str())?;
            } else {
                write!(f, "{}", q.as_str())?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    Type(Type),
    Number(String),
}

impl fmt::Display for TemplateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateArg::Type(t) => write!(f, "{}", t),
            TemplateArg::Number(n) => write!(f, "{}", n),
        }
    }
}

/// One entry of a `template <...>` list
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParam {
    /// `class`, `typename`, or the type of a non-type parameter
    pub kind: Type,
    pub name: String,
    pub default: Option<String>,
    pub variadic: bool,
}

impl TemplateParam {
    /// Spelling inside a template header: `class T`, `int N`, `class... Ts`
    pub fn declaration(&self) -> String {
        if self.variadic {
            format!("{}... {}", self.kind, self.name)
        } else {
            format!("{} {}", self.kind, self.name)
        }
    }

    /// Spelling as an argument: `T`, `Ts...`
    pub fn argument(&self) -> String {
        if self.variadic {
            format!("{}...", self.name)
        } else {
            self.name.clone()
        }
    }
}

// =============================================================================
// Declarations
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    pub ty: Type,
    /// Initializer or default-argument text as written, without the `=`
    pub default_value: Option<String>,
    /// Array extents as written, brackets included: `[3]`, `[N][2]`
    pub array_extent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => write!(f, "public"),
            Access::Protected => write!(f, "protected"),
            Access::Private => write!(f, "private"),
        }
    }
}

/// Items of a class split by the access section they were declared in
#[derive(Debug, Clone, PartialEq)]
pub struct Partitioned<T> {
    pub public: Vec<T>,
    pub protected: Vec<T>,
    pub private: Vec<T>,
}

impl<T> Default for Partitioned<T> {
    fn default() -> Self {
        Self {
            public: Vec::new(),
            protected: Vec::new(),
            private: Vec::new(),
        }
    }
}

impl<T> Partitioned<T> {
    pub fn push(&mut self, access: Access, item: T) {
        self.section_mut(access).push(item);
    }

    pub fn section(&self, access: Access) -> &[T] {
        match access {
            Access::Public => &self.public,
            Access::Protected => &self.protected,
            Access::Private => &self.private,
        }
    }

    fn section_mut(&mut self, access: Access) -> &mut Vec<T> {
        match access {
            Access::Public => &mut self.public,
            Access::Protected => &mut self.protected,
            Access::Private => &mut self.private,
        }
    }

    pub fn len(&self) -> usize {
        self.public.len() + self.protected.len() + self.private.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// public, then protected, then private
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.public
            .iter()
            .chain(self.protected.iter())
            .chain(self.private.iter())
    }

    /// public, then private, then protected; the meta evaluator's order
    pub fn iter_evaluator_order(&self) -> impl Iterator<Item = &T> {
        self.public
            .iter()
            .chain(self.private.iter())
            .chain(self.protected.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefQualifier {
    LRef,
    RRef,
}

/// The operator token of an `operator` function
#[derive(Debug, Clone, PartialEq)]
pub enum OverloadedOperator {
    Symbol(String),
    /// `operator bool()`, `operator std::string()`
    Conversion(Type),
}

impl OverloadedOperator {
    pub fn symbol(&self) -> String {
        match self {
            OverloadedOperator::Symbol(s) => s.clone(),
            OverloadedOperator::Conversion(t) => t.to_string(),
        }
    }
}

/// Qualifiers after a method's parameter list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodQualifiers {
    pub is_virtual: bool,
    pub is_const: bool,
    pub ref_qualifier: Option<RefQualifier>,
    pub is_override: bool,
    pub is_final: bool,
    pub is_pure_virtual: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberInit {
    pub name: String,
    /// Argument text including the enclosing `()` or `{}`
    pub args: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionKind {
    Free,
    Method(MethodQualifiers),
    Operator {
        operator: OverloadedOperator,
        qualifiers: MethodQualifiers,
    },
    Constructor {
        initializers: Vec<MemberInit>,
        is_destructor: bool,
        qualifiers: MethodQualifiers,
    },
}

/// Storage and linkage specifiers in front of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclSpecifier {
    Static,
    Inline,
    Explicit,
    Extern,
    Friend,
    Virtual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Spelled name: `f`, `Foo::bar`, `operator==`, `~Foo`
    pub name: String,
    pub template_params: Option<Vec<TemplateParam>>,
    pub specifiers: Vec<DeclSpecifier>,
    pub is_constexpr: bool,
    /// `None` for constructors, destructors and conversion operators
    pub return_type: Option<Type>,
    pub params: Vec<Var>,
    pub is_noexcept: bool,
    pub kind: FunctionKind,
    pub span: Span,
}

impl Function {
    pub fn has_specifier(&self, specifier: DeclSpecifier) -> bool {
        self.specifiers.contains(&specifier)
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind, FunctionKind::Constructor { .. })
    }

    /// `(meta::type, const meta::type)`, the parameter list of a meta-class generator
    pub fn has_generator_shape(&self) -> bool {
        if self.params.len() != 2 {
            return false;
        }
        let is_meta_type = |t: &Type| t.name == ["meta", "type"] && t.template_args.is_none();
        let target = &self.params[0].ty;
        let source = &self.params[1].ty;
        is_meta_type(target)
            && !target.has_qualifier(TypeQualifier::Const)
            && is_meta_type(source)
            && source.has_qualifier(TypeQualifier::Const)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Struct,
    /// A class introduced by a meta-class generator name instead of `class`
    MetaClassInstance,
}

impl ClassKind {
    pub fn default_access(self) -> Access {
        match self {
            ClassKind::Struct => Access::Public,
            ClassKind::Class | ClassKind::MetaClassInstance => Access::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseClass {
    pub access: Option<Access>,
    pub is_virtual: bool,
    pub ty: Type,
}

/// `template <...> class Name final : bases`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassHeader {
    pub template_params: Option<Vec<TemplateParam>>,
    pub kind: ClassKind,
    pub name: String,
    pub is_final: bool,
    pub bases: Vec<BaseClass>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub kind: ClassKind,
    pub template_params: Option<Vec<TemplateParam>>,
    pub bases: Partitioned<Type>,
    pub members: Partitioned<Var>,
    pub methods: Partitioned<Function>,
    pub classes: Vec<Class>,
    pub enums: Vec<Enumeration>,
    pub current_access: Access,
    pub span: Span,
}

impl Class {
    pub fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        Class {
            name: name.into(),
            kind,
            template_params: None,
            bases: Partitioned::default(),
            members: Partitioned::default(),
            methods: Partitioned::default(),
            classes: Vec::new(),
            enums: Vec::new(),
            current_access: kind.default_access(),
            span: Span::default(),
        }
    }

    pub fn from_header(header: ClassHeader) -> Self {
        let mut class = Class::new(header.name, header.kind);
        class.template_params = header.template_params;
        let default_access = header.kind.default_access();
        for base in header.bases {
            class.bases.push(base.access.unwrap_or(default_access), base.ty);
        }
        class
    }

    pub fn is_templated(&self) -> bool {
        self.template_params.is_some()
    }

    pub fn add_member(&mut self, var: Var) {
        self.members.push(self.current_access, var);
    }

    pub fn add_method(&mut self, function: Function) {
        self.methods.push(self.current_access, function);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumeration {
    pub name: String,
    pub is_scoped: bool,
    pub underlying: Option<Type>,
    pub enumerators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namespace {
    /// Empty for the global namespace, anonymous namespaces and `extern "C"` blocks
    pub name: String,
    pub namespaces: Vec<Namespace>,
    pub classes: Vec<Class>,
    pub functions: Vec<Function>,
    pub variables: Vec<Var>,
    pub enums: Vec<Enumeration>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Namespace {
            name: name.into(),
            ..Namespace::default()
        }
    }
}

/// A preprocessor line such as `#include <vector>` or `#define X 1`
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub text: String,
    /// Path of an `#include`, without the delimiters
    pub include: Option<String>,
}

// =============================================================================
// Expressions
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal and the type its suffix selects
    Number { text: String, ty: Type },
    Char(String),
    Str(String),
    Bool(bool),
    Nullptr,
}

impl Literal {
    /// The type a literal evaluates to, as far as the suffix rules tell
    pub fn ty(&self) -> Type {
        match self {
            Literal::Number { ty, .. } => ty.clone(),
            Literal::Char(_) => Type::simple("char"),
            Literal::Str(_) => Type::simple("char[]"),
            Literal::Bool(_) => Type::simple("bool"),
            Literal::Nullptr => Type {
                name: vec!["std".to_string(), "nullptr_t".to_string()],
                ..Type::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// A name, optionally with template arguments and a call
    Name {
        name: Vec<String>,
        template_args: Option<Vec<TemplateArg>>,
        call: Option<Vec<Expr>>,
    },
    Paren(Box<Expr>),
    /// `{a, b}` or `Type{a, b}`
    BraceInit {
        ty: Option<Type>,
        items: Vec<Expr>,
    },
    /// Lambda; the body is kept as opaque text
    Closure { capture: String, body: String },
    Unary {
        op: String,
        operand: Box<Expr>,
        postfix: bool,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Subscript {
        target: Box<Expr>,
        index: Box<Expr>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_type(is_const: bool) -> Type {
        Type {
            leading: if is_const { vec![TypeQualifier::Const] } else { Vec::new() },
            name: vec!["meta".to_string(), "type".to_string()],
            ..Type::default()
        }
    }

    fn param(name: &str, ty: Type) -> Var {
        Var {
            name: name.to_string(),
            ty,
            default_value: None,
            array_extent: None,
        }
    }

    #[test]
    fn test_type_display() {
        let ty = Type {
            leading: vec![TypeQualifier::Const],
            name: vec!["std".to_string(), "vector".to_string()],
            template_args: Some(vec![
                TemplateArg::Type(Type::simple("int")),
                TemplateArg::Number("3".to_string()),
            ]),
            trailing: vec![TypeQualifier::LRef],
        };
        assert_eq!(ty.to_string(), "const std::vector<int, 3>&");
        assert_eq!(ty.qualified_name(), "std::vector");
    }

    #[test]
    fn test_partition_orders() {
        let mut items = Partitioned::default();
        items.push(Access::Protected, "b");
        items.push(Access::Private, "c");
        items.push(Access::Public, "a");

        let declared: Vec<_> = items.iter().copied().collect();
        let evaluator: Vec<_> = items.iter_evaluator_order().copied().collect();
        assert_eq!(declared, ["a", "b", "c"]);
        assert_eq!(evaluator, ["a", "c", "b"]);
    }

    #[test]
    fn test_generator_shape() {
        let mut f = Function {
            name: "interface".to_string(),
            template_params: None,
            specifiers: Vec::new(),
            is_constexpr: true,
            return_type: Some(Type::simple("void")),
            params: vec![param("t", meta_type(false)), param("s", meta_type(true))],
            is_noexcept: false,
            kind: FunctionKind::Free,
            span: Span::default(),
        };
        assert!(f.has_generator_shape());

        f.params.swap(0, 1);
        assert!(!f.has_generator_shape());
    }

    #[test]
    fn test_class_default_access() {
        let header = ClassHeader {
            template_params: None,
            kind: ClassKind::Struct,
            name: "S".to_string(),
            is_final: false,
            bases: vec![BaseClass {
                access: None,
                is_virtual: false,
                ty: Type::simple("Base"),
            }],
        };
        let class = Class::from_header(header);
        assert_eq!(class.current_access, Access::Public);
        assert_eq!(class.bases.public.len(), 1);
        assert_eq!(Class::new("C", ClassKind::Class).current_access, Access::Private);
    }
}

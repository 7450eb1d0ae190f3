//! Declaration parsing: function signatures, classes, namespaces, variables, enums
//!
//! Every rule here stops right after the token that decides what it is
//! (`{`, `;`, `= default;`) so the nesting driver can push or attach without
//! looking further.

use nom::{
    branch::alt,
    character::complete::{char, satisfy},
    combinator::{map, not, opt, recognize, value},
    error::{context, ErrorKind},
    multi::{many0, many1, separated_list0, separated_list1},
    sequence::{preceded, terminated},
    Parser,
};

use crate::cpp_ast::*;
use crate::cpp_parser::{
    attribute, brace_group, fail, identifier, is_blank, is_ident_char, keyword, list_item_end,
    paren_group, position, raw_identifier, scope_open, square_group, symbol, ws, PResult,
};
use crate::cpp_parser_expr::value_text;
use crate::cpp_parser_types::{string_literal, template_args, template_params, type_name, type_spec};

/// `:` that is not the start of `::`
fn colon(input: &str) -> PResult<&str> {
    terminated(symbol(":"), not(char(':'))).parse(input)
}

fn access(input: &str) -> PResult<Access> {
    alt((
        value(Access::Public, keyword("public")),
        value(Access::Protected, keyword("protected")),
        value(Access::Private, keyword("private")),
    ))
    .parse(input)
}

// =============================================================================
// Declaration prefix
// =============================================================================

#[derive(Debug, Clone)]
enum PrefixWord {
    Specifier(DeclSpecifier),
    Constexpr,
}

fn prefix_word(input: &str) -> PResult<PrefixWord> {
    alt((
        value(PrefixWord::Specifier(DeclSpecifier::Static), keyword("static")),
        value(PrefixWord::Specifier(DeclSpecifier::Inline), keyword("inline")),
        value(PrefixWord::Specifier(DeclSpecifier::Explicit), keyword("explicit")),
        value(PrefixWord::Specifier(DeclSpecifier::Extern), keyword("extern")),
        value(PrefixWord::Specifier(DeclSpecifier::Friend), keyword("friend")),
        value(PrefixWord::Specifier(DeclSpecifier::Virtual), keyword("virtual")),
        value(PrefixWord::Constexpr, keyword("constexpr")),
        value(PrefixWord::Constexpr, keyword("consteval")),
    ))
    .parse(input)
}

struct DeclPrefix {
    template_params: Option<Vec<TemplateParam>>,
    specifiers: Vec<DeclSpecifier>,
    is_constexpr: bool,
}

fn decl_prefix(input: &str) -> PResult<DeclPrefix> {
    let (input, template_params) = opt(template_params).parse(input)?;
    let (input, _) = many0(attribute).parse(input)?;
    let (input, words) = many0(prefix_word).parse(input)?;
    let mut prefix = DeclPrefix {
        template_params,
        specifiers: Vec::new(),
        is_constexpr: false,
    };
    for word in words {
        match word {
            PrefixWord::Specifier(s) => prefix.specifiers.push(s),
            PrefixWord::Constexpr => prefix.is_constexpr = true,
        }
    }
    Ok((input, prefix))
}

// =============================================================================
// Parameters and qualifiers
// =============================================================================

fn parameter(input: &str) -> PResult<Var> {
    let (input, _) = many0(attribute).parse(input)?;
    let (input, ty) = type_spec(input)?;
    let (input, _) = opt(symbol("...")).parse(input)?;
    let (input, name) = opt(identifier).parse(input)?;
    let (input, array_extent) = opt(recognize(many1(square_group))).parse(input)?;
    let (input, default_value) = opt(preceded(symbol("="), value_text)).parse(input)?;
    Ok((
        input,
        Var {
            name: name.unwrap_or_default(),
            ty,
            default_value,
            array_extent: array_extent.map(|e| e.trim().to_string()),
        },
    ))
}

fn c_variadic(input: &str) -> PResult<Var> {
    map(symbol("..."), |_| Var {
        name: String::new(),
        ty: Type::simple("..."),
        default_value: None,
        array_extent: None,
    })
    .parse(input)
}

/// `(int a, const T& b = {})`; `(void)` is an empty list
pub fn parameter_list(input: &str) -> PResult<Vec<Var>> {
    let (input, _) = symbol("(")(input)?;
    let (input, mut params) =
        separated_list0(symbol(","), alt((parameter, c_variadic))).parse(input)?;
    let (input, _) = symbol(")")(input)?;
    if params.len() == 1
        && params[0].name.is_empty()
        && params[0].ty == Type::simple("void")
    {
        params.clear();
    }
    Ok((input, params))
}

/// Everything between the parameter list and the body or terminator
#[derive(Debug, Default)]
struct MethodTail {
    is_const: bool,
    ref_qualifier: Option<RefQualifier>,
    is_noexcept: bool,
    trailing_return: Option<Type>,
    is_override: bool,
    is_final: bool,
    is_pure_virtual: bool,
}

#[derive(Debug, Clone, Copy)]
enum VirtSpecifier {
    Override,
    Final,
}

fn noexcept_spec(input: &str) -> PResult<bool> {
    let (input, _) = keyword("noexcept")(input)?;
    let (input, condition) = opt(paren_group).parse(input)?;
    let enabled = match condition {
        Some(group) => group[1..group.len() - 1].trim() != "false",
        None => true,
    };
    Ok((input, enabled))
}

fn pure_specifier(input: &str) -> PResult<()> {
    let (input, _) = symbol("=")(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char('0')(input)?;
    let (input, _) = not(satisfy(is_ident_char)).parse(input)?;
    Ok((input, ()))
}

fn method_tail(input: &str) -> PResult<MethodTail> {
    let (input, is_const) = opt(keyword("const")).parse(input)?;
    let (input, _) = opt(keyword("volatile")).parse(input)?;
    let (input, ref_qualifier) = opt(alt((
        value(RefQualifier::RRef, symbol("&&")),
        value(RefQualifier::LRef, symbol("&")),
    )))
    .parse(input)?;
    let (input, noexcept) = opt(noexcept_spec).parse(input)?;
    let (input, trailing_return) = opt(preceded(symbol("->"), type_spec)).parse(input)?;
    let (input, virt) = many0(alt((
        value(VirtSpecifier::Override, keyword("override")),
        value(VirtSpecifier::Final, keyword("final")),
    )))
    .parse(input)?;
    let (input, pure) = opt(pure_specifier).parse(input)?;
    Ok((
        input,
        MethodTail {
            is_const: is_const.is_some(),
            ref_qualifier,
            is_noexcept: noexcept.unwrap_or(false),
            trailing_return,
            is_override: virt.iter().any(|v| matches!(v, VirtSpecifier::Override)),
            is_final: virt.iter().any(|v| matches!(v, VirtSpecifier::Final)),
            is_pure_virtual: pure.is_some(),
        },
    ))
}

impl MethodTail {
    fn qualifiers(&self, prefix: &DeclPrefix) -> MethodQualifiers {
        MethodQualifiers {
            is_virtual: prefix.specifiers.contains(&DeclSpecifier::Virtual),
            is_const: self.is_const,
            ref_qualifier: self.ref_qualifier,
            is_override: self.is_override,
            is_final: self.is_final,
            is_pure_virtual: self.is_pure_virtual,
        }
    }
}

fn build_function(
    prefix: DeclPrefix,
    name: String,
    return_type: Option<Type>,
    params: Vec<Var>,
    tail: &MethodTail,
    kind: FunctionKind,
) -> Function {
    Function {
        name,
        template_params: prefix.template_params,
        specifiers: prefix.specifiers,
        is_constexpr: prefix.is_constexpr,
        return_type: tail.trailing_return.clone().or(return_type),
        params,
        is_noexcept: tail.is_noexcept,
        kind,
        span: Span::default(),
    }
}

// =============================================================================
// Signatures
// =============================================================================

const OPERATOR_SYMBOLS: &[&str] = &[
    "()", "[]", "->*", "<<=", ">>=", "<=>", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=",
    "&&", "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "^",
    "&", "|", "~", "!", "=", "<", ">", ",",
];

fn operator_symbol(input: &str) -> PResult<OverloadedOperator> {
    let (rest, _) = ws(input)?;
    for word in ["new", "delete"] {
        if let Ok((after, _)) = keyword(word)(rest) {
            let (after, array) = opt((symbol("["), symbol("]"))).parse(after)?;
            let spelled = if array.is_some() {
                format!("{}[]", word)
            } else {
                word.to_string()
            };
            return Ok((after, OverloadedOperator::Symbol(spelled)));
        }
    }
    for op in OPERATOR_SYMBOLS {
        if let Some(after) = rest.strip_prefix(op) {
            return Ok((after, OverloadedOperator::Symbol(op.to_string())));
        }
    }
    fail(input, ErrorKind::Tag)
}

fn scope_segments(input: &str) -> PResult<Vec<String>> {
    many0(terminated(identifier, symbol("::"))).parse(input)
}

fn qualify(scope: &[String], name: String) -> String {
    if scope.is_empty() {
        name
    } else {
        format!("{}::{}", scope.join("::"), name)
    }
}

/// `bool operator==(const T&) const`, `explicit operator bool()`
pub fn operator_signature(input: &str) -> PResult<Function> {
    let (input, prefix) = decl_prefix(input)?;
    let (input, return_type) = opt(terminated(type_spec, not(symbol("::")))).parse(input)?;
    let (input, scope) = scope_segments(input)?;
    let (input, _) = keyword("operator")(input)?;
    let (input, operator) = alt((
        operator_symbol,
        map(type_spec, OverloadedOperator::Conversion),
    ))
    .parse(input)?;
    let (input, params) = parameter_list(input)?;
    let (input, tail) = method_tail(input)?;

    let spelled = match &operator {
        OverloadedOperator::Symbol(s) => format!("operator{}", s),
        OverloadedOperator::Conversion(t) => format!("operator {}", t),
    };
    let return_type = match operator {
        OverloadedOperator::Conversion(_) => None,
        OverloadedOperator::Symbol(_) => return_type,
    };
    let kind = FunctionKind::Operator {
        operator,
        qualifiers: tail.qualifiers(&prefix),
    };
    let name = qualify(&scope, spelled);
    Ok((
        input,
        build_function(prefix, name, return_type, params, &tail, kind),
    ))
}

/// `int f(int)`, `virtual void Foo::bar() const override`
pub fn method_signature(input: &str) -> PResult<Function> {
    let (input, prefix) = decl_prefix(input)?;
    let (input, return_type) = type_spec(input)?;
    let (input, name) = type_name(input)?;
    let (input, params) = parameter_list(input)?;
    let (input, tail) = method_tail(input)?;

    let qualifiers = tail.qualifiers(&prefix);
    let kind = if qualifiers == MethodQualifiers::default() && name.len() == 1 {
        FunctionKind::Free
    } else {
        FunctionKind::Method(qualifiers)
    };
    Ok((
        input,
        build_function(prefix, name.join("::"), Some(return_type), params, &tail, kind),
    ))
}

fn member_init(input: &str) -> PResult<MemberInit> {
    let (input, name) = recognize((type_name, opt(template_args))).parse(input)?;
    let (input, args) = alt((paren_group, brace_group)).parse(input)?;
    Ok((
        input,
        MemberInit {
            name: name.trim().to_string(),
            args: args.to_string(),
        },
    ))
}

/// `Foo(int x) : x_(x)`, `~Foo()`, `Foo::Foo()`
pub fn constructor_signature(input: &str) -> PResult<Function> {
    let (input, prefix) = decl_prefix(input)?;
    let (input, scope) = scope_segments(input)?;
    let (input, tilde) = opt(symbol("~")).parse(input)?;
    let (input, name) = identifier(input)?;
    let (input, params) = parameter_list(input)?;
    let (input, tail) = method_tail(input)?;
    let (input, initializers) =
        opt(preceded(colon, separated_list1(symbol(","), member_init))).parse(input)?;

    let is_destructor = tilde.is_some();
    let spelled = if is_destructor {
        format!("~{}", name)
    } else {
        name
    };
    let kind = FunctionKind::Constructor {
        initializers: initializers.unwrap_or_default(),
        is_destructor,
        qualifiers: tail.qualifiers(&prefix),
    };
    let name = qualify(&scope, spelled);
    Ok((input, build_function(prefix, name, None, params, &tail, kind)))
}

fn signature(input: &str) -> PResult<Function> {
    alt((operator_signature, method_signature, constructor_signature)).parse(input)
}

/// Any function signature
pub fn function_signature(input: &str) -> PResult<Function> {
    context("function signature", signature).parse(input)
}

/// Signature followed by `{`: a function body opens
pub fn function_open(input: &str) -> PResult<Function> {
    alt((
        terminated(operator_signature, scope_open),
        terminated(method_signature, scope_open),
        terminated(constructor_signature, scope_open),
    ))
    .parse(input)
}

fn declaration_end(input: &str) -> PResult<()> {
    alt((
        value((), symbol(";")),
        value(
            (),
            (
                symbol("="),
                alt((keyword("default"), keyword("delete"))),
                symbol(";"),
            ),
        ),
    ))
    .parse(input)
}

/// Signature followed by `;`, `= default;` or `= delete;`
pub fn function_declaration(input: &str) -> PResult<Function> {
    alt((
        terminated(operator_signature, declaration_end),
        terminated(method_signature, declaration_end),
        terminated(constructor_signature, declaration_end),
    ))
    .parse(input)
}

/// Whether a constructor-shaped signature really names a constructor
///
/// `Foo::Foo` and `Foo::~Foo` always do; an unqualified one only inside `Foo`.
pub fn is_constructor_of(function: &Function, class_name: Option<&str>) -> bool {
    let segments: Vec<&str> = function.name.split("::").collect();
    let last = segments[segments.len() - 1].trim_start_matches('~');
    match segments.len() {
        1 => class_name == Some(last),
        n => segments[n - 2] == last,
    }
}

// =============================================================================
// Classes and namespaces
// =============================================================================

fn base_class(input: &str) -> PResult<BaseClass> {
    let (input, virtual_before) = opt(keyword("virtual")).parse(input)?;
    let (input, access) = opt(access).parse(input)?;
    let (input, virtual_after) = opt(keyword("virtual")).parse(input)?;
    let (input, ty) = type_spec(input)?;
    Ok((
        input,
        BaseClass {
            access,
            is_virtual: virtual_before.is_some() || virtual_after.is_some(),
            ty,
        },
    ))
}

fn base_clause(input: &str) -> PResult<Vec<BaseClass>> {
    preceded(colon, separated_list1(symbol(","), base_class)).parse(input)
}

fn class_header_inner(input: &str) -> PResult<ClassHeader> {
    let (input, template_params) = opt(template_params).parse(input)?;
    let (input, kind) = alt((
        value(ClassKind::Class, keyword("class")),
        value(ClassKind::Struct, keyword("struct")),
    ))
    .parse(input)?;
    let (input, _) = many0(attribute).parse(input)?;
    let (input, name) = identifier(input)?;
    let (input, is_final) = opt(keyword("final")).parse(input)?;
    let (input, bases) = opt(base_clause).parse(input)?;
    Ok((
        input,
        ClassHeader {
            template_params,
            kind,
            name,
            is_final: is_final.is_some(),
            bases: bases.unwrap_or_default(),
        },
    ))
}

/// `template <...> class Name final : bases`
pub fn class_header(input: &str) -> PResult<ClassHeader> {
    context("class header", class_header_inner).parse(input)
}

/// Class header followed by `{`
pub fn class_open(input: &str) -> PResult<ClassHeader> {
    terminated(class_header, scope_open).parse(input)
}

/// `class Foo;`; only tried after [`class_open`] has failed
pub fn class_forward(input: &str) -> PResult<ClassHeader> {
    terminated(class_header, symbol(";")).parse(input)
}

/// Header of a class introduced by a generator name: `interface Shape : Base {`
#[derive(Debug, Clone, PartialEq)]
pub struct MetaClassHeader {
    pub template_params: Option<Vec<TemplateParam>>,
    pub generator: String,
    /// Where the generator name sits, relative to the parsed input
    pub generator_span: Span,
    pub name: String,
    pub bases: Vec<BaseClass>,
}

impl MetaClassHeader {
    pub fn into_class_header(self) -> ClassHeader {
        ClassHeader {
            template_params: self.template_params,
            kind: ClassKind::MetaClassInstance,
            name: self.name,
            is_final: false,
            bases: self.bases,
        }
    }
}

/// `[template <...>] generator Name [: bases] {` for a known generator name
pub fn meta_class_open<'a>(
    input: &'a str,
    is_generator: &dyn Fn(&str) -> bool,
) -> PResult<'a, MetaClassHeader> {
    let full = input;
    let (input, template_params) = opt(template_params).parse(input)?;
    let (input, _) = ws(input)?;
    let start = position(full, input);
    let (input, generator) = raw_identifier(input)?;
    if !is_generator(generator) {
        return fail(input, ErrorKind::Verify);
    }
    let generator_span = Span::new(start, start + generator.len());
    let (input, _) = many0(attribute).parse(input)?;
    let (input, name) = identifier(input)?;
    let (input, bases) = opt(base_clause).parse(input)?;
    let (input, _) = scope_open(input)?;
    Ok((
        input,
        MetaClassHeader {
            template_params,
            generator: generator.to_string(),
            generator_span,
            name,
            bases: bases.unwrap_or_default(),
        },
    ))
}

fn named_namespace(input: &str) -> PResult<String> {
    let (input, _) = opt(keyword("inline")).parse(input)?;
    let (input, _) = keyword("namespace")(input)?;
    let (input, _) = many0(attribute).parse(input)?;
    let (input, name) = opt(separated_list1(symbol("::"), identifier)).parse(input)?;
    let (input, _) = scope_open(input)?;
    Ok((input, name.map(|n| n.join("::")).unwrap_or_default()))
}

fn linkage_block(input: &str) -> PResult<String> {
    let (input, _) = keyword("extern")(input)?;
    let (input, _) = string_literal(input)?;
    let (input, _) = scope_open(input)?;
    Ok((input, String::new()))
}

/// `namespace a::b {`, `namespace {` or `extern "C" {`; yields the name
pub fn namespace_open(input: &str) -> PResult<String> {
    alt((named_namespace, linkage_block)).parse(input)
}

// =============================================================================
// Variables and enumerations
// =============================================================================

fn var_prefix(input: &str) -> PResult<Option<TypeQualifier>> {
    alt((
        value(None, keyword("static")),
        value(None, keyword("inline")),
        value(None, keyword("mutable")),
        value(None, keyword("extern")),
        value(None, keyword("thread_local")),
        value(None, keyword("constinit")),
        value(Some(TypeQualifier::Constexpr), keyword("constexpr")),
        value(Some(TypeQualifier::Const), keyword("const")),
        value(Some(TypeQualifier::Volatile), keyword("volatile")),
    ))
    .parse(input)
}

struct Declarator {
    qualifiers: Vec<TypeQualifier>,
    name: String,
    array_extent: Option<String>,
    initializer: Option<String>,
}

fn initializer(input: &str) -> PResult<String> {
    alt((
        preceded(symbol("="), value_text),
        map(brace_group, str::to_string),
        map(paren_group, str::to_string),
    ))
    .parse(input)
}

fn declarator(input: &str) -> PResult<Declarator> {
    let (input, qualifiers) = many0(alt((
        value(TypeQualifier::Pointer, symbol("*")),
        value(TypeQualifier::RRef, symbol("&&")),
        value(TypeQualifier::LRef, symbol("&")),
    )))
    .parse(input)?;
    let (input, name) = identifier(input)?;
    let (input, array_extent) = opt(recognize(many1(square_group))).parse(input)?;
    let (input, initializer) = opt(initializer).parse(input)?;
    Ok((
        input,
        Declarator {
            qualifiers,
            name,
            array_extent: array_extent.map(|e| e.trim().to_string()),
            initializer,
        },
    ))
}

fn var_declaration_inner(input: &str) -> PResult<Vec<Var>> {
    let (input, _) = many0(attribute).parse(input)?;
    let (input, words) = many0(var_prefix).parse(input)?;
    let (input, mut ty) = type_spec(input)?;
    let mut leading: Vec<TypeQualifier> = words.into_iter().flatten().collect();
    leading.append(&mut ty.leading);
    ty.leading = leading;

    let (input, declarators) = separated_list1(symbol(","), declarator).parse(input)?;
    let (input, _) = symbol(";")(input)?;

    let vars = declarators
        .into_iter()
        .map(|d| {
            let mut var_ty = ty.clone();
            var_ty.trailing.extend(d.qualifiers);
            Var {
                name: d.name,
                ty: var_ty,
                default_value: d.initializer,
                array_extent: d.array_extent,
            }
        })
        .collect();
    Ok((input, vars))
}

/// `static const int a = 1, *b, c[3];`
pub fn var_declaration(input: &str) -> PResult<Vec<Var>> {
    context("variable declaration", var_declaration_inner).parse(input)
}

fn enumerator(input: &str) -> PResult<String> {
    let (input, name) = identifier(input)?;
    let (input, _) = many0(attribute).parse(input)?;
    let (input, assigned) = opt(symbol("=")).parse(input)?;
    if assigned.is_none() {
        return Ok((input, name));
    }
    match list_item_end(input) {
        Some(end) if !is_blank(&input[..end]) => Ok((&input[end..], name)),
        _ => fail(input, ErrorKind::TakeUntil),
    }
}

fn enum_declaration_inner(input: &str) -> PResult<Enumeration> {
    let (input, _) = keyword("enum")(input)?;
    let (input, scoped) = opt(alt((keyword("class"), keyword("struct")))).parse(input)?;
    let (input, _) = many0(attribute).parse(input)?;
    let (input, name) = opt(identifier).parse(input)?;
    let (input, underlying) = opt(preceded(colon, type_spec)).parse(input)?;
    let (input, _) = symbol("{")(input)?;
    let (input, enumerators) =
        terminated(separated_list0(symbol(","), enumerator), opt(symbol(","))).parse(input)?;
    let (input, _) = symbol("}")(input)?;
    let (input, _) = symbol(";")(input)?;
    Ok((
        input,
        Enumeration {
            name: name.unwrap_or_default(),
            is_scoped: scoped.is_some(),
            underlying,
            enumerators,
        },
    ))
}

/// `enum class Color : int { Red = 1, Green, };`
pub fn enum_declaration(input: &str) -> PResult<Enumeration> {
    context("enumeration", enum_declaration_inner).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_header_template_params_and_bases() {
        let (rest, header) =
            class_open("template <class T, int N> class Foo : public A, protected B<T>, C { int x;")
                .unwrap();
        assert_eq!(rest, " int x;");
        assert_eq!(header.name, "Foo");
        assert_eq!(header.template_params.as_ref().map(Vec::len), Some(2));

        let class = Class::from_header(header);
        assert_eq!(class.bases.public.len(), 1);
        assert_eq!(class.bases.protected.len(), 1);
        assert_eq!(class.bases.private.len(), 1);
        assert_eq!(class.bases.protected[0].to_string(), "B<T>");
    }

    #[test]
    fn test_forward_declaration_is_not_an_open() {
        assert!(class_open("class Foo;").is_err());
        let (_, header) = class_forward("class Foo;").unwrap();
        assert_eq!(header.name, "Foo");
        assert!(class_forward("struct Foo {").is_err());
    }

    #[test]
    fn test_method_qualifiers_in_order() {
        let (rest, f) =
            function_declaration("virtual int get() const && noexcept override = 0; next").unwrap();
        assert_eq!(rest, " next");
        assert_eq!(f.name, "get");
        assert!(f.is_noexcept);
        match f.kind {
            FunctionKind::Method(q) => {
                assert!(q.is_virtual && q.is_const && q.is_override && q.is_pure_virtual);
                assert_eq!(q.ref_qualifier, Some(RefQualifier::RRef));
            }
            other => panic!("expected method, got {:?}", other),
        }
    }

    #[test]
    fn test_free_function_with_defaults() {
        let (_, f) = function_open("inline int add(int a, int b = a + 1) {").unwrap();
        assert_eq!(f.kind, FunctionKind::Free);
        assert!(f.has_specifier(DeclSpecifier::Inline));
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[1].default_value.as_deref(), Some("a + 1"));

        let (_, f) = function_declaration("int f(void);").unwrap();
        assert!(f.params.is_empty());
    }

    #[test]
    fn test_operators() {
        let (_, f) = function_open("bool operator==(const Foo& other) const {").unwrap();
        assert_eq!(f.name, "operator==");
        assert_eq!(f.return_type.map(|t| t.qualified_name()), Some("bool".to_string()));

        let (_, f) = function_declaration("explicit operator bool() const;").unwrap();
        assert_eq!(f.name, "operator bool");
        assert!(f.return_type.is_none());
        assert!(matches!(
            f.kind,
            FunctionKind::Operator {
                operator: OverloadedOperator::Conversion(_),
                ..
            }
        ));

        let (_, f) = function_open("Foo& Foo::operator=(Foo&& other) noexcept {").unwrap();
        assert_eq!(f.name, "Foo::operator=");
    }

    #[test]
    fn test_constructors_and_destructors() {
        let (_, f) = function_open("Foo(int x) : x_(x), y_{2} {").unwrap();
        match &f.kind {
            FunctionKind::Constructor {
                initializers,
                is_destructor,
                ..
            } => {
                assert!(!is_destructor);
                assert_eq!(initializers.len(), 2);
                assert_eq!(initializers[1].args, "{2}");
            }
            other => panic!("expected constructor, got {:?}", other),
        }
        assert!(is_constructor_of(&f, Some("Foo")));
        assert!(!is_constructor_of(&f, Some("Bar")));

        let (_, f) = function_declaration("virtual ~Foo() = default;").unwrap();
        assert_eq!(f.name, "~Foo");
        assert!(is_constructor_of(&f, Some("Foo")));

        let (_, f) = function_open("Foo::~Foo() {").unwrap();
        assert_eq!(f.name, "Foo::~Foo");
        assert!(is_constructor_of(&f, None));
    }

    #[test]
    fn test_compile_time_generator_signature() {
        let (_, f) =
            function_open("constexpr void interface(meta::type target, const meta::type source) {")
                .unwrap();
        assert!(f.is_constexpr);
        assert!(f.has_generator_shape());
    }

    #[test]
    fn test_variable_declarators() {
        let (rest, vars) = var_declaration("static const int a = 1, *b, c[3];").unwrap();
        assert!(rest.is_empty());
        assert_eq!(vars.len(), 3);
        assert_eq!(vars[0].default_value.as_deref(), Some("1"));
        assert!(vars[0].ty.has_qualifier(TypeQualifier::Const));
        assert_eq!(vars[1].ty.trailing, vec![TypeQualifier::Pointer]);
        assert_eq!(vars[2].array_extent.as_deref(), Some("[3]"));

        let (_, vars) = var_declaration("std::vector<int> v{1, 2};").unwrap();
        assert_eq!(vars[0].default_value.as_deref(), Some("{1, 2}"));
    }

    #[test]
    fn test_enumeration() {
        let (_, e) =
            enum_declaration("enum class Color : unsigned char { Red = 1 << 0, Green, Blue, };")
                .unwrap();
        assert!(e.is_scoped);
        assert_eq!(e.name, "Color");
        assert_eq!(e.underlying.map(|t| t.qualified_name()), Some("unsigned char".to_string()));
        assert_eq!(e.enumerators, vec!["Red", "Green", "Blue"]);
    }

    #[test]
    fn test_namespace_headers() {
        assert_eq!(namespace_open("inline namespace v1 {").unwrap().1, "v1");
        assert_eq!(namespace_open("namespace a::b {").unwrap().1, "a::b");
        assert_eq!(namespace_open("namespace {").unwrap().1, "");
        assert_eq!(namespace_open("extern \"C\" {").unwrap().1, "");
        assert!(namespace_open("extern \"C\" int f();").is_err());
    }

    #[test]
    fn test_meta_class_header() {
        let is_generator = |name: &str| name == "interface";
        let (rest, header) =
            meta_class_open("  interface Shape : public Base { int x;", &is_generator).unwrap();
        assert_eq!(rest, " int x;");
        assert_eq!(header.generator_span, Span::new(2, 11));
        assert_eq!(header.name, "Shape");
        assert_eq!(header.bases.len(), 1);
        assert!(meta_class_open("value Shape {", &is_generator).is_err());
    }
}

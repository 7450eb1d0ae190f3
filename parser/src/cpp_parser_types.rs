//! Types, template lists and literals

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{map, not, opt, recognize, value},
    error::{context, ErrorKind},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, preceded},
    Parser,
};

use crate::cpp_ast::*;
use crate::cpp_parser::{
    fail, identifier, is_ident_char, keyword, quoted_body, raw_identifier, symbol, ws, PResult,
};

const FUNDAMENTAL_WORDS: &[&str] = &[
    "unsigned", "signed", "short", "long", "int", "char", "double", "float",
];

fn fundamental_word(input: &str) -> PResult<&str> {
    let (rest, _) = ws(input)?;
    let (rest, word) = raw_identifier(rest)?;
    if FUNDAMENTAL_WORDS.contains(&word) {
        Ok((rest, word))
    } else {
        fail(input, ErrorKind::Verify)
    }
}

/// `unsigned long long int`, `long double`, `char`: one name segment
pub fn fundamental_type(input: &str) -> PResult<String> {
    let (input, words) = many1(fundamental_word).parse(input)?;
    Ok((input, words.join(" ")))
}

/// `a::b::c`, optionally rooted at the global scope
pub fn qualified_name(input: &str) -> PResult<Vec<String>> {
    let (input, _) = opt(symbol("::")).parse(input)?;
    let (input, first) = identifier(input)?;
    let (input, rest) = many0(preceded(symbol("::"), identifier)).parse(input)?;
    let mut segments = vec![first];
    segments.extend(rest);
    Ok((input, segments))
}

/// Name part of a type: a fundamental type or a qualified name
pub fn type_name(input: &str) -> PResult<Vec<String>> {
    alt((map(fundamental_type, |t| vec![t]), qualified_name)).parse(input)
}

fn leading_qualifier(input: &str) -> PResult<TypeQualifier> {
    alt((
        value(TypeQualifier::Constexpr, keyword("constexpr")),
        value(TypeQualifier::Const, keyword("const")),
        value(TypeQualifier::Volatile, keyword("volatile")),
    ))
    .parse(input)
}

fn trailing_qualifier(input: &str) -> PResult<TypeQualifier> {
    alt((
        value(TypeQualifier::RRef, symbol("&&")),
        value(TypeQualifier::LRef, symbol("&")),
        value(TypeQualifier::Pointer, symbol("*")),
        value(TypeQualifier::Const, keyword("const")),
        value(TypeQualifier::Volatile, keyword("volatile")),
    ))
    .parse(input)
}

fn type_spec_inner(input: &str) -> PResult<Type> {
    let (input, leading) = many0(leading_qualifier).parse(input)?;
    let (input, _) = opt(keyword("typename")).parse(input)?;
    let (input, name) = type_name(input)?;
    let (input, template_args) = opt(template_args).parse(input)?;
    let (input, trailing) = many0(trailing_qualifier).parse(input)?;
    Ok((
        input,
        Type {
            leading,
            name,
            template_args,
            trailing,
        },
    ))
}

/// `const std::map<std::string, int>&`
pub fn type_spec(input: &str) -> PResult<Type> {
    context("type", type_spec_inner).parse(input)
}

fn template_arg(input: &str) -> PResult<TemplateArg> {
    alt((
        map(type_spec, TemplateArg::Type),
        map(signed_number_text, TemplateArg::Number),
    ))
    .parse(input)
}

/// `<int, std::vector<T>, 3>`
pub fn template_args(input: &str) -> PResult<Vec<TemplateArg>> {
    delimited(
        symbol("<"),
        separated_list0(symbol(","), template_arg),
        symbol(">"),
    )
    .parse(input)
}

fn template_param_kind(input: &str) -> PResult<Type> {
    alt((
        map(keyword("class"), |_| Type::simple("class")),
        map(keyword("typename"), |_| Type::simple("typename")),
        type_spec,
    ))
    .parse(input)
}

fn template_param(input: &str) -> PResult<TemplateParam> {
    let (input, kind) = template_param_kind(input)?;
    let (input, variadic) = opt(symbol("...")).parse(input)?;
    let (input, name) = opt(identifier).parse(input)?;
    let (input, default) = opt(preceded(symbol("="), recognize(template_arg))).parse(input)?;
    Ok((
        input,
        TemplateParam {
            kind,
            name: name.unwrap_or_default(),
            default: default.map(|d| d.trim().to_string()),
            variadic: variadic.is_some(),
        },
    ))
}

fn template_params_inner(input: &str) -> PResult<Vec<TemplateParam>> {
    let (input, _) = keyword("template")(input)?;
    delimited(
        symbol("<"),
        separated_list0(symbol(","), template_param),
        symbol(">"),
    )
    .parse(input)
}

/// `template <class T, int N = 3, class... Ts>`
pub fn template_params(input: &str) -> PResult<Vec<TemplateParam>> {
    context("template parameters", template_params_inner).parse(input)
}

// =============================================================================
// Literals
// =============================================================================

fn digits(input: &str) -> PResult<&str> {
    recognize(pair(
        digit1,
        take_while(|c: char| c.is_ascii_digit() || c == '\''),
    ))
    .parse(input)
}

fn exponent(input: &str) -> PResult<&str> {
    recognize((one_of("eE"), opt(one_of("+-")), digit1)).parse(input)
}

fn suffix(input: &str) -> PResult<&str> {
    take_while(|c: char| c.is_ascii_alphabetic()).parse(input)
}

fn integer_type(suffix: &str) -> Option<&'static str> {
    match suffix.to_ascii_lowercase().as_str() {
        "" => Some("int"),
        "u" => Some("unsigned int"),
        "l" => Some("long int"),
        "ll" => Some("long long int"),
        "ul" | "lu" => Some("unsigned long int"),
        "ull" | "llu" => Some("unsigned long long int"),
        _ => None,
    }
}

fn floating_type(suffix: &str) -> Option<&'static str> {
    match suffix.to_ascii_lowercase().as_str() {
        "" => Some("double"),
        "f" => Some("float"),
        "l" => Some("long double"),
        _ => None,
    }
}

fn floating_digits(input: &str) -> PResult<&str> {
    alt((
        recognize((digits, char('.'), opt(digits), opt(exponent))),
        recognize((char('.'), digits, opt(exponent))),
        recognize((digits, exponent)),
    ))
    .parse(input)
}

fn integer_digits(input: &str) -> PResult<&str> {
    alt((
        recognize((
            tag_no_case("0x"),
            take_while1(|c: char| c.is_ascii_hexdigit() || c == '\''),
        )),
        recognize((
            tag_no_case("0b"),
            take_while1(|c: char| c == '0' || c == '1' || c == '\''),
        )),
        digits,
    ))
    .parse(input)
}

fn typed_number<'a>(
    input: &'a str,
    body: fn(&'a str) -> PResult<'a, &'a str>,
    type_of: fn(&str) -> Option<&'static str>,
) -> PResult<'a, Literal> {
    let (rest, _) = body(input)?;
    let (rest, suffix_text) = suffix(rest)?;
    let (rest, _) = not(satisfy(is_ident_char)).parse(rest)?;
    match type_of(suffix_text) {
        Some(ty) => Ok((
            rest,
            Literal::Number {
                text: input[..input.len() - rest.len()].to_string(),
                ty: Type::simple(ty),
            },
        )),
        None => fail(input, ErrorKind::Verify),
    }
}

/// Numeric literal; the suffix selects the type
///
/// Integers: none `int`, `u` `unsigned int`, `l` `long int`, `ll` `long long
/// int`, `ul` `unsigned long int`, `ull` `unsigned long long int`.
/// Floating: none `double`, `f` `float`, `l` `long double`.
pub fn number_literal(input: &str) -> PResult<Literal> {
    let (input, _) = ws(input)?;
    alt((floating_literal, integer_literal)).parse(input)
}

fn floating_literal(input: &str) -> PResult<Literal> {
    typed_number(input, floating_digits, floating_type)
}

fn integer_literal(input: &str) -> PResult<Literal> {
    typed_number(input, integer_digits, integer_type)
}

/// Number text with an optional sign, for template arguments
fn signed_number_text(input: &str) -> PResult<String> {
    let (input, _) = ws(input)?;
    let (rest, text) = recognize((opt(char('-')), number_literal)).parse(input)?;
    Ok((rest, text.to_string()))
}

fn encoding_prefix(input: &str) -> PResult<&str> {
    alt((tag("u8"), tag("u"), tag("U"), tag("L"))).parse(input)
}

fn single_quoted(input: &str) -> PResult<&str> {
    quoted_body(input, '\'')
}

fn double_quoted(input: &str) -> PResult<&str> {
    quoted_body(input, '"')
}

/// `'a'`, `'\n'`, `u8'x'`
pub fn char_literal(input: &str) -> PResult<Literal> {
    let (input, _) = ws(input)?;
    let (rest, (_, body)) = (opt(encoding_prefix), single_quoted).parse(input)?;
    if body.is_empty() {
        return fail(input, ErrorKind::Char);
    }
    Ok((rest, Literal::Char(body.to_string())))
}

/// `"text"`, adjacent literals are concatenated
pub fn string_literal(input: &str) -> PResult<Literal> {
    let (input, _) = ws(input)?;
    let (rest, parts) = many1(preceded(
        ws,
        preceded(opt(encoding_prefix), double_quoted),
    ))
    .parse(input)?;
    Ok((rest, Literal::Str(parts.concat())))
}

/// Any literal, including `true`, `false` and `nullptr`
pub fn literal(input: &str) -> PResult<Literal> {
    context(
        "literal",
        alt((
            number_literal,
            string_literal,
            char_literal,
            value(Literal::Bool(true), keyword("true")),
            value(Literal::Bool(false), keyword("false")),
            value(Literal::Nullptr, keyword("nullptr")),
        )),
    )
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal_type(text: &str) -> String {
        match number_literal(text) {
            Ok((rest, Literal::Number { ty, .. })) => {
                assert!(rest.is_empty(), "left over: {:?}", rest);
                ty.qualified_name()
            }
            other => panic!("not a number: {:?}", other),
        }
    }

    #[test]
    fn test_fundamental_type_is_one_segment() {
        let (_, ty) = type_spec("unsigned long long int x").unwrap();
        assert_eq!(ty.name, vec!["unsigned long long int".to_string()]);
        let (rest, ty) = type_spec("long double* p").unwrap();
        assert_eq!(ty.qualified_name(), "long double");
        assert_eq!(ty.trailing, vec![TypeQualifier::Pointer]);
        assert_eq!(rest, " p");
    }

    #[test]
    fn test_nested_template_args() {
        let (rest, ty) = type_spec("const std::map<std::string, std::vector<int>>& m").unwrap();
        assert_eq!(rest, " m");
        assert_eq!(ty.leading, vec![TypeQualifier::Const]);
        assert_eq!(ty.to_string(), "const std::map<std::string, std::vector<int>>&");
    }

    #[test]
    fn test_template_params() {
        let (_, params) = template_params("template <class T, int N = 3, typename... Ts>").unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[1].kind.qualified_name(), "int");
        assert_eq!(params[1].default.as_deref(), Some("3"));
        assert!(params[2].variadic);
        assert_eq!(params[2].argument(), "Ts...");
    }

    #[test]
    fn test_numeric_suffixes() {
        assert_eq!(literal_type("5"), "int");
        assert_eq!(literal_type("5u"), "unsigned int");
        assert_eq!(literal_type("5l"), "long int");
        assert_eq!(literal_type("5LL"), "long long int");
        assert_eq!(literal_type("5ul"), "unsigned long int");
        assert_eq!(literal_type("5ULL"), "unsigned long long int");
        assert_eq!(literal_type("5.0"), "double");
        assert_eq!(literal_type("5.0f"), "float");
        assert_eq!(literal_type("5.0l"), "long double");
        assert_eq!(literal_type("1'000'000"), "int");
        assert_eq!(literal_type("0xFFu"), "unsigned int");
        assert_eq!(literal_type("1e10"), "double");
        assert!(number_literal("5q").is_err());
    }

    #[test]
    fn test_string_and_char_literals() {
        let (_, s) = string_literal(r#""a\"b" "c""#).unwrap();
        assert_eq!(s, Literal::Str(r#"a\"bc"#.to_string()));
        let (_, c) = char_literal(r"'\n'").unwrap();
        assert_eq!(c, Literal::Char(r"\n".to_string()));
    }
}

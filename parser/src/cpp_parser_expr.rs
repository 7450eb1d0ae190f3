//! Expression grammar for initializers and default arguments
//!
//! Precedence is not modelled: binary operators fold left to right. The tree
//! is only used to find where an expression ends and what it looks like.

use nom::{
    branch::alt,
    character::complete::char,
    combinator::{map, not, opt, recognize},
    error::{context, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded, terminated},
    Parser,
};

use crate::cpp_ast::{Expr, Type};
use crate::cpp_parser::{
    brace_group, fail, is_blank, keyword, paren_group, square_group, symbol, value_end, ws,
    PResult,
};
use crate::cpp_parser_types::{literal, template_args, type_name, type_spec};

/// Longest spelling first so `<<=` wins over `<<` and `<`
const BINARY_OPERATORS: &[&str] = &[
    "->*", "<<=", ">>=", "<=>", "->", ".*", "+=", "-=", "*=", "/=", "%=", "<<", ">>", "<=", ">=",
    "&&", "&=", "||", "|=", "^=", "!=", "==", "+", "-", "*", "/", "%", "<", ">", "&", "|", "^",
    "=", ".",
];

const PREFIX_OPERATORS: &[&str] = &["++", "--", "!", "~", "-", "+", "*", "&"];

fn operator_from<'a>(operators: &[&'static str], input: &'a str) -> PResult<'a, &'a str> {
    let (rest, _) = ws(input)?;
    for op in operators {
        if let Some(after) = rest.strip_prefix(op) {
            return Ok((after, &rest[..op.len()]));
        }
    }
    fail(input, ErrorKind::Tag)
}

fn binary_operator(input: &str) -> PResult<&str> {
    operator_from(BINARY_OPERATORS, input)
}

fn prefix_operator(input: &str) -> PResult<&str> {
    operator_from(PREFIX_OPERATORS, input)
}

/// Any expression, including `a ? b : c`
pub fn expression(input: &str) -> PResult<Expr> {
    context("expression", conditional).parse(input)
}

fn ternary_colon(input: &str) -> PResult<&str> {
    terminated(symbol(":"), not(char(':'))).parse(input)
}

fn conditional(input: &str) -> PResult<Expr> {
    let (input, condition) = binary(input)?;
    let (input, branches) = opt((
        preceded(symbol("?"), expression),
        preceded(ternary_colon, expression),
    ))
    .parse(input)?;
    match branches {
        Some((then, otherwise)) => Ok((
            input,
            Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        )),
        None => Ok((input, condition)),
    }
}

fn binary(input: &str) -> PResult<Expr> {
    let (mut input, mut lhs) = unary(input)?;
    loop {
        match (binary_operator, unary).parse(input) {
            Ok((rest, (op, rhs))) => {
                lhs = Expr::Binary {
                    op: op.to_string(),
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, lhs)),
            Err(e) => return Err(e),
        }
    }
}

fn prefixed(input: &str) -> PResult<Expr> {
    let (input, (op, operand)) = (prefix_operator, unary).parse(input)?;
    Ok((
        input,
        Expr::Unary {
            op: op.to_string(),
            operand: Box::new(operand),
            postfix: false,
        },
    ))
}

fn unary(input: &str) -> PResult<Expr> {
    alt((prefixed, postfix)).parse(input)
}

fn call_arguments(input: &str) -> PResult<Vec<Expr>> {
    delimited(
        symbol("("),
        separated_list0(symbol(","), expression),
        symbol(")"),
    )
    .parse(input)
}

fn postfix(input: &str) -> PResult<Expr> {
    let (mut input, mut expr) = primary(input)?;
    loop {
        if let Ok((rest, args)) = call_arguments(input) {
            expr = match expr {
                Expr::Name {
                    name,
                    template_args,
                    call: None,
                } => Expr::Name {
                    name,
                    template_args,
                    call: Some(args),
                },
                other => Expr::Call {
                    callee: Box::new(other),
                    args,
                },
            };
            input = rest;
        } else if let Ok((rest, index)) =
            delimited(symbol("["), expression, symbol("]")).parse(input)
        {
            expr = Expr::Subscript {
                target: Box::new(expr),
                index: Box::new(index),
            };
            input = rest;
        } else if let Ok((rest, op)) = alt((symbol("++"), symbol("--"))).parse(input) {
            expr = Expr::Unary {
                op: op.to_string(),
                operand: Box::new(expr),
                postfix: true,
            };
            input = rest;
        } else {
            return Ok((input, expr));
        }
    }
}

fn primary(input: &str) -> PResult<Expr> {
    alt((
        map(literal, Expr::Literal),
        closure,
        parenthesized,
        brace_init,
        name_expression,
    ))
    .parse(input)
}

fn parenthesized(input: &str) -> PResult<Expr> {
    map(
        delimited(symbol("("), expression, symbol(")")),
        |e| Expr::Paren(Box::new(e)),
    )
    .parse(input)
}

fn brace_items(input: &str) -> PResult<Vec<Expr>> {
    delimited(
        symbol("{"),
        terminated(
            separated_list0(symbol(","), expression),
            opt(symbol(",")),
        ),
        symbol("}"),
    )
    .parse(input)
}

fn brace_init(input: &str) -> PResult<Expr> {
    map(brace_items, |items| Expr::BraceInit { ty: None, items }).parse(input)
}

fn closure_specifier(input: &str) -> PResult<&str> {
    alt((
        keyword("mutable"),
        keyword("constexpr"),
        recognize((keyword("noexcept"), opt(paren_group))),
    ))
    .parse(input)
}

/// `[capture](params) mutable -> T { body }`; the body stays opaque
fn closure(input: &str) -> PResult<Expr> {
    let (input, capture) = square_group(input)?;
    let (input, _) = opt(paren_group).parse(input)?;
    let (input, _) = many0(closure_specifier).parse(input)?;
    let (input, _) = opt(preceded(symbol("->"), type_spec)).parse(input)?;
    let (input, body) = brace_group(input)?;
    Ok((
        input,
        Expr::Closure {
            capture: capture[1..capture.len() - 1].trim().to_string(),
            body: body.to_string(),
        },
    ))
}

/// `name`, `ns::f<int>`, or a typed brace initializer `std::pair<int, int>{1, 2}`
fn name_expression(input: &str) -> PResult<Expr> {
    let (input, name) = type_name(input)?;
    let (input, template_args) = opt(template_args).parse(input)?;
    let (input, items) = opt(brace_items).parse(input)?;
    let expr = match items {
        Some(items) => Expr::BraceInit {
            ty: Some(Type {
                name,
                template_args,
                ..Type::default()
            }),
            items,
        },
        None => Expr::Name {
            name,
            template_args,
            call: None,
        },
    };
    Ok((input, expr))
}

fn ends_value(rest: &str) -> bool {
    match ws(rest) {
        Ok((after, _)) => after.is_empty() || after.starts_with(&[',', ';', ')', ']', '}'][..]),
        Err(_) => false,
    }
}

/// Initializer or default-argument text, trimmed
///
/// Text the expression grammar does not cover (`new T`, `throw x`) is taken
/// as a balanced run up to the next `,`, `;` or closing bracket.
pub fn value_text(input: &str) -> PResult<String> {
    let (start, _) = ws(input)?;
    if let Ok((rest, text)) = recognize(expression).parse(start) {
        if ends_value(rest) {
            return Ok((rest, text.trim().to_string()));
        }
    }
    match value_end(start) {
        Some(end) if !is_blank(&start[..end]) => {
            Ok((&start[end..], start[..end].trim().to_string()))
        }
        _ => fail(start, ErrorKind::TakeUntil),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpp_ast::Literal;

    #[test]
    fn test_binary_folds_left() {
        let (rest, expr) = expression("a + 1 * b").unwrap();
        assert!(rest.is_empty());
        match expr {
            Expr::Binary { op, lhs, .. } => {
                assert_eq!(op, "*");
                assert!(matches!(*lhs, Expr::Binary { .. }));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_call_with_arguments() {
        let (_, expr) = expression("f(1, \"x\")").unwrap();
        match expr {
            Expr::Name {
                name,
                call: Some(args),
                ..
            } => {
                assert_eq!(name, vec!["f".to_string()]);
                assert_eq!(args.len(), 2);
                assert_eq!(args[1], Expr::Literal(Literal::Str("x".to_string())));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_brace_init_allows_trailing_comma() {
        let (rest, expr) = expression("std::vector<int>{1, 2,};").unwrap();
        assert_eq!(rest, ";");
        match expr {
            Expr::BraceInit { ty: Some(ty), items } => {
                assert_eq!(ty.to_string(), "std::vector<int>");
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected brace init, got {:?}", other),
        }
    }

    #[test]
    fn test_closure_body_is_opaque() {
        let (rest, expr) = expression("[&](int a) { return a; }").unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            expr,
            Expr::Closure {
                capture: "&".to_string(),
                body: "{ return a; }".to_string()
            }
        );
    }

    #[test]
    fn test_conditional_and_unary() {
        let (_, expr) = expression("x ? -y++ : z").unwrap();
        match expr {
            Expr::Conditional { then, .. } => match *then {
                Expr::Unary { op, operand, postfix } => {
                    assert_eq!(op, "-");
                    assert!(!postfix);
                    assert!(matches!(*operand, Expr::Unary { postfix: true, .. }));
                }
                other => panic!("expected unary, got {:?}", other),
            },
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_value_text_falls_back_to_balanced_run() {
        let (rest, text) = value_text(" a + 1, b").unwrap();
        assert_eq!(text, "a + 1");
        assert_eq!(rest, ", b");

        let (rest, text) = value_text("new Foo(1), b").unwrap();
        assert_eq!(text, "new Foo(1)");
        assert_eq!(rest, ", b");
    }
}

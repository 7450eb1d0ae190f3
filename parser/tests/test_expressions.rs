//! Expression tests: default arguments and initializers

use parser::cpp_parser_decls::{function_declaration, var_declaration};
use parser::cpp_parser_expr::expression;
use parser::Expr;

#[test]
fn test_default_arguments() {
    let (_, f) = function_declaration(
        "void draw(int x = width / 2, Color c = Color{0, 0, 0}, bool fill = !outline);",
    )
    .unwrap();
    let defaults: Vec<_> = f
        .params
        .iter()
        .map(|p| p.default_value.clone().unwrap_or_default())
        .collect();
    assert_eq!(defaults, vec!["width / 2", "Color{0, 0, 0}", "!outline"]);
}

#[test]
fn test_member_access_and_subscript() {
    match expression("items[i].size() - 1") {
        Ok((rest, Expr::Binary { op, lhs, .. })) => {
            assert!(rest.is_empty());
            assert_eq!(op, "-");
            match *lhs {
                Expr::Binary { op, lhs, .. } => {
                    assert_eq!(op, ".");
                    assert!(matches!(*lhs, Expr::Subscript { .. }));
                }
                other => panic!("Expected member access, got {:?}", other),
            }
        }
        other => panic!("Expected binary expression, got {:?}", other),
    }
}

#[test]
fn test_templated_call() {
    match expression("static_cast<int>(value)") {
        Ok((_, Expr::Name { name, template_args, call })) => {
            assert_eq!(name, vec!["static_cast".to_string()]);
            assert_eq!(template_args.map(|a| a.len()), Some(1));
            assert_eq!(call.map(|c| c.len()), Some(1));
        }
        other => panic!("Expected templated call, got {:?}", other),
    }
}

#[test]
fn test_closure_initializer() {
    let (rest, vars) =
        var_declaration("auto cmp = [](const T& a, const T& b) { return a < b; };").unwrap();
    assert!(rest.is_empty());
    assert_eq!(vars[0].name, "cmp");
    assert_eq!(
        vars[0].default_value.as_deref(),
        Some("[](const T& a, const T& b) { return a < b; }")
    );
}

#[test]
fn test_parenthesized_conditional() {
    match expression("(a > b ? a : b)") {
        Ok((_, Expr::Paren(inner))) => {
            assert!(matches!(*inner, Expr::Conditional { .. }));
        }
        other => panic!("Expected parenthesized conditional, got {:?}", other),
    }
}

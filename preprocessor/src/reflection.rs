//! Reflection boilerplate
//!
//! Every finished class gets a `friend` grant for `reflect::Reflect<Name>`
//! and, once the outermost enclosing scope has closed, a specialization of
//! `reflect::Reflect` listing its data members and bases. Enumerations get a
//! specialization listing their enumerators. `$reflexpr(expr)` is rewritten to
//! a value of the matching specialization.

use parser::{Class, ClassKind, Enumeration, Var};

/// Forward declaration prepended to files when reflection is enabled
pub const PRELUDE: &str = "namespace reflect { template <class T> struct Reflect; }";

const REFLEXPR: &str = "$reflexpr";
const REFLEXPR_OPEN: &str = "reflect::Reflect<std::remove_cvref_t<decltype(";
const REFLEXPR_CLOSE: &str = ")>>{}";

/// Inserted just before a class's closing brace
pub fn friend_declaration(class_name: &str) -> String {
    format!("friend struct reflect::Reflect<{}>;\n", class_name)
}

fn qualify(path: &[&str], name: &str) -> String {
    let mut segments: Vec<&str> = path.to_vec();
    segments.push(name);
    segments.join("::")
}

fn tuple_of(items: &[String]) -> String {
    format!("std::make_tuple({})", items.join(", "))
}

fn tuple_type(items: &[String]) -> String {
    format!("std::tuple<{}>", items.join(", "))
}

fn member_type(var: &Var) -> String {
    match &var.array_extent {
        Some(extent) => format!("{}{}", var.ty, extent),
        None => var.ty.to_string(),
    }
}

struct MemberTables {
    pointers: Vec<String>,
    names: Vec<String>,
    types: Vec<String>,
}

impl MemberTables {
    fn new<'a>(target: &str, members: impl Iterator<Item = &'a Var>) -> Self {
        let mut tables = MemberTables {
            pointers: Vec::new(),
            names: Vec::new(),
            types: Vec::new(),
        };
        for var in members.filter(|v| !v.name.is_empty()) {
            tables.pointers.push(format!("&{}::{}", target, var.name));
            tables.names.push(format!("\"{}\"", var.name));
            tables.types.push(member_type(var));
        }
        tables
    }

    fn write(&self, prefix: &str, out: &mut String) {
        out.push_str(&format!(
            "  static constexpr auto {}data_members = {};\n",
            prefix,
            tuple_of(&self.pointers)
        ));
        out.push_str(&format!(
            "  static constexpr auto {}data_member_names = {};\n",
            prefix,
            tuple_of(&self.names)
        ));
        out.push_str(&format!(
            "  using {}data_member_types = {};\n",
            prefix,
            tuple_type(&self.types)
        ));
    }
}

/// Specialization of `reflect::Reflect` for `class`, declared inside `path`
pub fn class_specialization(path: &[&str], class: &Class) -> String {
    let qualified = qualify(path, &class.name);
    let (header, target) = match &class.template_params {
        Some(params) => {
            let declarations: Vec<String> = params.iter().map(|p| p.declaration()).collect();
            let arguments: Vec<String> = params.iter().map(|p| p.argument()).collect();
            (
                format!("template <{}>", declarations.join(", ")),
                format!("{}<{}>", qualified, arguments.join(", ")),
            )
        }
        None => ("template <>".to_string(), qualified),
    };
    let object_type = match class.kind {
        ClassKind::Struct => "STRUCT",
        ClassKind::Class | ClassKind::MetaClassInstance => "CLASS",
    };

    let mut out = format!("{}\nstruct reflect::Reflect<{}> {{\n", header, target);
    out.push_str(&format!("  using type = {};\n", target));
    out.push_str(&format!("  static constexpr auto name = \"{}\";\n", class.name));
    out.push_str(&format!(
        "  static constexpr auto object_type = reflect::ObjectType::{};\n",
        object_type
    ));

    MemberTables::new(&target, class.members.public.iter()).write("public_", &mut out);
    MemberTables::new(&target, class.members.iter()).write("", &mut out);

    let public_bases: Vec<String> = class.bases.public.iter().map(|b| b.to_string()).collect();
    let bases: Vec<String> = class.bases.iter().map(|b| b.to_string()).collect();
    out.push_str(&format!(
        "  using public_base_classes = {};\n",
        tuple_type(&public_bases)
    ));
    out.push_str(&format!("  using base_classes = {};\n", tuple_type(&bases)));
    out.push_str("};\n");
    out
}

/// Specialization of `reflect::Reflect` for a named enumeration
pub fn enum_specialization(path: &[&str], enumeration: &Enumeration) -> String {
    let qualified = qualify(path, &enumeration.name);
    let enumerators: Vec<String> = enumeration
        .enumerators
        .iter()
        .map(|e| format!("{}::{}", qualified, e))
        .collect();
    let names: Vec<String> = enumeration
        .enumerators
        .iter()
        .map(|e| format!("\"{}\"", e))
        .collect();
    let underlying = match &enumeration.underlying {
        Some(ty) => ty.to_string(),
        None => format!("std::underlying_type_t<{}>", qualified),
    };

    let mut out = format!("template <>\nstruct reflect::Reflect<{}> {{\n", qualified);
    out.push_str(&format!("  using type = {};\n", qualified));
    out.push_str(&format!(
        "  static constexpr auto name = \"{}\";\n",
        enumeration.name
    ));
    out.push_str("  static constexpr auto object_type = reflect::ObjectType::ENUM;\n");
    out.push_str(&format!(
        "  static constexpr bool is_scoped = {};\n",
        enumeration.is_scoped
    ));
    out.push_str(&format!("  using underlying_type = {};\n", underlying));
    out.push_str(&format!(
        "  static constexpr auto enumerators = {};\n",
        tuple_of(&enumerators)
    ));
    out.push_str(&format!(
        "  static constexpr auto enumerator_names = {};\n",
        tuple_of(&names)
    ));
    out.push_str("};\n");
    out
}

/// End of a string or character literal starting at `text[0]`
fn literal_end(text: &str, quote: char) -> usize {
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\n' => return i,
            c if c == quote => return i + 1,
            _ => {}
        }
    }
    text.len()
}

/// Rewrite `$reflexpr(expr)` to `reflect::Reflect<std::remove_cvref_t<decltype(expr)>>{}`
///
/// Literals and comments are copied untouched. Markers may nest.
pub fn rewrite_reflexpr(text: &str) -> String {
    if !text.contains(REFLEXPR) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    // paren depth at which each open marker's argument list started
    let mut markers: Vec<usize> = Vec::new();
    let mut depth = 0usize;
    let mut previous = '\0';
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        let skip = if rest.starts_with("//") {
            rest.find('\n').unwrap_or(rest.len())
        } else if rest.starts_with("/*") {
            rest[2..].find("*/").map_or(rest.len(), |end| end + 4)
        } else if rest.starts_with('"') {
            literal_end(rest, '"')
        } else if rest.starts_with('\'') && !previous.is_ascii_alphanumeric() {
            literal_end(rest, '\'')
        } else {
            0
        };
        if skip > 0 {
            out.push_str(&rest[..skip]);
            i += skip;
            previous = '\0';
            continue;
        }

        if let Some(after) = rest.strip_prefix(REFLEXPR) {
            let gap = after.len() - after.trim_start().len();
            if after[gap..].starts_with('(') {
                out.push_str(REFLEXPR_OPEN);
                depth += 1;
                markers.push(depth);
                i += REFLEXPR.len() + gap + 1;
                previous = '(';
                continue;
            }
        }

        let c = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };
        match c {
            '(' => depth += 1,
            ')' => {
                if markers.last() == Some(&depth) {
                    markers.pop();
                    depth -= 1;
                    out.push_str(REFLEXPR_CLOSE);
                    i += 1;
                    previous = ')';
                    continue;
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
        out.push(c);
        previous = c;
        i += c.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::parse_source;

    #[test]
    fn test_class_specialization_tables() {
        let global = parse_source(
            "namespace geo { struct Point : Base { int x; protected: float y[2]; private: char z; }; }",
        )
        .unwrap();
        let point = &global.namespaces[0].classes[0];
        let text = class_specialization(&["geo"], point);
        assert!(text.starts_with("template <>\nstruct reflect::Reflect<geo::Point> {\n"));
        assert!(text.contains("public_data_members = std::make_tuple(&geo::Point::x);"));
        assert!(text.contains(
            "data_members = std::make_tuple(&geo::Point::x, &geo::Point::y, &geo::Point::z);"
        ));
        assert!(text.contains("using data_member_types = std::tuple<int, float[2], char>;"));
        assert!(text.contains("using public_base_classes = std::tuple<Base>;"));
        assert!(text.contains("reflect::ObjectType::STRUCT;"));
        assert!(text.contains("static constexpr auto name = \"Point\";"));
    }

    #[test]
    fn test_templated_class_mirrors_parameters() {
        let global = parse_source("template <class T, int N> class Buf { T data; };").unwrap();
        let text = class_specialization(&[], &global.classes[0]);
        assert!(text.starts_with("template <class T, int N>\nstruct reflect::Reflect<Buf<T, N>> {"));
        assert!(text.contains("std::make_tuple(&Buf<T, N>::data)"));
        assert!(text.contains("public_data_members = std::make_tuple();"));
        assert!(text.contains("reflect::ObjectType::CLASS;"));
    }

    #[test]
    fn test_enum_specialization() {
        let global = parse_source("enum Color { Red, Green };").unwrap();
        let text = enum_specialization(&["ui"], &global.enums[0]);
        assert!(text.contains("struct reflect::Reflect<ui::Color>"));
        assert!(text.contains("is_scoped = false;"));
        assert!(text.contains("using underlying_type = std::underlying_type_t<ui::Color>;"));
        assert!(text.contains("enumerators = std::make_tuple(ui::Color::Red, ui::Color::Green);"));
        assert!(text.contains("enumerator_names = std::make_tuple(\"Red\", \"Green\");"));
    }

    #[test]
    fn test_reflexpr_rewrite() {
        assert_eq!(
            rewrite_reflexpr("auto r = $reflexpr(f(a));"),
            "auto r = reflect::Reflect<std::remove_cvref_t<decltype(f(a))>>{};"
        );
        assert_eq!(
            rewrite_reflexpr("g($reflexpr($reflexpr(x)), y)"),
            "g(reflect::Reflect<std::remove_cvref_t<decltype(reflect::Reflect<std::remove_cvref_t<decltype(x)>>{})>>{}, y)"
        );
    }

    #[test]
    fn test_reflexpr_skips_literals_and_comments() {
        let text = "s = \"$reflexpr(x)\"; // $reflexpr(y)\nn = 1'000; c = ')';";
        assert_eq!(rewrite_reflexpr(text), text);
    }
}

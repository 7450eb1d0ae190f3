//! Whole-file transformation tests

use indexmap::IndexSet;
use preprocessor::evaluator::{Evaluator, MetaClient, StreamTransport};
use preprocessor::{transform_source, ProtocolError, TransformError, TransformOptions};
use parser::ParseFailure;
use std::io::Cursor;

type MemoryClient = MetaClient<StreamTransport<Cursor<Vec<u8>>, Vec<u8>>>;

fn client(replies: &str) -> MemoryClient {
    preprocessor::logging::init_test();
    match MetaClient::connect(StreamTransport::new(
        Cursor::new(replies.as_bytes().to_vec()),
        Vec::new(),
    )) {
        Ok(client) => client,
        Err(e) => panic!("Handshake failed: {}", e),
    }
}

fn sent(client: &MemoryClient) -> String {
    String::from_utf8_lossy(client.transport().writer()).into_owned()
}

fn options() -> TransformOptions {
    TransformOptions {
        include_line: "#include <meta.hpp>".to_string(),
        reflection: false,
        entry_point: false,
        generator_headers: Vec::new(),
    }
}

fn transform(source: &str, client: Option<&mut MemoryClient>, options: &TransformOptions) -> String {
    let mut generators = IndexSet::new();
    let evaluator = client.map(|c| c as &mut dyn Evaluator);
    match transform_source(source, evaluator, options, &mut generators) {
        Ok(output) => output.text,
        Err(e) => panic!("Transform failed: {}", e),
    }
}

#[test]
fn test_plain_source_only_gains_include_line() {
    let source = "#include <vector>\n\nnamespace app {\n\
                  template <typename T>\n\
                  class Stack : public Base {\n\
                  public:\n  void push(const T& value);\n  T pop() { T v = items.back(); items.pop_back(); return v; }\n\
                  private:\n  std::vector<T> items;\n};\n\
                  enum class Mode { Fast, Safe };\n\
                  } // namespace app\n";
    let text = transform(source, None, &options());
    assert_eq!(text, format!("#include <meta.hpp>\n{}", source));
}

#[test]
fn test_meta_class_is_expanded_once() {
    let generated = "\nstatic_assert(sizeof(Bar) > 0);";
    let mut client = client(&format!("1\nfoo\n{}\n{}\n", generated.len(), generated));
    let text = transform("foo Bar { public: int x; };\n", Some(&mut client), &options());

    assert_eq!(
        text,
        format!("#include <meta.hpp>\nclass Bar {{ public: int x; }};{}\n", generated)
    );
    // data members are not part of the request
    assert_eq!(sent(&client), "1\n2\nfoo\nBar\n0\n");
}

#[test]
fn test_meta_class_request_lists_methods() {
    let mut client = client("1\nfoo\n0\n");
    let source = "foo Shape : public Base {\n  virtual int area() const = 0;\n  void scale(double factor);\n};\n";
    let text = transform(source, Some(&mut client), &options());

    assert!(text.contains("class Shape : public Base {"));
    assert_eq!(
        sent(&client),
        "1\n2\nfoo\nShape\n2\nint\narea\n0\nvoid\nscale\n1\ndouble\nfactor\n"
    );
}

#[test]
fn test_unknown_generator_name_falls_through() {
    let mut client = client("1\nfoo\n");
    let source = "bar Baz { };\n";
    let text = transform(source, Some(&mut client), &options());
    assert_eq!(text, format!("#include <meta.hpp>\n{}", source));
    assert_eq!(sent(&client), "1\n");
}

#[test]
fn test_meta_function_is_collected_for_dispatch() {
    let source = "namespace shapes {\n\
                  constexpr void value(meta::type target, const meta::type source) {\n\
                  \x20 meta::compiler.require(source.variables().size() > 0);\n\
                  }\n\
                  }\n";
    let mut generators = IndexSet::new();
    let options = TransformOptions {
        entry_point: true,
        ..options()
    };
    let output = match transform_source(source, None, &options, &mut generators) {
        Ok(output) => output,
        Err(e) => panic!("Transform failed: {}", e),
    };

    assert!(output.text.contains("\nvoid value(meta::type target, const meta::type source) {"));
    assert!(!output.text.contains("constexpr void value"));
    assert!(output.text.contains("{\"value\", &shapes::value},"));
    assert_eq!(
        output.discovered.iter().collect::<Vec<_>>(),
        vec!["shapes::value"]
    );
    assert!(generators.contains("shapes::value"));
}

#[test]
fn test_entry_point_without_generators_has_no_dispatch() {
    let options = TransformOptions {
        entry_point: true,
        ..options()
    };
    let text = transform("int answer() { return 42; }\n", None, &options);
    assert!(!text.contains("int main()"));
}

#[test]
fn test_reflection_output() {
    let options = TransformOptions {
        reflection: true,
        ..options()
    };
    let source = "namespace geo {\nstruct Point { int x; int y; };\nenum Axis { X, Y };\n}\nint n = sizeof($reflexpr(n));\n";
    let text = transform(source, None, &options);

    assert!(text.starts_with(
        "#include <meta.hpp>\nnamespace reflect { template <class T> struct Reflect; }\n"
    ));
    assert!(text.contains("struct Point { int x; int y; friend struct reflect::Reflect<Point>;\n};"));
    // specializations follow the close of the outermost namespace
    let point = text.find("}\ntemplate <>\nstruct reflect::Reflect<geo::Point> {");
    let axis = text.find("\ntemplate <>\nstruct reflect::Reflect<geo::Axis> {");
    assert!(point.is_some() && axis > point, "unexpected output:\n{}", text);
    assert!(text.contains("sizeof(reflect::Reflect<std::remove_cvref_t<decltype(n)>>{})"));
}

#[test]
fn test_structural_failure_reports_residual() {
    let mut generators = IndexSet::new();
    match transform_source("int x;\n@@@ what\n", None, &options(), &mut generators) {
        Err(TransformError::Parse(ParseFailure::Structural { offset, residual, .. })) => {
            assert_eq!(offset, 7);
            assert_eq!(residual, "@@@ what");
        }
        other => panic!("Expected structural failure, got {:?}", other.map(|o| o.text)),
    }
}

#[test]
fn test_truncated_reply_is_protocol_error() {
    let mut client = client("1\nfoo\n40\nint partial;\n");
    let mut generators = IndexSet::new();
    let evaluator: &mut dyn Evaluator = &mut client;
    match transform_source("\nfoo Bar {};\n", Some(evaluator), &options(), &mut generators) {
        Err(TransformError::Protocol {
            generator,
            class,
            offset,
            source: ProtocolError::ChannelClosed,
        }) => {
            assert_eq!(generator, "foo");
            assert_eq!(class, "Bar");
            assert_eq!(offset, 1);
        }
        other => panic!("Expected protocol error, got {:?}", other.map(|o| o.text)),
    }
}

#[test]
fn test_constexpr_in_leading_comment_is_kept() {
    let source = "// constexpr helper\nconstexpr void gen(meta::type t, const meta::type s) {\n}\n";
    let text = transform(source, None, &options());
    assert!(text.contains("// constexpr helper\nvoid gen(meta::type t, const meta::type s) {"));
    assert!(!text.contains("constexpr void gen"));
}

#[test]
fn test_splice_waits_for_terminator_on_next_line() {
    let mut waiting = client("1\nfoo\n3\nGEN\n");
    let text = transform("foo Bar {\n}\n;\n", Some(&mut waiting), &options());
    assert_eq!(text, "#include <meta.hpp>\nclass Bar {\n}\n;GEN\n");

    // at the end of the source there is nothing to wait for
    let mut last = client("1\nfoo\n3\nGEN\n");
    let text = transform("foo Bar {\n}", Some(&mut last), &options());
    assert_eq!(text, "#include <meta.hpp>\nclass Bar {\n}GEN");
}

#[test]
fn test_meta_function_scope_ends_with_its_body() {
    let mut client = client("1\nfoo\n3\nGEN\n");
    let source = "constexpr void first(meta::type target, const meta::type source) {\n\
                  \x20 if (source.name().empty()) {\n\
                  \x20   for (auto v : source.variables()) {\n\
                  \x20     foo Inner {};\n\
                  \x20   }\n\
                  \x20 }\n\
                  }\n\
                  foo Bar {};\n\
                  constexpr void second(meta::type target, const meta::type source) {\n\
                  }\n";
    let mut generators = IndexSet::new();
    let evaluator: &mut dyn Evaluator = &mut client;
    let output = match transform_source(source, Some(evaluator), &options(), &mut generators) {
        Ok(output) => output,
        Err(e) => panic!("Transform failed: {}", e),
    };

    // inside the body the header is ordinary code
    assert!(output.text.contains("      foo Inner {};\n"));
    assert!(output.text.contains("\nclass Bar {};GEN\n"));
    assert!(output.text.contains("\nvoid second(meta::type target, const meta::type source) {"));
    assert!(!output.text.contains("constexpr"));
    assert_eq!(
        output.discovered.iter().collect::<Vec<_>>(),
        vec!["first", "second"]
    );
    assert_eq!(sent(&client), "1\n2\nfoo\nBar\n0\n");
}

#[test]
fn test_dispatch_includes_generator_headers_not_yet_included() {
    let mut generators: IndexSet<String> = ["value".to_string()].into_iter().collect();
    let options = TransformOptions {
        entry_point: true,
        generator_headers: vec!["gen/shapes.hpp".to_string(), "other.hpp".to_string()],
        ..options()
    };
    let source = "#include \"shapes.hpp\"\nint helper() { return 0; }\n";
    let output = match transform_source(source, None, &options, &mut generators) {
        Ok(output) => output,
        Err(e) => panic!("Transform failed: {}", e),
    };

    assert_eq!(output.includes, vec!["shapes.hpp"]);
    assert!(output.text.contains("#include \"other.hpp\"\nint main() {"));
    assert!(!output.text.contains("gen/shapes.hpp"));
}

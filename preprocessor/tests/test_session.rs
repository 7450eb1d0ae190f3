//! Batch session tests over temporary source trees

use preprocessor::{discover_sources, FileStatus, Session, TransformConfig};
use std::fs;
use std::path::PathBuf;

fn write(root: &std::path::Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_discovery_orders_headers_first() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "");
    write(dir.path(), "notes.txt", "");
    write(dir.path(), "sub/z.hpp", "");
    write(dir.path(), "b.h", "");

    let files = discover_sources(&[dir.path().to_path_buf()]);
    let relative: Vec<PathBuf> = files.iter().map(|f| f.relative.clone()).collect();
    assert_eq!(
        relative,
        vec![
            PathBuf::from("b.h"),
            PathBuf::from("sub/z.hpp"),
            PathBuf::from("a.cpp")
        ]
    );
}

#[test]
fn test_batch_isolates_failures_and_builds_dispatch() {
    preprocessor::logging::init_test();
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(
        input.path(),
        "shapes.hpp",
        "#pragma once\nconstexpr void value(meta::type target, const meta::type source) {\n}\n",
    );
    write(input.path(), "bad.cpp", "class A {\n  int x;\n");
    write(
        input.path(),
        "main.cpp",
        "#include \"shapes.hpp\"\nint helper() { return 0; }\n",
    );

    let files = discover_sources(&[input.path().to_path_buf()]);
    let mut session = Session::with_evaluator(TransformConfig::default(), None);
    let report = session.run(&files, output.path());

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    let failed = report.files.iter().find(|f| !f.is_success()).unwrap();
    assert!(failed.input.ends_with("bad.cpp"));
    assert!(matches!(failed.status, FileStatus::Failed { source: Some(_), .. }));

    let header = fs::read_to_string(output.path().join("shapes.hpp")).unwrap();
    assert!(header.starts_with("#include <meta.hpp>\n#pragma once\nvoid value("));
    let main = fs::read_to_string(output.path().join("main.cpp")).unwrap();
    assert!(main.contains("{\"value\", &value},"));
    assert!(!output.path().join("bad.cpp").exists());

    let json = report.to_json();
    assert_eq!(json["failed"], 1);
    assert_eq!(json["files"][0]["status"], "ok");
    assert_eq!(json["files"][0]["generators"][0], "value");
}

#[test]
fn test_failure_renders_located_diagnostic() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "broken.hpp", "namespace n {\n}\n}\n");

    let files = discover_sources(&[input.path().join("broken.hpp")]);
    let mut session = Session::with_evaluator(TransformConfig::default(), None);
    let report = session.run(&files, output.path());

    let rendered = report.render_failures(&diagnostics::ErrorFormatter::new());
    assert!(rendered.contains("E0002"), "unexpected rendering: {}", rendered);
}

#[test]
fn test_entry_points_include_generator_headers() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(
        input.path(),
        "gen/shapes.hpp",
        "constexpr void value(meta::type target, const meta::type source) {\n}\n",
    );
    write(input.path(), "main.cpp", "int helper() { return 0; }\n");
    write(input.path(), "sub/tool.cpp", "#include \"../gen/shapes.hpp\"\n");

    let files = discover_sources(&[input.path().to_path_buf()]);
    let mut session = Session::with_evaluator(TransformConfig::default(), None);
    let report = session.run(&files, output.path());
    assert!(report.is_success());

    let main = fs::read_to_string(output.path().join("main.cpp")).unwrap();
    assert!(main.contains("#include \"gen/shapes.hpp\"\nint main() {"));
    let tool = fs::read_to_string(output.path().join("sub/tool.cpp")).unwrap();
    assert_eq!(tool.matches("shapes.hpp").count(), 1);
    assert!(tool.contains("{\"value\", &value},"));
}

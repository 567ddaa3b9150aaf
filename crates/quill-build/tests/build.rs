use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use quill_build::{Build, Config, Failure, Stats};
use quill_syntax::{DefinitionLocation, ModuleLocation, SourceLocation, Span};
use tower_lsp::lsp_types::{HoverContents, InlayHintLabel, Position, Range};

fn write(root: &Path, module: &str, text: &str) {
    let path = root.join("src").join(format!("{}.quill", module));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<Build>) {
    let dir = tempfile::tempdir().unwrap();
    for (module, text) in files {
        write(dir.path(), module, text);
    }
    let build = Build::new(Config::new(dir.path()));
    (dir, build)
}

fn location(name: &str) -> ModuleLocation {
    ModuleLocation::parse(name)
}

fn messages(diagnostics: &quill_syntax::Diagnostics) -> Vec<String> {
    diagnostics
        .values()
        .flatten()
        .map(|d| d.message.clone())
        .collect()
}

// ── Memoization ─────────────────────────────────────────────

#[tokio::test]
async fn unchanged_inputs_are_computed_once() {
    let (_dir, build) = project(&[("main", "(def x int 1)")]);

    let first = build.fetch_elaborated(location("main"), None).await.unwrap();
    // main and the (empty) prelude.
    assert_eq!(
        build.stats(),
        Stats {
            reads: 2,
            parses: 2,
            resolves: 2,
            elaborations: 2,
        }
    );

    let second = build.fetch_elaborated(location("main"), None).await.unwrap();
    assert!(Arc::ptr_eq(&first.value, &second.value));
    assert_eq!(first.hash, second.hash);
    assert_eq!(build.stats().elaborations, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fetches_share_one_computation() {
    let (_dir, build) = project(&[
        ("lib", "(def seven :inline int 7)"),
        ("main", "(import lib seven) (def x int seven)"),
    ]);

    let tasks: Vec<_> = (0..8)
        .map(|_| tokio::spawn(build.fetch_elaborated(location("main"), None)))
        .collect();
    let mut values = Vec::new();
    for task in tasks {
        values.push(task.await.unwrap().unwrap().value);
    }

    assert!(values.iter().all(|value| Arc::ptr_eq(value, &values[0])));
    assert_eq!(build.stats().elaborations, 3);
    assert_eq!(build.stats().parses, 3);
}

#[tokio::test]
async fn repeated_builds_are_deterministic() {
    let source = "(def xs (list _) [1 2]) (def bad int \"no\") (def y int _)";
    let (_dir, build) = project(&[("main", source)]);

    let first = build.fetch_elaborated(location("main"), None).await.unwrap();
    build.close_text(&location("main")).await;
    let second = build.fetch_elaborated(location("main"), None).await.unwrap();

    assert!(!Arc::ptr_eq(&first.value, &second.value));
    assert_eq!(first.value.module, second.value.module);
    assert_eq!(first.value.diagnostics, second.value.diagnostics);
    assert_eq!(first.hash, second.hash);
}

// ── Invalidation ────────────────────────────────────────────

#[tokio::test]
async fn edits_recompute_only_dependents() {
    let (_dir, build) = project(&[
        ("lib", "(def seven int 7)"),
        ("main", "(import lib seven) (def x int seven)"),
        ("other", "(def y int 2)"),
    ]);
    build.fetch_elaborated(location("main"), None).await.unwrap();
    let other = build.fetch_elaborated(location("other"), None).await.unwrap();
    let before = build.stats();

    build
        .change_text(&location("lib"), "(def seven int 8)".into())
        .await;
    build.fetch_elaborated(location("main"), None).await.unwrap();
    let after = build.stats();
    assert_eq!(after.reads, before.reads);
    assert_eq!(after.parses, before.parses + 1);
    assert_eq!(after.resolves, before.resolves + 2);
    assert_eq!(after.elaborations, before.elaborations + 2);

    let other_again = build.fetch_elaborated(location("other"), None).await.unwrap();
    assert!(Arc::ptr_eq(&other.value, &other_again.value));
    assert_eq!(build.stats(), after);
}

#[tokio::test]
async fn identical_text_keeps_the_cache() {
    let text = "(def x int 1)";
    let (_dir, build) = project(&[("main", text)]);
    let first = build.fetch_elaborated(location("main"), None).await.unwrap();
    let before = build.stats();

    build.change_text(&location("main"), text.into()).await;
    let second = build.fetch_elaborated(location("main"), None).await.unwrap();
    assert!(Arc::ptr_eq(&first.value, &second.value));
    assert_eq!(build.stats(), before);
}

#[tokio::test]
async fn editor_text_overrides_disk() {
    let (_dir, build) = project(&[("main", "(def x int 1)")]);
    build
        .change_text(&location("main"), "(def x int \"s\")".into())
        .await;
    let elaborated = build.fetch_elaborated(location("main"), None).await.unwrap();
    insta::assert_snapshot!(
        messages(&elaborated.value.diagnostics).join("\n"),
        @"type mismatch: expected int, found string"
    );

    build.close_text(&location("main")).await;
    let elaborated = build.fetch_elaborated(location("main"), None).await.unwrap();
    assert!(elaborated.value.diagnostics.is_empty());
}

// ── Reading ─────────────────────────────────────────────────

#[tokio::test]
async fn imports_are_read_from_disk() {
    let (_dir, build) = project(&[
        ("std/num", "(def seven :inline int 7)"),
        ("main", "(import std/num seven) (def x int seven)"),
    ]);
    let elaborated = build.fetch_elaborated(location("main"), None).await.unwrap();
    assert!(
        elaborated.value.diagnostics.is_empty(),
        "{:?}",
        elaborated.value.diagnostics
    );
    let resolved = build.fetch_resolved(location("main"), None).await.unwrap();
    assert_eq!(
        resolved.value.dependencies,
        vec![location("prelude"), location("std/num")]
    );
}

#[tokio::test]
async fn missing_modules_read_as_empty() {
    let (_dir, build) = project(&[]);
    let read = build.fetch_read(&location("nowhere")).await;
    assert_eq!(read.value.text, "");

    let elaborated = build.fetch_elaborated(location("nowhere"), None).await.unwrap();
    assert!(elaborated.value.module.definitions.is_empty());
    assert!(elaborated.value.diagnostics.is_empty());
}

#[tokio::test]
async fn prelude_definitions_are_visible_everywhere() {
    let (_dir, build) = project(&[
        ("prelude", "(def one int 1)"),
        ("main", "(def x int one)"),
    ]);
    let elaborated = build.fetch_elaborated(location("main"), None).await.unwrap();
    assert!(elaborated.value.diagnostics.is_empty());
}

#[tokio::test]
async fn cyclic_imports_are_reported_not_awaited() {
    let (_dir, build) = project(&[
        ("a", "(import b g) (def f int 1)"),
        ("b", "(import a f) (def g int 2)"),
    ]);

    let fetch = build.fetch_elaborated(location("a"), None);
    let elaborated = tokio::time::timeout(Duration::from_secs(10), fetch)
        .await
        .expect("cyclic import deadlocked")
        .unwrap();
    let module_level = &elaborated.value.diagnostics[&None];
    assert!(
        module_level
            .iter()
            .any(|d| d.message == "cyclic import of `b`"),
        "{:?}",
        module_level
    );

    let resolved = build.fetch_resolved(location("a"), None).await.unwrap();
    assert_eq!(resolved.value.dependencies, vec![location("prelude")]);
}

#[tokio::test]
async fn inline_types_unfold_two_imports_away() {
    let (_dir, build) = project(&[
        ("c", "(def myint :inline (type int_tag) int)"),
        ("a", "(import c myint) (def seven myint 7)"),
        ("main", "(import a seven) (def x int seven)"),
    ]);
    let elaborated = build.fetch_elaborated(location("main"), None).await.unwrap();
    assert!(
        elaborated.value.diagnostics.is_empty(),
        "{:?}",
        elaborated.value.diagnostics
    );

    let mut scope: Vec<_> = elaborated
        .value
        .scope
        .iter()
        .map(|module| module.module.name.clone())
        .collect();
    scope.sort();
    assert_eq!(scope, vec![location("a"), location("c"), location("prelude")]);
}

#[tokio::test]
async fn self_typed_definitions_report_a_cyclic_solution() {
    let (_dir, build) = project(&[("main", "(def x :rec (list _) [x])")]);
    let elaborated = build.fetch_elaborated(location("main"), None).await.unwrap();
    let messages = messages(&elaborated.value.diagnostics);
    assert_eq!(messages.len(), 1, "{:?}", messages);
    assert!(
        messages[0].starts_with("cyclic solution for meta ?"),
        "{:?}",
        messages
    );

    let report = build.check_project().await.unwrap();
    assert_eq!(
        report.failures,
        vec![Failure::Errors {
            module: location("main"),
            definition: Some(location("main").definition("x")),
            count: 1,
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reversing_an_import_mid_build_does_not_hang() {
    let a_to_b = [("a", "(import b g) (def f int 1)"), ("b", "(def g int 2)")];
    let b_to_a = [("a", "(def f int 1)"), ("b", "(import a f) (def g int 2)")];
    let (_dir, build) = project(&a_to_b);

    let rounds = async {
        for round in 0..40 {
            let from_a = tokio::spawn(build.fetch_elaborated(location("a"), None));
            let texts = if round % 2 == 0 { &b_to_a } else { &a_to_b };
            for (module, text) in texts {
                build.change_text(&location(module), text.to_string()).await;
            }
            let from_b = tokio::spawn(build.fetch_elaborated(location("b"), None));
            from_a.await.unwrap().unwrap();
            from_b.await.unwrap().unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(30), rounds)
        .await
        .expect("reversed imports deadlocked");

    // Once the edits settle, the result matches a clean build.
    let settled = build.fetch_elaborated(location("b"), None).await.unwrap();
    assert!(settled.value.diagnostics.is_empty(), "{:?}", settled.value.diagnostics);
    let resolved = build.fetch_resolved(location("b"), None).await.unwrap();
    assert_eq!(resolved.value.dependencies, vec![location("prelude")]);
}

// ── Editor queries ──────────────────────────────────────────

#[tokio::test]
async fn hover_shows_the_type() {
    let (_dir, build) = project(&[]);
    build
        .change_text(&location("main"), "(def x int 1) (def y int x)".into())
        .await;

    let hover = build
        .hover(location("main"), Position::new(0, 25))
        .await
        .expect("hover");
    assert_eq!(
        hover.range,
        Some(Range::new(Position::new(0, 25), Position::new(0, 26)))
    );
    let HoverContents::Markup(markup) = hover.contents else {
        panic!("expected markup");
    };
    assert_eq!(markup.value, "```quill\nint\n```");
}

#[tokio::test]
async fn definition_points_at_the_name() {
    let (_dir, build) = project(&[("util", "(def two int 2)")]);
    build
        .change_text(&location("main"), "(import util two)\n(def x int two)".into())
        .await;

    let target = build.definition(location("main"), Position::new(1, 12)).await;
    assert_eq!(
        target,
        Some(SourceLocation {
            module: location("util"),
            span: Span::new(5, 8),
        })
    );
}

#[tokio::test]
async fn inlay_hints_for_parameters() {
    let (_dir, build) = project(&[]);
    build
        .change_text(&location("main"), "(def f (-> (int) int) (fn (x) x))".into())
        .await;

    let hints = build
        .inlay_hints(
            location("main"),
            Range::new(Position::new(0, 0), Position::new(10, 0)),
        )
        .await;
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].position, Position::new(0, 28));
    assert!(
        matches!(&hints[0].label, InlayHintLabel::String(label) if label == ": int"),
        "{:?}",
        hints[0].label
    );
}

#[tokio::test]
async fn queries_do_not_disturb_the_cache() {
    let (_dir, build) = project(&[("main", "(def x int 1) (def y int x)")]);
    let plain = build.fetch_elaborated(location("main"), None).await.unwrap();
    assert!(plain.value.hover.is_none());

    build.hover(location("main"), Position::new(0, 25)).await.expect("hover");
    let again = build.fetch_elaborated(location("main"), None).await.unwrap();
    assert_eq!(again.hash, plain.hash);
    assert_eq!(again.value.module, plain.value.module);
}

#[tokio::test]
async fn closing_during_hover_yields_nothing() {
    let (_dir, build) = project(&[]);
    let main = location("main");
    build
        .change_text(&main, "(def x int 1) (def y int x)".into())
        .await;

    let hover = build.hover(main.clone(), Position::new(0, 25));
    build.close_text(&main).await;
    assert!(!build.is_cached(&main));
    assert!(hover.await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_close_and_hover_does_not_crash() {
    let (_dir, build) = project(&[]);
    let main = location("main");
    for _ in 0..20 {
        build
            .change_text(&main, "(def x int 1) (def y int x)".into())
            .await;
        let hover = tokio::spawn(build.hover(main.clone(), Position::new(0, 25)));
        build.close_text(&main).await;
        hover.await.unwrap();
    }
}

// ── Build report ────────────────────────────────────────────

#[tokio::test]
async fn expected_errors_make_the_build_succeed() {
    let (_dir, build) = project(&[(
        "main",
        "(def bad :error bool 1) (def fine int 1) (def check :test int 2)",
    )]);
    let report = build.check_project().await.unwrap();
    assert!(report.success(), "{:?}", report.failures);
    assert_eq!(
        report.tests,
        vec![DefinitionLocation {
            module: location("main"),
            name: "check".into(),
        }]
    );
}

#[tokio::test]
async fn error_definitions_that_check_fail_the_build() {
    let (_dir, build) = project(&[("main", "(def bad :error bool true)")]);
    let report = build.check_project().await.unwrap();
    assert!(!report.success());
    assert_eq!(
        report.failures,
        vec![Failure::UnexpectedSuccess(location("main").definition("bad"))]
    );
}

#[tokio::test]
async fn plain_errors_fail_the_build() {
    let (_dir, build) = project(&[
        ("main", "(def x int 1)"),
        ("lib/broken", "(def y int \"s\")"),
    ]);
    let report = build.check_project().await.unwrap();
    assert_eq!(
        report.failures,
        vec![Failure::Errors {
            module: location("lib/broken"),
            definition: Some(location("lib/broken").definition("y")),
            count: 1,
        }]
    );
}

use super::*;
use quill_resolve::resolve;
use quill_syntax::{parse, ModuleLocation, Severity};

const BUILTINS: &str = "(def int_add :builtin (-> (int int) int))";

fn resolve_module(name: &str, source: &str, dependencies: &[&resolved::Module]) -> resolved::Module {
    let (module, errors) = parse(source, ModuleLocation::parse(name));
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    let resolved = resolve(&module, dependencies, None);
    assert!(
        resolved.diagnostics.is_empty(),
        "resolve errors: {:?}",
        resolved.diagnostics
    );
    resolved.module
}

fn elaborate_with(source: &str, query: Option<Query>) -> Elaborated {
    let module = resolve_module("main", source, &[]);
    elaborate(&module, &[], query)
}

fn diagnostics(elaborated: &Elaborated) -> Vec<String> {
    elaborated
        .diagnostics
        .values()
        .flatten()
        .map(|d| d.to_string())
        .collect()
}

fn check_ok(source: &str) -> Elaborated {
    let elaborated = elaborate_with(source, None);
    let diagnostics = diagnostics(&elaborated);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
    elaborated
}

fn check_err(source: &str) -> String {
    let elaborated = elaborate_with(source, None);
    let messages: Vec<String> = elaborated
        .diagnostics
        .values()
        .flatten()
        .map(|d| d.message.clone())
        .collect();
    assert!(!messages.is_empty(), "expected diagnostics, got none");
    messages.join("\n")
}

fn def<'a>(elaborated: &'a Elaborated, name: &str) -> &'a Def {
    let location = ModuleLocation::parse("main").definition(name);
    match elaborated.module.definitions.get(&location) {
        Some(Definition::Def(def)) => def,
        other => panic!("no definition {}: {:?}", name, other),
    }
}

// ── Passing programs ─────────────────────────────────────────

#[test]
fn literal_against_scalar() {
    let elaborated = check_ok("(def x int 1)");
    let x = def(&elaborated, "x");
    assert_eq!(*x.ty, Term::I32);
    assert_eq!(*x.body, Term::I32Of(1));
}

#[test]
fn closed_function_with_builtin() {
    check_ok(&format!(
        "{BUILTINS}
         (def add (-> (int int) int) (fn (a b) (int_add a b)))
         (def three int (add 1 2))"
    ));
}

#[test]
fn builtin_definitions_get_builtin_bodies() {
    let elaborated = check_ok(BUILTINS);
    assert_eq!(*def(&elaborated, "int_add").body, Term::Builtin(Builtin::IntAdd));
}

#[test]
fn metas_are_solved_by_unification() {
    let elaborated = check_ok("(def xs (list _) [1 2])");
    assert_eq!(def(&elaborated, "xs").ty.to_string(), "(list int)");
}

#[test]
fn inline_definitions_unfold_in_types() {
    check_ok(
        "(def t :inline (type int_tag) int)
         (def x t 1)",
    );
}

#[test]
fn dependent_function() {
    check_ok(
        "(def id (-> ((t : (type int_tag)) (x : t)) t) (fn (t x) x))
         (def five int (id int 5))",
    );
}

#[test]
fn implicit_quotation() {
    let elaborated = check_ok("(def c (code int) 1)");
    assert_eq!(
        *def(&elaborated, "c").body,
        Term::CodeOf(Arc::new(Term::I32Of(1)))
    );
}

#[test]
fn splice_of_code() {
    check_ok(
        "(def c (code int) `1)
         (def d int ,c)",
    );
}

#[test]
fn struct_projection() {
    check_ok(
        "(def p (struct :a int :b string) {:a 1 :b \"s\"})
         (def q string (.b p))",
    );
}

#[test]
fn match_branches_share_a_type() {
    check_ok("(def f (-> (bool) int) (fn (b) (match b (true 1) (false 0))))");
}

#[test]
fn destructuring_let() {
    check_ok("(def x int (let (([a b] [1 2])) b))");
}

#[test]
fn stored_definitions_are_normalized() {
    let elaborated = check_ok(&format!(
        "{BUILTINS}
         (def t :inline (type int_tag) int)
         (def three t (int_add 1 2))
         (def pick int (let (([a b] [4 5])) b))"
    ));
    let three = def(&elaborated, "three");
    assert_eq!(*three.ty, Term::I32);
    assert_eq!(*three.body, Term::I32Of(3));
    assert_eq!(*def(&elaborated, "pick").body, Term::I32Of(5));
}

#[test]
fn recursive_bodies_are_kept_as_written() {
    let elaborated = check_ok("(def spin :rec (-> (int) int) (fn (n) (spin n)))");
    assert_eq!(def(&elaborated, "spin").body.to_string(), "(fn (n) (spin n))");
}

#[test]
fn recursive_reference_with_rec() {
    check_ok("(def spin :rec (-> (int) int) (fn (n) (spin n)))");
}

// ── Diagnostics ──────────────────────────────────────────────

#[test]
fn type_mismatch() {
    let elaborated = elaborate_with("(def x int \"hi\")", None);
    insta::assert_snapshot!(diagnostics(&elaborated).join("\n"), @r#"11:15: type mismatch: expected int, found string"#);
}

#[test]
fn mismatch_through_dependent_result() {
    let errors = check_err(
        "(def id (-> ((t : (type int_tag)) (x : t)) t) (fn (t x) x))
         (def bad string (id int 5))",
    );
    insta::assert_snapshot!(errors, @"type mismatch: expected string, found int");
}

#[test]
fn unsolved_meta() {
    let elaborated = elaborate_with("(def x int _)", None);
    insta::assert_snapshot!(diagnostics(&elaborated).join("\n"), @"11:12: unsolved meta ?1");
    let location = ModuleLocation::parse("main").definition("x");
    assert_eq!(elaborated.diagnostics.keys().collect::<Vec<_>>(), vec![&Some(location)]);
}

#[test]
fn self_typed_list_is_a_cyclic_solution() {
    let elaborated = elaborate_with("(def x :rec (list _) [x])", None);
    let x = def(&elaborated, "x");
    assert_eq!(*x.ty, Term::Vec(Arc::new(Term::Hole)));
    let messages = diagnostics(&elaborated);
    assert_eq!(messages.len(), 1, "{:?}", messages);
    assert!(
        messages[0].starts_with("18:19: cyclic solution for meta ?"),
        "{:?}",
        messages
    );
}

#[test]
fn unknown_builtin() {
    let errors = check_err("(def launch :builtin int)");
    insta::assert_snapshot!(errors, @"unknown builtin `launch`");
}

#[test]
fn self_reference_needs_rec() {
    let errors = check_err("(def spin int spin)");
    insta::assert_snapshot!(errors, @"`spin` refers to itself without `:rec`");
}

#[test]
fn open_application_of_closed_function() {
    let errors = check_err(
        "(def f (-> (int) int) (fn (x) x))
         (def y int (! f 1))",
    );
    insta::assert_snapshot!(errors, @"expected an open function, found a closed one");
}

#[test]
fn wrong_argument_count() {
    let errors = check_err(&format!("{BUILTINS} (def y int (int_add 1))"));
    insta::assert_snapshot!(errors, @"expected 2 arguments, found 1");
}

#[test]
fn missing_field() {
    let errors = check_err(
        "(def p (struct :a int) {:a 1})
         (def q int (.c p))",
    );
    insta::assert_snapshot!(errors, @"cannot project `.c` from `(struct :a int)`");
}

#[test]
fn annotated_definitions_warn() {
    let elaborated = elaborate_with(
        "(def old @deprecated int 1)
         (def new int old)",
        None,
    );
    let location = ModuleLocation::parse("main").definition("new");
    let warnings = &elaborated.diagnostics[&Some(location)];
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    insta::assert_snapshot!(warnings[0].message, @"`old` is deprecated");
}

// ── Queries ──────────────────────────────────────────────────

#[test]
fn hover_on_reference() {
    //                     0         1         2
    //                     0123456789012345678901234567
    let source = "(def x int 1) (def y int x)";
    let elaborated = elaborate_with(source, Some(Query::Hover(25)));
    assert_eq!(
        elaborated.hover,
        Some(Hover {
            span: Span::new(25, 26),
            ty: Term::I32,
            doc: None,
        })
    );
}

#[test]
fn hover_on_definition_name_shows_doc() {
    let source = "(def x \"the answer\" int 42)";
    let elaborated = elaborate_with(source, Some(Query::Hover(5)));
    let hover = elaborated.hover.expect("hover");
    assert_eq!(hover.span, Span::new(5, 6));
    assert_eq!(hover.ty, Term::I32);
    assert_eq!(hover.doc.as_deref(), Some("the answer"));
}

#[test]
fn hover_outside_any_term() {
    let elaborated = elaborate_with("(def x int 1)", Some(Query::Hover(100)));
    assert_eq!(elaborated.hover, None);
}

#[test]
fn inlay_hints_for_unannotated_binders() {
    let source = "(def f (-> (int) int) (fn (x) x))";
    let elaborated = elaborate_with(source, Some(Query::InlayHints(Span::new(0, 100))));
    assert_eq!(
        elaborated.inlay_hints,
        vec![InlayHint {
            offset: 28,
            label: ": int".into(),
        }]
    );
}

#[test]
fn annotated_let_binders_have_no_hint() {
    let source = "(def y int (let (((a : int) 1) (b \"s\")) a))";
    let elaborated = elaborate_with(source, Some(Query::InlayHints(Span::new(0, 100))));
    let labels: Vec<&str> = elaborated
        .inlay_hints
        .iter()
        .map(|hint| hint.label.as_str())
        .collect();
    assert_eq!(labels, vec![": string"]);
}

// ── Dependencies ─────────────────────────────────────────────

#[test]
fn dependency_definitions_are_visible() {
    let lib = resolve_module("lib", "(def seven :inline int 7) (def broken int _)", &[]);
    let lib_core = elaborate(&lib, &[], None);
    assert_eq!(diagnostics(&lib_core).len(), 1);

    let main = resolve_module(
        "main",
        "(import lib seven broken) (def x int seven) (def y int broken)",
        &[&lib],
    );
    let elaborated = elaborate(&main, &[&lib_core.module], None);
    assert!(diagnostics(&elaborated).is_empty());
}

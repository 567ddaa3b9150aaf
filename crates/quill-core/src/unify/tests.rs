use std::sync::Arc;

use super::*;
use crate::term::Term;
use quill_syntax::{ModuleLocation, Repr, Span};

fn eval(ctx: &Ctx, term: &Term) -> Value {
    ctx.eval(&Env::new(), term)
}

fn var(name: &str, index: usize) -> Arc<Term> {
    Arc::new(Term::Var {
        name: name.into(),
        index,
    })
}

/// `(-> ((t : (type int_tag)) t) t)` with the binder named `name`.
fn dependent(name: &str, open: bool) -> Term {
    Term::Func {
        open,
        params: vec![
            (
                Pattern::Var(name.into()),
                Arc::new(Term::Type(Arc::new(Term::TagOf(Repr::Int)))),
            ),
            (Pattern::Drop, var(name, 0)),
        ],
        result: var(name, 0),
    }
}

#[test]
fn reflexive() {
    let ctx = Ctx::new();
    let terms = [
        Term::I32,
        Term::Vec(Arc::new(Term::Str)),
        Term::F64Of(1.5),
        dependent("t", false),
    ];
    for term in &terms {
        let value = eval(&ctx, term);
        assert!(ctx.unify(0, &value, &value), "{} should unify with itself", term);
    }
}

#[test]
fn different_constructors_do_not_unify() {
    let ctx = Ctx::new();
    assert!(!ctx.unify(0, &Value::I32, &Value::Str));
    assert!(!ctx.unify(0, &Value::I32Of(1), &Value::I32Of(2)));
    assert!(!ctx.unify(0, &Value::Vec(Lazy::new(Value::I32)), &Value::I32Array));
}

#[test]
fn holes_unify_with_everything() {
    let ctx = Ctx::new();
    assert!(ctx.unify(0, &Value::Hole, &Value::I32));
    assert!(ctx.unify(0, &Value::StrOf("x".into()), &Value::Hole));
}

#[test]
fn metas_are_solved() {
    let ctx = Ctx::new();
    let meta = ctx.fresh_type_value(Span::new(0, 1));
    let Value::Meta { id, .. } = meta else {
        panic!("expected a meta");
    };
    assert!(ctx.unify(0, &Value::Vec(Lazy::new(meta.clone())), &Value::Vec(Lazy::new(Value::I64))));
    assert!(matches!(ctx.solution(id), Some(Value::I64)));
    // Solved metas are forced before comparison.
    assert!(!ctx.unify(0, &meta, &Value::I32));
}

#[test]
fn self_referential_solutions_still_unify() {
    let ctx = Ctx::new();
    let meta = ctx.fresh_type_value(Span::new(0, 1));
    let Value::Meta { id, .. } = meta else {
        panic!("expected a meta");
    };
    let cyclic = Value::Vec(Lazy::new(meta.clone()));
    assert!(ctx.unify(0, &meta, &cyclic));
    assert!(ctx.metas().is_cyclic(id));
    assert!(matches!(ctx.solution(id), Some(Value::Hole)));
    // The hole absorbs later comparisons instead of looping.
    assert!(ctx.unify(0, &meta, &cyclic));
}

#[test]
fn floats_compare_by_bits() {
    let ctx = Ctx::new();
    assert!(!ctx.unify(0, &Value::F64Of(0.0), &Value::F64Of(-0.0)));
    assert!(ctx.unify(0, &Value::F32Of(f32::NAN), &Value::F32Of(f32::NAN)));
}

#[test]
fn definitions_are_nominal() {
    let ctx = Ctx::new();
    let module = ModuleLocation::parse("main");
    let a = Value::Def(module.definition("a"));
    let b = Value::Def(module.definition("b"));
    assert!(ctx.unify(0, &a, &a.clone()));
    assert!(!ctx.unify(0, &a, &b));
}

#[test]
fn struct_keys_must_match() {
    let ctx = Ctx::new();
    let fields = |names: &[&str]| {
        Value::Struct(
            names
                .iter()
                .map(|name| (SmolStr::from(*name), Lazy::new(Value::I32)))
                .collect(),
        )
    };
    assert!(ctx.unify(0, &fields(&["a", "b"]), &fields(&["b", "a"])));
    assert!(!ctx.unify(0, &fields(&["a", "b"]), &fields(&["a", "c"])));
    assert!(!ctx.unify(0, &fields(&["a"]), &fields(&["a", "b"])));
}

#[test]
fn telescopes_are_alpha_equivalent() {
    let ctx = Ctx::new();
    let a = eval(&ctx, &dependent("t", false));
    let b = eval(&ctx, &dependent("u", false));
    assert!(ctx.unify(0, &a, &b));
}

#[test]
fn open_flag_must_agree() {
    let ctx = Ctx::new();
    let closed = eval(&ctx, &dependent("t", false));
    let open = eval(&ctx, &dependent("t", true));
    assert!(!ctx.unify(0, &closed, &open));
}

#[test]
fn telescope_results_are_compared() {
    let ctx = Ctx::new();
    let dependent = eval(&ctx, &dependent("t", false));
    let constant = eval(
        &ctx,
        &Term::Func {
            open: false,
            params: vec![
                (
                    Pattern::Var("t".into()),
                    Arc::new(Term::Type(Arc::new(Term::TagOf(Repr::Int)))),
                ),
                (Pattern::Drop, var("t", 0)),
            ],
            result: Arc::new(Term::I32),
        },
    );
    assert!(!ctx.unify(0, &dependent, &constant));
}

#[test]
fn closures_are_compared_by_body() {
    let ctx = Ctx::new();
    let identity = |name: &str| Term::FuncOf {
        open: false,
        params: vec![Pattern::Var(name.into())],
        result: var(name, 0),
    };
    let constant = Term::FuncOf {
        open: false,
        params: vec![Pattern::Var("x".into())],
        result: Arc::new(Term::I32Of(0)),
    };
    assert!(ctx.unify(0, &eval(&ctx, &identity("x")), &eval(&ctx, &identity("y"))));
    assert!(!ctx.unify(0, &eval(&ctx, &identity("x")), &eval(&ctx, &constant)));
}

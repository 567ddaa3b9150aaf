use super::*;
use crate::value::{Lazy, Value};

fn meta(ctx: &Ctx, start: u32) -> (MetaId, Term) {
    let span = Span::new(start, start + 1);
    match ctx.fresh_value(span, Value::Hole) {
        Value::Meta { id, span, .. } => (id, Term::Meta { id, span }),
        other => panic!("expected a meta, got {:?}", other),
    }
}

fn messages(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics.iter().map(|d| d.to_string()).collect()
}

#[test]
fn solved_metas_are_substituted() {
    let ctx = Ctx::new();
    let (id, term) = meta(&ctx, 0);
    ctx.solve(id, Value::I32Of(3));

    let (zonked, diagnostics) = ctx.check_solved(&[&Term::VecOf(vec![Arc::new(term)])]);
    assert!(diagnostics.is_empty());
    assert_eq!(zonked, vec![Term::VecOf(vec![Arc::new(Term::I32Of(3))])]);
}

#[test]
fn solutions_are_zonked_recursively() {
    let ctx = Ctx::new();
    let (outer, outer_term) = meta(&ctx, 0);
    let (inner, inner_term) = meta(&ctx, 1);
    ctx.solve(outer, Value::Vec(Lazy::new(ctx.eval(&Default::default(), &inner_term))));
    ctx.solve(inner, Value::Str);

    let (zonked, diagnostics) = ctx.check_solved(&[&outer_term]);
    assert!(diagnostics.is_empty());
    assert_eq!(zonked, vec![Term::Vec(Arc::new(Term::Str))]);
}

#[test]
fn every_unsolved_occurrence_is_reported() {
    let ctx = Ctx::new();
    let (_, a) = meta(&ctx, 4);
    let (_, b) = meta(&ctx, 9);
    let term = Term::VecOf(vec![Arc::new(a.clone()), Arc::new(b), Arc::new(a)]);

    let (zonked, diagnostics) = ctx.check_solved(&[&term]);
    assert_eq!(zonked, vec![term]);
    insta::assert_snapshot!(messages(&diagnostics).join("\n"), @r"
    4:5: unsolved meta ?0
    9:10: unsolved meta ?1
    4:5: unsolved meta ?0
    ");
}

#[test]
fn cyclic_solutions_become_holes() {
    let ctx = Ctx::new();
    let (id, term) = meta(&ctx, 0);
    let value = ctx.eval(&Default::default(), &term);
    ctx.solve(id, Value::Vec(Lazy::new(value)));

    assert!(ctx.metas().is_cyclic(id));
    let (zonked, diagnostics) = ctx.check_solved(&[&term]);
    assert_eq!(zonked, vec![Term::Hole]);
    insta::assert_snapshot!(messages(&diagnostics).join("\n"), @"0:1: cyclic solution for meta ?0");
}

#[test]
fn cycles_through_pending_thunks_are_caught() {
    let ctx = Ctx::new();
    let (id, term) = meta(&ctx, 0);
    let wrapped = ctx.eval(&Default::default(), &Term::Vec(Arc::new(term.clone())));
    assert!(ctx.unify(0, &ctx.eval(&Default::default(), &term), &wrapped));

    let (zonked, diagnostics) = ctx.check_solved(&[&Term::Vec(Arc::new(term))]);
    assert!(ctx.metas().is_cyclic(id));
    assert_eq!(zonked, vec![Term::Vec(Arc::new(Term::Hole))]);
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn cycles_across_two_metas_are_caught() {
    let ctx = Ctx::new();
    let (a, a_term) = meta(&ctx, 0);
    let (b, b_term) = meta(&ctx, 2);
    let env = Default::default();
    ctx.solve(a, ctx.eval(&env, &Term::Vec(Arc::new(b_term.clone()))));
    ctx.solve(b, ctx.eval(&env, &Term::Vec(Arc::new(a_term.clone()))));

    assert!(!ctx.metas().is_cyclic(a));
    assert!(ctx.metas().is_cyclic(b));
    let (zonked, diagnostics) = ctx.check_solved(&[&a_term]);
    assert_eq!(zonked, vec![Term::Vec(Arc::new(Term::Hole))]);
    insta::assert_snapshot!(messages(&diagnostics).join("\n"), @"2:3: cyclic solution for meta ?1");
}

#[test]
fn solutions_are_quoted_under_binders() {
    let ctx = Ctx::new();
    let (id, term) = meta(&ctx, 0);
    ctx.solve(id, Value::var("x".into(), 0, Value::I32));

    let lambda = Term::FuncOf {
        open: false,
        params: vec![Pattern::Var("x".into()), Pattern::Var("y".into())],
        result: Arc::new(term),
    };
    let (zonked, diagnostics) = ctx.check_solved(&[&lambda]);
    assert!(diagnostics.is_empty());
    assert_eq!(
        zonked,
        vec![Term::FuncOf {
            open: false,
            params: vec![Pattern::Var("x".into()), Pattern::Var("y".into())],
            result: Arc::new(Term::Var {
                name: "x".into(),
                index: 1,
            }),
        }]
    );
}

#[test]
fn zonk_leaves_unsolved_metas_silently() {
    let ctx = Ctx::new();
    let (_, term) = meta(&ctx, 0);
    assert_eq!(ctx.zonk(0, &term), term);
}

#[test]
fn erasing_replaces_every_meta() {
    let ctx = Ctx::new();
    let (id, solved) = meta(&ctx, 0);
    let (_, unsolved) = meta(&ctx, 1);
    ctx.solve(id, Value::I32);
    let term = Term::Union(vec![Arc::new(solved), Arc::new(unsolved)]);
    assert_eq!(
        erase_metas(&term),
        Term::Union(vec![Arc::new(Term::Hole), Arc::new(Term::Hole)])
    );
}

use std::sync::Arc;

use quill_syntax::{Diagnostic, Span};

use crate::ctx::Ctx;
use crate::meta::{meta_number, MetaId};
use crate::term::{Pattern, Term};
use crate::value::Value;

/// Decides what replaces each `Meta` node during a traversal. `level` is
/// the number of binders between the root and the node.
trait Substitute {
    fn meta(&mut self, level: usize, id: MetaId, span: Span) -> Term;
}

fn walk<S: Substitute>(subst: &mut S, level: usize, term: &Term) -> Term {
    match term {
        Term::Type(tag) => Term::Type(Arc::new(walk(subst, level, tag))),
        Term::I8ArrayOf(elements) => Term::I8ArrayOf(walk_all(subst, level, elements)),
        Term::I32ArrayOf(elements) => Term::I32ArrayOf(walk_all(subst, level, elements)),
        Term::I64ArrayOf(elements) => Term::I64ArrayOf(walk_all(subst, level, elements)),
        Term::Vec(element) => Term::Vec(Arc::new(walk(subst, level, element))),
        Term::VecOf(elements) => Term::VecOf(walk_all(subst, level, elements)),
        Term::Struct(fields) => Term::Struct(
            fields
                .iter()
                .map(|(name, ty)| (name.clone(), Arc::new(walk(subst, level, ty))))
                .collect(),
        ),
        Term::StructOf(fields) => Term::StructOf(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), Arc::new(walk(subst, level, value))))
                .collect(),
        ),
        Term::Point(element) => Term::Point(Arc::new(walk(subst, level, element))),
        Term::Union(elements) => Term::Union(walk_all(subst, level, elements)),
        Term::Func {
            open,
            params,
            result,
        } => {
            let mut inner = level;
            let mut walked = Vec::with_capacity(params.len());
            for (pattern, ty) in params {
                walked.push((pattern.clone(), Arc::new(walk(subst, inner, ty))));
                inner += pattern.binder_count();
            }
            Term::Func {
                open: *open,
                params: walked,
                result: Arc::new(walk(subst, inner, result)),
            }
        }
        Term::FuncOf {
            open,
            params,
            result,
        } => {
            let inner = level + params.iter().map(Pattern::binder_count).sum::<usize>();
            Term::FuncOf {
                open: *open,
                params: params.clone(),
                result: Arc::new(walk(subst, inner, result)),
            }
        }
        Term::Apply { open, func, args } => Term::Apply {
            open: *open,
            func: Arc::new(walk(subst, level, func)),
            args: walk_all(subst, level, args),
        },
        Term::Code(element) => Term::Code(Arc::new(walk(subst, level, element))),
        Term::CodeOf(element) => Term::CodeOf(Arc::new(walk(subst, level, element))),
        Term::Splice(element) => Term::Splice(Arc::new(walk(subst, level, element))),
        Term::Path(element) => Term::Path(Arc::new(walk(subst, level, element))),
        Term::PathOf(element) => Term::PathOf(Arc::new(walk(subst, level, element))),
        Term::Get(element) => Term::Get(Arc::new(walk(subst, level, element))),
        Term::Let { binder, init, body } => Term::Let {
            binder: binder.clone(),
            init: Arc::new(walk(subst, level, init)),
            body: Arc::new(walk(subst, level + binder.binder_count(), body)),
        },
        Term::If {
            scrutinee,
            branches,
        } => Term::If {
            scrutinee: Arc::new(walk(subst, level, scrutinee)),
            branches: branches
                .iter()
                .map(|(pattern, body)| {
                    let inner = level + pattern.binder_count();
                    (pattern.clone(), Arc::new(walk(subst, inner, body)))
                })
                .collect(),
        },
        Term::Proj { target, projection } => Term::Proj {
            target: Arc::new(walk(subst, level, target)),
            projection: projection.clone(),
        },
        Term::Meta { id, span } => subst.meta(level, *id, *span),
        Term::Tag
        | Term::TagOf(_)
        | Term::Unit
        | Term::UnitOf
        | Term::Bool
        | Term::BoolOf(_)
        | Term::I8
        | Term::I8Of(_)
        | Term::I16
        | Term::I16Of(_)
        | Term::I32
        | Term::I32Of(_)
        | Term::I64
        | Term::I64Of(_)
        | Term::F32
        | Term::F32Of(_)
        | Term::F64
        | Term::F64Of(_)
        | Term::Str
        | Term::StrOf(_)
        | Term::I8Array
        | Term::I32Array
        | Term::I64Array
        | Term::Command(_)
        | Term::Var { .. }
        | Term::Def(_)
        | Term::Builtin(_)
        | Term::Hole => term.clone(),
    }
}

fn walk_all<S: Substitute>(subst: &mut S, level: usize, terms: &[Arc<Term>]) -> Vec<Arc<Term>> {
    terms
        .iter()
        .map(|term| Arc::new(walk(subst, level, term)))
        .collect()
}

struct Zonker<'a> {
    ctx: &'a Ctx,
    /// `None` when rendering for display, where unsolved metas are expected.
    diagnostics: Option<Vec<Diagnostic>>,
}

impl Zonker<'_> {
    fn report(&mut self, message: String, span: Span) {
        if let Some(diagnostics) = &mut self.diagnostics {
            diagnostics.push(Diagnostic::error(message, span));
        }
    }
}

impl Substitute for Zonker<'_> {
    fn meta(&mut self, level: usize, id: MetaId, span: Span) -> Term {
        if self.ctx.metas().is_cyclic(id) {
            self.report(format!("cyclic solution for meta ?{}", meta_number(id)), span);
            return Term::Hole;
        }
        match self.ctx.solution(id) {
            Some(solution) => {
                let quoted = self.ctx.quote(level, &solution);
                walk(self, level, &quoted)
            }
            None => {
                self.report(format!("unsolved meta ?{}", meta_number(id)), span);
                Term::Meta { id, span }
            }
        }
    }
}

/// Looks for `target` in a term and in the solutions of the metas it
/// mentions.
struct Occurs<'a> {
    ctx: &'a Ctx,
    target: MetaId,
    visited: Vec<MetaId>,
    found: bool,
}

impl Substitute for Occurs<'_> {
    fn meta(&mut self, level: usize, id: MetaId, span: Span) -> Term {
        if id == self.target {
            self.found = true;
        } else if !self.found && !self.visited.contains(&id) {
            self.visited.push(id);
            if let Some(solution) = self.ctx.solution(id) {
                let quoted = self.ctx.quote(level, &solution);
                walk(self, level, &quoted);
            }
        }
        Term::Meta { id, span }
    }
}

struct Eraser;

impl Substitute for Eraser {
    fn meta(&mut self, _level: usize, _id: MetaId, _span: Span) -> Term {
        Term::Hole
    }
}

/// Replace every meta with a hole, for terms coming from another run.
pub fn erase_metas(term: &Term) -> Term {
    walk(&mut Eraser, 0, term)
}

impl Ctx {
    /// Substitute solved metas into closed terms, reporting each remaining
    /// unsolved meta occurrence once.
    pub fn check_solved(&self, terms: &[&Term]) -> (Vec<Term>, Vec<Diagnostic>) {
        let mut zonker = Zonker {
            ctx: self,
            diagnostics: Some(Vec::new()),
        };
        let zonked = terms.iter().map(|term| walk(&mut zonker, 0, term)).collect();
        (zonked, zonker.diagnostics.unwrap_or_default())
    }

    /// Substitute solved metas into a term under `level` binders, leaving
    /// unsolved ones in place silently.
    pub fn zonk(&self, level: usize, term: &Term) -> Term {
        let mut zonker = Zonker {
            ctx: self,
            diagnostics: None,
        };
        walk(&mut zonker, level, term)
    }

    /// Whether `id` appears in `value`, looking through solved metas.
    pub(crate) fn occurs(&self, id: MetaId, value: &Value) -> bool {
        let mut occurs = Occurs {
            ctx: self,
            target: id,
            visited: Vec::new(),
            found: false,
        };
        walk(&mut occurs, 0, &self.quote(0, value));
        occurs.found
    }
}

#[cfg(test)]
mod tests;

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use quill_syntax::{Annotation, DefinitionLocation, Span};

use crate::meta::{MetaId, Metas};
use crate::term::{Definition, Module, Term};
use crate::value::{Env, Lazy, Value};
use crate::zonk::erase_metas;

/// What the evaluator and elaborator know about a global definition.
#[derive(Debug, Clone)]
pub struct Global {
    pub ty: Arc<Term>,
    /// Present once the body has been elaborated and only for definitions
    /// that unfold.
    pub body: Option<Arc<Term>>,
    pub annotations: Vec<Annotation>,
    pub doc: String,
}

/// State shared by one elaboration run: the metavariable table and the
/// global definitions in scope.
#[derive(Default)]
pub struct Ctx {
    metas: RefCell<Metas>,
    globals: RefCell<HashMap<DefinitionLocation, Global>>,
    unfolding: RefCell<Vec<DefinitionLocation>>,
}

impl Ctx {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Globals ───────────────────────────────────────────────────

    pub fn define(&self, location: DefinitionLocation, global: Global) {
        self.globals.borrow_mut().insert(location, global);
    }

    pub fn global(&self, location: &DefinitionLocation) -> Option<Global> {
        self.globals.borrow().get(location).cloned()
    }

    /// Make the definitions of an already elaborated module visible. Any
    /// metas it still contains belong to another run and become holes.
    pub fn load_module(&self, module: &Module) {
        for definition in module.definitions.values() {
            let Definition::Def(def) = definition else {
                continue;
            };
            self.define(
                def.name.clone(),
                Global {
                    ty: Arc::new(erase_metas(&def.ty)),
                    body: def.unfolds().then(|| Arc::new(erase_metas(&def.body))),
                    annotations: def.annotations.clone(),
                    doc: def.doc.clone(),
                },
            );
        }
    }

    /// Evaluate the body of an unfolding definition. A definition whose
    /// unfolding is already in progress stays neutral.
    pub(crate) fn unfold(&self, location: &DefinitionLocation) -> Option<Value> {
        if self.unfolding.borrow().contains(location) {
            return None;
        }
        let body = self
            .globals
            .borrow()
            .get(location)
            .and_then(|global| global.body.clone())?;
        self.unfolding.borrow_mut().push(location.clone());
        let value = self.eval(&Env::new(), &body);
        self.unfolding.borrow_mut().pop();
        Some(value)
    }

    // ── Metavariables ─────────────────────────────────────────────

    pub fn metas(&self) -> Ref<'_, Metas> {
        self.metas.borrow()
    }

    /// A fresh unknown value of type `ty`.
    pub fn fresh_value(&self, span: Span, ty: Value) -> Value {
        let id = self.metas.borrow_mut().alloc(span, ty.clone());
        Value::Meta {
            id,
            span,
            ty: Lazy::new(ty),
        }
    }

    /// The universe of types with an unknown representation tag.
    pub fn fresh_type(&self, span: Span) -> Value {
        let tag = self.fresh_value(span, Value::Tag);
        Value::Type(Lazy::new(tag))
    }

    /// A fresh unknown type.
    pub fn fresh_type_value(&self, span: Span) -> Value {
        let universe = self.fresh_type(span);
        self.fresh_value(span, universe)
    }

    pub fn solution(&self, id: MetaId) -> Option<Value> {
        self.metas.borrow().solution(id)
    }

    /// Record `value` as the solution of `id`. A value that mentions `id`
    /// itself is not stored; the meta is marked cyclic and zonking reports
    /// it.
    pub fn solve(&self, id: MetaId, value: Value) {
        if self.occurs(id, &value) {
            tracing::debug!(meta = crate::meta::meta_number(id), "cyclic solution");
            self.metas.borrow_mut().solve_cyclic(id);
            return;
        }
        tracing::trace!(meta = crate::meta::meta_number(id), "solved");
        self.metas.borrow_mut().solve(id, value);
    }

    /// Chase solved metas at the head of `value`.
    pub fn force(&self, value: Value) -> Value {
        let mut value = value;
        while let Value::Meta { id, .. } = &value {
            match self.solution(*id) {
                Some(solution) => value = solution,
                None => break,
            }
        }
        value
    }
}

use std::rc::Rc;
use std::sync::Arc;

use quill_syntax::Projection;

use crate::ctx::Ctx;
use crate::term::{Pattern, Term};
use crate::value::{Closure, Env, Lazy, Telescope, Value};

/// Extend `env` with the binders of `pattern`, destructuring `value` lazily.
pub fn bind(pattern: &Pattern, value: Lazy, env: &mut Env) {
    match pattern {
        Pattern::Var(_) => env.push(value),
        Pattern::I8ArrayOf(elements)
        | Pattern::I32ArrayOf(elements)
        | Pattern::I64ArrayOf(elements)
        | Pattern::VecOf(elements) => {
            for (index, element) in elements.iter().enumerate() {
                if element.binder_count() > 0 {
                    bind(element, Lazy::project(value.clone(), Projection::Index(index)), env);
                }
            }
        }
        Pattern::StructOf(fields) => {
            for (name, field) in fields {
                if field.binder_count() > 0 {
                    bind(field, Lazy::project(value.clone(), Projection::Field(name.clone())), env);
                }
            }
        }
        _ => {}
    }
}

impl Ctx {
    fn delay(&self, env: &Env, term: &Arc<Term>) -> Lazy {
        Lazy::eval(env.clone(), term.clone())
    }

    fn delay_all(&self, env: &Env, terms: &[Arc<Term>]) -> Vec<Lazy> {
        terms.iter().map(|term| self.delay(env, term)).collect()
    }

    pub fn eval(&self, env: &Env, term: &Term) -> Value {
        match term {
            Term::Tag => Value::Tag,
            Term::TagOf(repr) => Value::TagOf(*repr),
            Term::Type(tag) => Value::Type(self.delay(env, tag)),
            Term::Unit => Value::Unit,
            Term::UnitOf => Value::UnitOf,
            Term::Bool => Value::Bool,
            Term::BoolOf(b) => Value::BoolOf(*b),
            Term::I8 => Value::I8,
            Term::I8Of(n) => Value::I8Of(*n),
            Term::I16 => Value::I16,
            Term::I16Of(n) => Value::I16Of(*n),
            Term::I32 => Value::I32,
            Term::I32Of(n) => Value::I32Of(*n),
            Term::I64 => Value::I64,
            Term::I64Of(n) => Value::I64Of(*n),
            Term::F32 => Value::F32,
            Term::F32Of(n) => Value::F32Of(*n),
            Term::F64 => Value::F64,
            Term::F64Of(n) => Value::F64Of(*n),
            Term::Str => Value::Str,
            Term::StrOf(s) => Value::StrOf(s.clone()),
            Term::I8Array => Value::I8Array,
            Term::I8ArrayOf(elements) => Value::I8ArrayOf(self.delay_all(env, elements)),
            Term::I32Array => Value::I32Array,
            Term::I32ArrayOf(elements) => Value::I32ArrayOf(self.delay_all(env, elements)),
            Term::I64Array => Value::I64Array,
            Term::I64ArrayOf(elements) => Value::I64ArrayOf(self.delay_all(env, elements)),
            Term::Vec(element) => Value::Vec(self.delay(env, element)),
            Term::VecOf(elements) => Value::VecOf(self.delay_all(env, elements)),
            Term::Struct(fields) => Value::Struct(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.delay(env, ty)))
                    .collect(),
            ),
            Term::StructOf(fields) => Value::StructOf(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), self.delay(env, value)))
                    .collect(),
            ),
            Term::Point(element) => Value::Point(self.delay(env, element)),
            Term::Union(elements) => Value::Union(self.delay_all(env, elements)),
            Term::Func {
                open,
                params,
                result,
            } => Value::Func {
                open: *open,
                telescope: Rc::new(Telescope {
                    env: env.clone(),
                    params: params.clone(),
                    result: result.clone(),
                }),
            },
            Term::FuncOf {
                open,
                params,
                result,
            } => Value::FuncOf {
                open: *open,
                closure: Rc::new(Closure {
                    env: env.clone(),
                    binders: params.clone(),
                    body: result.clone(),
                }),
            },
            Term::Apply { open, func, args } => {
                let func = self.eval(env, func);
                self.apply(*open, func, self.delay_all(env, args))
            }
            Term::Code(element) => Value::Code(self.delay(env, element)),
            Term::CodeOf(element) => Value::CodeOf(self.delay(env, element)),
            Term::Splice(element) => match self.force(self.eval(env, element)) {
                Value::CodeOf(inner) => inner.force(self),
                other => Value::Splice(Lazy::new(other)),
            },
            Term::Path(element) => Value::Path(self.delay(env, element)),
            Term::PathOf(element) => Value::PathOf(self.delay(env, element)),
            Term::Get(element) => match self.force(self.eval(env, element)) {
                Value::PathOf(inner) => inner.force(self),
                other => Value::Get(Lazy::new(other)),
            },
            Term::Command(command) => Value::Command(command.clone()),
            Term::Let { binder, init, body } => {
                let mut env = env.clone();
                bind(binder, self.delay(&env, init), &mut env);
                self.eval(&env, body)
            }
            Term::If {
                scrutinee,
                branches,
            } => {
                let scrutinee = self.delay(env, scrutinee);
                for (index, (pattern, body)) in branches.iter().enumerate() {
                    match self.matches(pattern, &scrutinee) {
                        Some(true) => {
                            let mut env = env.clone();
                            bind(pattern, scrutinee, &mut env);
                            return self.eval(&env, body);
                        }
                        Some(false) => continue,
                        None => {
                            let branches = branches[index..]
                                .iter()
                                .map(|(pattern, body)| Closure {
                                    env: env.clone(),
                                    binders: vec![pattern.clone()],
                                    body: body.clone(),
                                })
                                .collect();
                            return Value::If {
                                scrutinee,
                                branches,
                            };
                        }
                    }
                }
                Value::Hole
            }
            Term::Proj { target, projection } => {
                let target = self.eval(env, target);
                self.project(target, projection)
            }
            Term::Var { index, .. } => match env.get(*index) {
                Some(value) => value.force(self),
                None => Value::Hole,
            },
            Term::Def(location) => self
                .unfold(location)
                .unwrap_or_else(|| Value::Def(location.clone())),
            Term::Meta { id, span } => match self.solution(*id) {
                Some(solution) => solution,
                None => {
                    let ty = self.metas().get(*id).map(|entry| entry.ty.clone());
                    Value::Meta {
                        id: *id,
                        span: *span,
                        ty: ty.unwrap_or_else(|| Lazy::new(Value::Hole)),
                    }
                }
            },
            Term::Builtin(builtin) => Value::Builtin(*builtin),
            Term::Hole => Value::Hole,
        }
    }

    /// Apply a function value to arguments, reducing when it is a literal
    /// function or a builtin applied to literals.
    pub fn apply(&self, open: bool, func: Value, args: Vec<Lazy>) -> Value {
        match self.force(func) {
            Value::FuncOf { closure, .. } if closure.binders.len() == args.len() => {
                self.instantiate(&closure, args)
            }
            Value::Builtin(builtin) => {
                let forced: Vec<Value> = args.iter().map(|arg| self.force(arg.force(self))).collect();
                match builtin.fold(&forced) {
                    Some(value) => value,
                    None => Value::Apply {
                        open,
                        func: Lazy::new(Value::Builtin(builtin)),
                        args,
                    },
                }
            }
            other => Value::Apply {
                open,
                func: Lazy::new(other),
                args,
            },
        }
    }

    pub fn instantiate(&self, closure: &Closure, args: Vec<Lazy>) -> Value {
        let mut env = closure.env.clone();
        for (pattern, arg) in closure.binders.iter().zip(args) {
            bind(pattern, arg, &mut env);
        }
        self.eval(&env, &closure.body)
    }

    pub fn project(&self, target: Value, projection: &Projection) -> Value {
        match (self.force(target), projection) {
            (Value::StructOf(fields), Projection::Field(name)) => match fields.get(name) {
                Some(value) => value.force(self),
                None => Value::Hole,
            },
            (
                Value::VecOf(elements)
                | Value::I8ArrayOf(elements)
                | Value::I32ArrayOf(elements)
                | Value::I64ArrayOf(elements),
                Projection::Index(index),
            ) => match elements.get(*index) {
                Some(value) => value.force(self),
                None => Value::Hole,
            },
            (other, projection) => Value::Proj {
                target: Lazy::new(other),
                projection: projection.clone(),
            },
        }
    }

    /// `Some(true)` on a match, `Some(false)` when the value is a different
    /// literal, `None` when the value is stuck.
    pub fn matches(&self, pattern: &Pattern, value: &Lazy) -> Option<bool> {
        if pattern.is_irrefutable() {
            return Some(true);
        }
        let value = self.force(value.force(self));
        match (pattern, &value) {
            (Pattern::BoolOf(p), Value::BoolOf(v)) => Some(p == v),
            (Pattern::I8Of(p), Value::I8Of(v)) => Some(p == v),
            (Pattern::I16Of(p), Value::I16Of(v)) => Some(p == v),
            (Pattern::I32Of(p), Value::I32Of(v)) => Some(p == v),
            (Pattern::I64Of(p), Value::I64Of(v)) => Some(p == v),
            (Pattern::StrOf(p), Value::StrOf(v)) => Some(p == v),
            (Pattern::I8ArrayOf(patterns), Value::I8ArrayOf(elements))
            | (Pattern::I32ArrayOf(patterns), Value::I32ArrayOf(elements))
            | (Pattern::I64ArrayOf(patterns), Value::I64ArrayOf(elements))
            | (Pattern::VecOf(patterns), Value::VecOf(elements)) => {
                if patterns.len() != elements.len() {
                    return Some(false);
                }
                self.matches_all(patterns.iter().zip(elements.iter()))
            }
            (Pattern::StructOf(fields), Value::StructOf(values)) => {
                let mut pairs = Vec::with_capacity(fields.len());
                for (name, field) in fields {
                    match values.get(name) {
                        Some(value) => pairs.push((field, value)),
                        None => return Some(false),
                    }
                }
                self.matches_all(pairs.into_iter())
            }
            (_, value) if value.is_neutral() => None,
            _ => Some(false),
        }
    }

    fn matches_all<'a>(&self, pairs: impl Iterator<Item = (&'a Pattern, &'a Lazy)>) -> Option<bool> {
        let mut stuck = false;
        for (pattern, value) in pairs {
            match self.matches(pattern, value) {
                Some(false) => return Some(false),
                None => stuck = true,
                Some(true) => {}
            }
        }
        if stuck {
            None
        } else {
            Some(true)
        }
    }

    // ── Quoting ───────────────────────────────────────────────────

    /// Read a value back into a term valid under `level` binders. Solved
    /// metas are left in place; zonking substitutes them.
    pub fn quote(&self, level: usize, value: &Value) -> Term {
        match value {
            Value::Tag => Term::Tag,
            Value::TagOf(repr) => Term::TagOf(*repr),
            Value::Type(tag) => Term::Type(self.quote_lazy(level, tag)),
            Value::Unit => Term::Unit,
            Value::UnitOf => Term::UnitOf,
            Value::Bool => Term::Bool,
            Value::BoolOf(b) => Term::BoolOf(*b),
            Value::I8 => Term::I8,
            Value::I8Of(n) => Term::I8Of(*n),
            Value::I16 => Term::I16,
            Value::I16Of(n) => Term::I16Of(*n),
            Value::I32 => Term::I32,
            Value::I32Of(n) => Term::I32Of(*n),
            Value::I64 => Term::I64,
            Value::I64Of(n) => Term::I64Of(*n),
            Value::F32 => Term::F32,
            Value::F32Of(n) => Term::F32Of(*n),
            Value::F64 => Term::F64,
            Value::F64Of(n) => Term::F64Of(*n),
            Value::Str => Term::Str,
            Value::StrOf(s) => Term::StrOf(s.clone()),
            Value::I8Array => Term::I8Array,
            Value::I8ArrayOf(elements) => Term::I8ArrayOf(self.quote_all(level, elements)),
            Value::I32Array => Term::I32Array,
            Value::I32ArrayOf(elements) => Term::I32ArrayOf(self.quote_all(level, elements)),
            Value::I64Array => Term::I64Array,
            Value::I64ArrayOf(elements) => Term::I64ArrayOf(self.quote_all(level, elements)),
            Value::Vec(element) => Term::Vec(self.quote_lazy(level, element)),
            Value::VecOf(elements) => Term::VecOf(self.quote_all(level, elements)),
            Value::Struct(fields) => Term::Struct(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.quote_lazy(level, ty)))
                    .collect(),
            ),
            Value::StructOf(fields) => Term::StructOf(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), self.quote_lazy(level, value)))
                    .collect(),
            ),
            Value::Point(element) => Term::Point(self.quote_lazy(level, element)),
            Value::Union(elements) => Term::Union(self.quote_all(level, elements)),
            Value::Func { open, telescope } => {
                let (params, result) = self.quote_telescope(level, telescope);
                Term::Func {
                    open: *open,
                    params,
                    result,
                }
            }
            Value::FuncOf { open, closure } => Term::FuncOf {
                open: *open,
                params: closure.binders.clone(),
                result: Arc::new(self.quote_closure(level, closure)),
            },
            Value::Apply { open, func, args } => Term::Apply {
                open: *open,
                func: self.quote_lazy(level, func),
                args: self.quote_all(level, args),
            },
            Value::Code(element) => Term::Code(self.quote_lazy(level, element)),
            Value::CodeOf(element) => Term::CodeOf(self.quote_lazy(level, element)),
            Value::Splice(element) => Term::Splice(self.quote_lazy(level, element)),
            Value::Path(element) => Term::Path(self.quote_lazy(level, element)),
            Value::PathOf(element) => Term::PathOf(self.quote_lazy(level, element)),
            Value::Get(element) => Term::Get(self.quote_lazy(level, element)),
            Value::Command(command) => Term::Command(command.clone()),
            Value::If {
                scrutinee,
                branches,
            } => Term::If {
                scrutinee: self.quote_lazy(level, scrutinee),
                branches: branches
                    .iter()
                    .map(|branch| {
                        let pattern = branch.binders.first().cloned().unwrap_or(Pattern::Drop);
                        (pattern, Arc::new(self.quote_closure(level, branch)))
                    })
                    .collect(),
            },
            Value::Proj { target, projection } => Term::Proj {
                target: self.quote_lazy(level, target),
                projection: projection.clone(),
            },
            Value::Var {
                name,
                level: var_level,
                ..
            } => Term::Var {
                name: name.clone(),
                index: level.saturating_sub(var_level + 1),
            },
            Value::Def(location) => Term::Def(location.clone()),
            Value::Meta { id, span, .. } => Term::Meta { id: *id, span: *span },
            Value::Builtin(builtin) => Term::Builtin(*builtin),
            Value::Hole => Term::Hole,
        }
    }

    fn quote_lazy(&self, level: usize, value: &Lazy) -> Arc<Term> {
        Arc::new(self.quote(level, &value.force(self)))
    }

    fn quote_all(&self, level: usize, values: &[Lazy]) -> Vec<Arc<Term>> {
        values.iter().map(|value| self.quote_lazy(level, value)).collect()
    }

    /// Evaluate a closure body under fresh variables for its binders.
    pub fn open_closure(&self, level: usize, closure: &Closure) -> (usize, Value) {
        let mut env = closure.env.clone();
        let mut level = level;
        for pattern in &closure.binders {
            for name in pattern.binders() {
                env.push(Lazy::new(Value::var(name, level, Value::Hole)));
                level += 1;
            }
        }
        (level, self.eval(&env, &closure.body))
    }

    fn quote_closure(&self, level: usize, closure: &Closure) -> Term {
        let (level, body) = self.open_closure(level, closure);
        self.quote(level, &body)
    }

    fn quote_telescope(
        &self,
        level: usize,
        telescope: &Telescope,
    ) -> (Vec<(Pattern, Arc<Term>)>, Arc<Term>) {
        let mut env = telescope.env.clone();
        let mut level = level;
        let mut params = Vec::with_capacity(telescope.params.len());
        for (pattern, ty) in &telescope.params {
            let ty = self.eval(&env, ty);
            params.push((pattern.clone(), Arc::new(self.quote(level, &ty))));
            for name in pattern.binders() {
                let var_ty = if matches!(pattern, Pattern::Var(_)) {
                    ty.clone()
                } else {
                    Value::Hole
                };
                env.push(Lazy::new(Value::var(name, level, var_ty)));
                level += 1;
            }
        }
        let result = self.eval(&env, &telescope.result);
        (params, Arc::new(self.quote(level, &result)))
    }

    /// `quote ∘ eval` under `env`.
    pub fn normalize(&self, env: &Env, term: &Term) -> Term {
        self.quote(env.len(), &self.eval(env, term))
    }
}

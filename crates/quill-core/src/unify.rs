use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::ctx::Ctx;
use crate::eval::bind;
use crate::term::Pattern;
use crate::value::{Closure, Env, Lazy, Telescope, Value};

impl Ctx {
    /// Make `a` and `b` equal under `level` binders, solving metas as
    /// needed. A meta is never rejected for occurring in its own solution;
    /// [`Ctx::solve`] marks it cyclic instead. There is no pruning.
    /// Definitions are compared by name only.
    pub fn unify(&self, level: usize, a: &Value, b: &Value) -> bool {
        let a = self.force(a.clone());
        let b = self.force(b.clone());
        match (&a, &b) {
            (Value::Meta { id: x, .. }, Value::Meta { id: y, .. }) if x == y => true,
            (Value::Meta { id, .. }, _) => {
                self.solve(*id, b.clone());
                true
            }
            (_, Value::Meta { id, .. }) => {
                self.solve(*id, a.clone());
                true
            }
            (Value::Hole, _) | (_, Value::Hole) => true,

            (Value::Tag, Value::Tag)
            | (Value::Unit, Value::Unit)
            | (Value::UnitOf, Value::UnitOf)
            | (Value::Bool, Value::Bool)
            | (Value::I8, Value::I8)
            | (Value::I16, Value::I16)
            | (Value::I32, Value::I32)
            | (Value::I64, Value::I64)
            | (Value::F32, Value::F32)
            | (Value::F64, Value::F64)
            | (Value::Str, Value::Str)
            | (Value::I8Array, Value::I8Array)
            | (Value::I32Array, Value::I32Array)
            | (Value::I64Array, Value::I64Array) => true,

            (Value::TagOf(x), Value::TagOf(y)) => x == y,
            (Value::BoolOf(x), Value::BoolOf(y)) => x == y,
            (Value::I8Of(x), Value::I8Of(y)) => x == y,
            (Value::I16Of(x), Value::I16Of(y)) => x == y,
            (Value::I32Of(x), Value::I32Of(y)) => x == y,
            (Value::I64Of(x), Value::I64Of(y)) => x == y,
            (Value::F32Of(x), Value::F32Of(y)) => x.to_bits() == y.to_bits(),
            (Value::F64Of(x), Value::F64Of(y)) => x.to_bits() == y.to_bits(),
            (Value::StrOf(x), Value::StrOf(y)) => x == y,
            (Value::Command(x), Value::Command(y)) => x == y,

            (Value::Type(x), Value::Type(y))
            | (Value::Vec(x), Value::Vec(y))
            | (Value::Point(x), Value::Point(y))
            | (Value::Code(x), Value::Code(y))
            | (Value::CodeOf(x), Value::CodeOf(y))
            | (Value::Splice(x), Value::Splice(y))
            | (Value::Path(x), Value::Path(y))
            | (Value::PathOf(x), Value::PathOf(y))
            | (Value::Get(x), Value::Get(y)) => self.unify_lazy(level, x, y),

            (Value::I8ArrayOf(xs), Value::I8ArrayOf(ys))
            | (Value::I32ArrayOf(xs), Value::I32ArrayOf(ys))
            | (Value::I64ArrayOf(xs), Value::I64ArrayOf(ys))
            | (Value::VecOf(xs), Value::VecOf(ys))
            | (Value::Union(xs), Value::Union(ys)) => self.unify_all(level, xs, ys),

            (Value::Struct(xs), Value::Struct(ys)) | (Value::StructOf(xs), Value::StructOf(ys)) => {
                self.unify_fields(level, xs, ys)
            }

            (
                Value::Func {
                    open: open_a,
                    telescope: ta,
                },
                Value::Func {
                    open: open_b,
                    telescope: tb,
                },
            ) => open_a == open_b && self.unify_telescopes(level, ta, tb),

            (
                Value::FuncOf {
                    open: open_a,
                    closure: ca,
                },
                Value::FuncOf {
                    open: open_b,
                    closure: cb,
                },
            ) => open_a == open_b && self.unify_closures(level, ca, cb),

            (
                Value::Apply {
                    open: open_a,
                    func: fa,
                    args: xs,
                },
                Value::Apply {
                    open: open_b,
                    func: fb,
                    args: ys,
                },
            ) => open_a == open_b && self.unify_lazy(level, fa, fb) && self.unify_all(level, xs, ys),

            (
                Value::Proj {
                    target: ta,
                    projection: pa,
                },
                Value::Proj {
                    target: tb,
                    projection: pb,
                },
            ) => pa == pb && self.unify_lazy(level, ta, tb),

            (Value::Var { level: x, .. }, Value::Var { level: y, .. }) => x == y,
            (Value::Def(x), Value::Def(y)) => x == y,
            (Value::Builtin(x), Value::Builtin(y)) => x == y,

            // Stuck matches are not compared structurally.
            (Value::If { .. }, Value::If { .. }) => true,

            _ => false,
        }
    }

    fn unify_lazy(&self, level: usize, a: &Lazy, b: &Lazy) -> bool {
        self.unify(level, &a.force(self), &b.force(self))
    }

    fn unify_all(&self, level: usize, xs: &[Lazy], ys: &[Lazy]) -> bool {
        xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.unify_lazy(level, x, y))
    }

    fn unify_fields(
        &self,
        level: usize,
        xs: &IndexMap<SmolStr, Lazy>,
        ys: &IndexMap<SmolStr, Lazy>,
    ) -> bool {
        xs.len() == ys.len()
            && xs.iter().all(|(name, x)| match ys.get(name) {
                Some(y) => self.unify_lazy(level, x, y),
                None => false,
            })
    }

    fn unify_telescopes(&self, level: usize, a: &Telescope, b: &Telescope) -> bool {
        if a.params.len() != b.params.len() {
            return false;
        }
        let mut env_a = a.env.clone();
        let mut env_b = b.env.clone();
        let mut level = level;
        for ((pattern_a, ty_a), (pattern_b, ty_b)) in a.params.iter().zip(&b.params) {
            let ty_a = self.eval(&env_a, ty_a);
            let ty_b = self.eval(&env_b, ty_b);
            if !self.unify(level, &ty_a, &ty_b) {
                return false;
            }
            // Both sides see the same argument, represented by one fresh
            // variable per parameter.
            let arg = Lazy::new(Value::var(param_name(pattern_a), level, ty_a));
            level += 1;
            bind(pattern_a, arg.clone(), &mut env_a);
            bind(pattern_b, arg, &mut env_b);
        }
        let result_a = self.eval(&env_a, &a.result);
        let result_b = self.eval(&env_b, &b.result);
        self.unify(level, &result_a, &result_b)
    }

    fn unify_closures(&self, level: usize, a: &Closure, b: &Closure) -> bool {
        if a.binders.len() != b.binders.len() {
            return false;
        }
        let mut env_a = a.env.clone();
        let mut env_b = b.env.clone();
        let mut level = level;
        for (pattern_a, pattern_b) in a.binders.iter().zip(&b.binders) {
            let arg = Lazy::new(Value::var(param_name(pattern_a), level, Value::Hole));
            level += 1;
            bind(pattern_a, arg.clone(), &mut env_a);
            bind(pattern_b, arg, &mut env_b);
        }
        let body_a = self.eval(&env_a, &a.body);
        let body_b = self.eval(&env_b, &b.body);
        self.unify(level, &body_a, &body_b)
    }
}

fn param_name(pattern: &Pattern) -> SmolStr {
    match pattern {
        Pattern::Var(name) => name.clone(),
        _ => SmolStr::new_inline("_"),
    }
}

#[cfg(test)]
mod tests;

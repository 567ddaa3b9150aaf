use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use quill_syntax::{DefinitionLocation, Projection, Repr, Span};

use crate::builtin::Builtin;
use crate::ctx::Ctx;
use crate::meta::MetaId;
use crate::term::{Pattern, Term};

/// Semantic domain for normalization by evaluation. Binders are closures
/// over an [`Env`]; variables are de Bruijn levels.
#[derive(Debug, Clone)]
pub enum Value {
    Tag,
    TagOf(Repr),
    Type(Lazy),
    Unit,
    UnitOf,
    Bool,
    BoolOf(bool),
    I8,
    I8Of(i8),
    I16,
    I16Of(i16),
    I32,
    I32Of(i32),
    I64,
    I64Of(i64),
    F32,
    F32Of(f32),
    F64,
    F64Of(f64),
    Str,
    StrOf(String),
    I8Array,
    I8ArrayOf(Vec<Lazy>),
    I32Array,
    I32ArrayOf(Vec<Lazy>),
    I64Array,
    I64ArrayOf(Vec<Lazy>),
    Vec(Lazy),
    VecOf(Vec<Lazy>),
    Struct(IndexMap<SmolStr, Lazy>),
    StructOf(IndexMap<SmolStr, Lazy>),
    Point(Lazy),
    Union(Vec<Lazy>),
    Func {
        open: bool,
        telescope: Rc<Telescope>,
    },
    FuncOf {
        open: bool,
        closure: Rc<Closure>,
    },
    Apply {
        open: bool,
        func: Lazy,
        args: Vec<Lazy>,
    },
    Code(Lazy),
    CodeOf(Lazy),
    Splice(Lazy),
    Path(Lazy),
    PathOf(Lazy),
    Get(Lazy),
    Command(String),
    /// A match on a scrutinee that did not reduce far enough to pick a
    /// branch. Each branch closure binds exactly its pattern.
    If {
        scrutinee: Lazy,
        branches: Rc<[Closure]>,
    },
    Proj {
        target: Lazy,
        projection: Projection,
    },
    Var {
        name: SmolStr,
        level: usize,
        ty: Lazy,
    },
    Def(DefinitionLocation),
    Meta {
        id: MetaId,
        span: Span,
        ty: Lazy,
    },
    Builtin(Builtin),
    Hole,
}

impl Value {
    pub fn var(name: SmolStr, level: usize, ty: Value) -> Value {
        Value::Var {
            name,
            level,
            ty: Lazy::new(ty),
        }
    }

    /// Stuck computations: matching against these can neither succeed nor fail.
    pub fn is_neutral(&self) -> bool {
        matches!(
            self,
            Value::Var { .. }
                | Value::Meta { .. }
                | Value::Apply { .. }
                | Value::If { .. }
                | Value::Proj { .. }
                | Value::Splice(_)
                | Value::Get(_)
                | Value::Def(_)
                | Value::Command(_)
                | Value::Hole
        )
    }
}

/// Body of a function literal or match branch, awaiting its arguments.
#[derive(Debug, Clone)]
pub struct Closure {
    pub env: Env,
    pub binders: Vec<Pattern>,
    pub body: Arc<Term>,
}

/// Parameter list of a function type. Each parameter type is evaluated in
/// an environment extended by the binders of the parameters before it.
#[derive(Debug, Clone)]
pub struct Telescope {
    pub env: Env,
    pub params: Vec<(Pattern, Arc<Term>)>,
    pub result: Arc<Term>,
}

// ── Lazy ──────────────────────────────────────────────────────

/// A memoized thunk.
#[derive(Clone)]
pub struct Lazy(Rc<LazyCell>);

struct LazyCell {
    value: OnceCell<Value>,
    pending: RefCell<Option<Pending>>,
}

enum Pending {
    Eval(Env, Arc<Term>),
    Project(Lazy, Projection),
}

impl Lazy {
    pub fn new(value: Value) -> Lazy {
        Lazy(Rc::new(LazyCell {
            value: OnceCell::from(value),
            pending: RefCell::new(None),
        }))
    }

    pub fn eval(env: Env, term: Arc<Term>) -> Lazy {
        Lazy::pending(Pending::Eval(env, term))
    }

    pub fn project(target: Lazy, projection: Projection) -> Lazy {
        Lazy::pending(Pending::Project(target, projection))
    }

    fn pending(pending: Pending) -> Lazy {
        Lazy(Rc::new(LazyCell {
            value: OnceCell::new(),
            pending: RefCell::new(Some(pending)),
        }))
    }

    pub fn force(&self, ctx: &Ctx) -> Value {
        if let Some(value) = self.0.value.get() {
            return value.clone();
        }
        let pending = self.0.pending.borrow_mut().take();
        let value = match pending {
            Some(Pending::Eval(env, term)) => ctx.eval(&env, &term),
            Some(Pending::Project(target, projection)) => {
                ctx.project(target.force(ctx), &projection)
            }
            // Re-entered while being forced.
            None => Value::Hole,
        };
        self.0.value.get_or_init(|| value).clone()
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.value.get() {
            Some(value) => value.fmt(f),
            None => write!(f, "<thunk>"),
        }
    }
}

// ── Env ───────────────────────────────────────────────────────

/// Persistent environment: pushing shares the tail, so forks are O(1).
#[derive(Clone, Default)]
pub struct Env(Option<Rc<EnvNode>>);

struct EnvNode {
    head: Lazy,
    tail: Env,
    len: usize,
}

impl Env {
    pub fn new() -> Env {
        Env(None)
    }

    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |node| node.len)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn push(&mut self, value: Lazy) {
        let len = self.len() + 1;
        let tail = std::mem::take(self);
        *self = Env(Some(Rc::new(EnvNode {
            head: value,
            tail,
            len,
        })));
    }

    /// Look up by de Bruijn index.
    pub fn get(&self, index: usize) -> Option<&Lazy> {
        let mut env = self;
        let mut index = index;
        loop {
            let node = env.0.as_ref()?;
            if index == 0 {
                return Some(&node.head);
            }
            index -= 1;
            env = &node.tail;
        }
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Env({})", self.len())
    }
}

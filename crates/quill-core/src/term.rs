use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use quill_syntax::{Annotation, DefinitionLocation, Modifier, ModuleLocation, Projection, Repr, Span};

use crate::builtin::Builtin;
use crate::meta::MetaId;

/// Elaborated term. Variables are de Bruijn indices counted from the
/// innermost binder.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Tag,
    TagOf(Repr),
    Type(Arc<Term>),
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
    I8ArrayOf(Vec<Arc<Term>>),
    I32Array,
    I32ArrayOf(Vec<Arc<Term>>),
    I64Array,
    I64ArrayOf(Vec<Arc<Term>>),
    Vec(Arc<Term>),
    VecOf(Vec<Arc<Term>>),
    Struct(IndexMap<SmolStr, Arc<Term>>),
    StructOf(IndexMap<SmolStr, Arc<Term>>),
    Point(Arc<Term>),
    Union(Vec<Arc<Term>>),
    Func {
        open: bool,
        params: Vec<(Pattern, Arc<Term>)>,
        result: Arc<Term>,
    },
    FuncOf {
        open: bool,
        params: Vec<Pattern>,
        result: Arc<Term>,
    },
    Apply {
        open: bool,
        func: Arc<Term>,
        args: Vec<Arc<Term>>,
    },
    Code(Arc<Term>),
    CodeOf(Arc<Term>),
    Splice(Arc<Term>),
    Path(Arc<Term>),
    PathOf(Arc<Term>),
    Get(Arc<Term>),
    Command(String),
    Let {
        binder: Pattern,
        init: Arc<Term>,
        body: Arc<Term>,
    },
    If {
        scrutinee: Arc<Term>,
        branches: Vec<(Pattern, Arc<Term>)>,
    },
    Proj {
        target: Arc<Term>,
        projection: Projection,
    },
    Var {
        name: SmolStr,
        index: usize,
    },
    Def(DefinitionLocation),
    Meta {
        id: MetaId,
        span: Span,
    },
    Builtin(Builtin),
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    UnitOf,
    BoolOf(bool),
    I8Of(i8),
    I16Of(i16),
    I32Of(i32),
    I64Of(i64),
    StrOf(String),
    I8ArrayOf(Vec<Pattern>),
    I32ArrayOf(Vec<Pattern>),
    I64ArrayOf(Vec<Pattern>),
    VecOf(Vec<Pattern>),
    StructOf(IndexMap<SmolStr, Pattern>),
    Var(SmolStr),
    Drop,
    Hole,
}

impl Pattern {
    /// Names bound by this pattern, depth-first, left to right.
    pub fn binders(&self) -> Vec<SmolStr> {
        let mut binders = Vec::new();
        self.collect_binders(&mut binders);
        binders
    }

    pub fn binder_count(&self) -> usize {
        match self {
            Pattern::Var(_) => 1,
            Pattern::I8ArrayOf(elements)
            | Pattern::I32ArrayOf(elements)
            | Pattern::I64ArrayOf(elements)
            | Pattern::VecOf(elements) => elements.iter().map(Pattern::binder_count).sum(),
            Pattern::StructOf(fields) => fields.values().map(Pattern::binder_count).sum(),
            _ => 0,
        }
    }

    fn collect_binders(&self, binders: &mut Vec<SmolStr>) {
        match self {
            Pattern::Var(name) => binders.push(name.clone()),
            Pattern::I8ArrayOf(elements)
            | Pattern::I32ArrayOf(elements)
            | Pattern::I64ArrayOf(elements)
            | Pattern::VecOf(elements) => {
                for element in elements {
                    element.collect_binders(binders);
                }
            }
            Pattern::StructOf(fields) => {
                for field in fields.values() {
                    field.collect_binders(binders);
                }
            }
            _ => {}
        }
    }

    /// Matches every value of its type.
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Pattern::Var(_) | Pattern::Drop | Pattern::Hole | Pattern::UnitOf => true,
            Pattern::StructOf(fields) => fields.values().all(Pattern::is_irrefutable),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: ModuleLocation,
    pub imports: Vec<(DefinitionLocation, Span)>,
    pub definitions: IndexMap<DefinitionLocation, Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Def(Def),
    Hole(Span),
}

impl Definition {
    pub fn as_def(&self) -> Option<&Def> {
        match self {
            Definition::Def(def) => Some(def),
            Definition::Hole(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub doc: String,
    pub annotations: Vec<Annotation>,
    pub modifiers: Vec<Modifier>,
    pub name: DefinitionLocation,
    pub name_span: Span,
    pub ty: Arc<Term>,
    pub body: Arc<Term>,
}

impl Def {
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    /// Uses of an inline or builtin definition evaluate to its body.
    pub fn unfolds(&self) -> bool {
        self.has_modifier(Modifier::Inline) || self.has_modifier(Modifier::Builtin)
    }
}

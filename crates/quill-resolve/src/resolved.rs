use indexmap::IndexMap;
use smol_str::SmolStr;

use quill_syntax::{
    Annotation, DefinitionLocation, Modifier, ModuleLocation, Projection, Repr, Span,
};

/// Surface term with every name bound: locals become de Bruijn indices,
/// globals become definition locations.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub kind: TermKind,
    pub span: Span,
}

impl Term {
    pub fn new(kind: TermKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    Tag,
    TagOf(Repr),
    Type(Box<Term>),
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
    I8ArrayOf(Vec<Term>),
    I32Array,
    I32ArrayOf(Vec<Term>),
    I64Array,
    I64ArrayOf(Vec<Term>),
    Vec(Box<Term>),
    VecOf(Vec<Term>),
    Struct(IndexMap<SmolStr, Term>),
    StructOf(IndexMap<SmolStr, Term>),
    Point(Box<Term>),
    Union(Vec<Term>),
    Func {
        open: bool,
        params: Vec<(Pattern, Term)>,
        result: Box<Term>,
    },
    FuncOf {
        open: bool,
        params: Vec<Pattern>,
        result: Box<Term>,
    },
    Apply {
        open: bool,
        func: Box<Term>,
        args: Vec<Term>,
    },
    Code(Box<Term>),
    CodeOf(Box<Term>),
    Splice(Box<Term>),
    Path(Box<Term>),
    PathOf(Box<Term>),
    Get(Box<Term>),
    Command(String),
    Let {
        binder: Pattern,
        init: Box<Term>,
        body: Box<Term>,
    },
    If {
        scrutinee: Box<Term>,
        branches: Vec<(Pattern, Term)>,
    },
    Proj {
        target: Box<Term>,
        projection: Projection,
    },
    Var {
        name: SmolStr,
        index: usize,
    },
    Def(DefinitionLocation),
    Meta,
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

impl Pattern {
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Names bound by this pattern, depth-first, left to right.
    pub fn binders(&self) -> Vec<(SmolStr, Span)> {
        let mut binders = Vec::new();
        self.collect_binders(&mut binders);
        binders
    }

    fn collect_binders(&self, binders: &mut Vec<(SmolStr, Span)>) {
        match &self.kind {
            PatternKind::Var(name) => binders.push((name.clone(), self.span)),
            PatternKind::I8ArrayOf(elements)
            | PatternKind::I32ArrayOf(elements)
            | PatternKind::I64ArrayOf(elements)
            | PatternKind::VecOf(elements) => {
                for element in elements {
                    element.collect_binders(binders);
                }
            }
            PatternKind::StructOf(fields) => {
                for field in fields.values() {
                    field.collect_binders(binders);
                }
            }
            PatternKind::Anno { pattern, .. } => pattern.collect_binders(binders),
            PatternKind::UnitOf
            | PatternKind::BoolOf(_)
            | PatternKind::I8Of(_)
            | PatternKind::I16Of(_)
            | PatternKind::I32Of(_)
            | PatternKind::I64Of(_)
            | PatternKind::StrOf(_)
            | PatternKind::Drop
            | PatternKind::Hole => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
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
    /// Annotation types are resolved in the scope outside the pattern.
    Anno {
        pattern: Box<Pattern>,
        ty: Box<Term>,
    },
    Hole,
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

#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub doc: String,
    pub annotations: Vec<Annotation>,
    pub modifiers: Vec<Modifier>,
    pub name: DefinitionLocation,
    pub name_span: Span,
    pub ty: Term,
    pub body: Term,
}

impl Def {
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

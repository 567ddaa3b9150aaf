use std::fmt;

use smol_str::SmolStr;

use crate::{DefinitionLocation, ModuleLocation, Span};

/// Runtime representation tag of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repr {
    End,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    ByteArray,
    IntArray,
    LongArray,
    List,
    Compound,
}

impl Repr {
    pub const ALL: [Repr; 13] = [
        Repr::End,
        Repr::Byte,
        Repr::Short,
        Repr::Int,
        Repr::Long,
        Repr::Float,
        Repr::Double,
        Repr::String,
        Repr::ByteArray,
        Repr::IntArray,
        Repr::LongArray,
        Repr::List,
        Repr::Compound,
    ];

    /// Surface name, e.g. `int_tag`.
    pub fn name(self) -> &'static str {
        match self {
            Repr::End => "end_tag",
            Repr::Byte => "byte_tag",
            Repr::Short => "short_tag",
            Repr::Int => "int_tag",
            Repr::Long => "long_tag",
            Repr::Float => "float_tag",
            Repr::Double => "double_tag",
            Repr::String => "string_tag",
            Repr::ByteArray => "byte_array_tag",
            Repr::IntArray => "int_array_tag",
            Repr::LongArray => "long_array_tag",
            Repr::List => "list_tag",
            Repr::Compound => "compound_tag",
        }
    }

    pub fn from_name(name: &str) -> Option<Repr> {
        Repr::ALL.into_iter().find(|repr| repr.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Builtin,
    Export,
    Inline,
    Rec,
    Test,
    Error,
}

impl Modifier {
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Builtin => "builtin",
            Modifier::Export => "export",
            Modifier::Inline => "inline",
            Modifier::Rec => "rec",
            Modifier::Test => "test",
            Modifier::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Option<Modifier> {
        [
            Modifier::Builtin,
            Modifier::Export,
            Modifier::Inline,
            Modifier::Rec,
            Modifier::Test,
            Modifier::Error,
        ]
        .into_iter()
        .find(|modifier| modifier.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Annotation {
    Deprecated,
    Unstable,
    Delicate,
}

impl Annotation {
    pub fn name(self) -> &'static str {
        match self {
            Annotation::Deprecated => "deprecated",
            Annotation::Unstable => "unstable",
            Annotation::Delicate => "delicate",
        }
    }

    pub fn from_name(name: &str) -> Option<Annotation> {
        [
            Annotation::Deprecated,
            Annotation::Unstable,
            Annotation::Delicate,
        ]
        .into_iter()
        .find(|annotation| annotation.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    Field(SmolStr),
    Index(usize),
}

impl Projection {
    /// `.3` projects an index, anything else a field.
    pub fn from_accessor(accessor: &str) -> Projection {
        match accessor.parse::<usize>() {
            Ok(index) => Projection::Index(index),
            Err(_) => Projection::Field(accessor.into()),
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Projection::Field(name) => write!(f, ".{}", name),
            Projection::Index(index) => write!(f, ".{}", index),
        }
    }
}

// ── Terms ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub kind: TermKind,
    pub span: Span,
}

impl Term {
    pub fn new(kind: TermKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn hole(span: Span) -> Self {
        Self::new(TermKind::Hole, span)
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
    Struct(Vec<(SmolStr, Span, Term)>),
    StructOf(Vec<(SmolStr, Span, Term)>),
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
    Var(SmolStr),
    Meta,
    Hole,
}

// ── Patterns ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

impl Pattern {
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Self { kind, span }
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
    StructOf(Vec<(SmolStr, Span, Pattern)>),
    Var(SmolStr),
    Drop,
    Anno {
        pattern: Box<Pattern>,
        ty: Box<Term>,
    },
    Hole,
}

// ── Modules ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: ModuleLocation,
    pub imports: Vec<(DefinitionLocation, Span)>,
    /// Kept in source order, duplicates included.
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Def(Def),
    /// A definition form that failed to parse.
    Hole(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub doc: String,
    pub annotations: Vec<(Annotation, Span)>,
    pub modifiers: Vec<(Modifier, Span)>,
    pub name: DefinitionLocation,
    pub name_span: Span,
    pub ty: Term,
    pub body: Term,
    pub span: Span,
}

impl Def {
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.iter().any(|(m, _)| *m == modifier)
    }
}

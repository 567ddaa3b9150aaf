use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::meta::meta_number;
use crate::term::{Pattern, Term};

fn list<T: fmt::Display>(f: &mut fmt::Formatter, head: &str, items: &[T]) -> fmt::Result {
    write!(f, "({}", head)?;
    for item in items {
        write!(f, " {}", item)?;
    }
    write!(f, ")")
}

fn fields<T: fmt::Display>(f: &mut fmt::Formatter, items: &IndexMap<SmolStr, T>) -> fmt::Result {
    for (i, (name, item)) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, ":{} {}", name, item)?;
    }
    Ok(())
}

fn float(f: &mut fmt::Formatter, value: f64, suffix: &str) -> fmt::Result {
    if value.fract() == 0.0 && value.is_finite() {
        write!(f, "{:.1}{}", value, suffix)
    } else {
        write!(f, "{}{}", value, suffix)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Tag => write!(f, "tag"),
            Term::TagOf(repr) => write!(f, "{}", repr.name()),
            Term::Type(tag) => write!(f, "(type {})", tag),
            Term::Unit => write!(f, "unit"),
            Term::UnitOf => write!(f, "()"),
            Term::Bool => write!(f, "bool"),
            Term::BoolOf(b) => write!(f, "{}", b),
            Term::I8 => write!(f, "byte"),
            Term::I8Of(n) => write!(f, "{}b", n),
            Term::I16 => write!(f, "short"),
            Term::I16Of(n) => write!(f, "{}s", n),
            Term::I32 => write!(f, "int"),
            Term::I32Of(n) => write!(f, "{}", n),
            Term::I64 => write!(f, "long"),
            Term::I64Of(n) => write!(f, "{}l", n),
            Term::F32 => write!(f, "float"),
            Term::F32Of(n) => float(f, f64::from(*n), "f"),
            Term::F64 => write!(f, "double"),
            Term::F64Of(n) => float(f, *n, ""),
            Term::Str => write!(f, "string"),
            Term::StrOf(s) => write!(f, "{:?}", s),
            Term::I8Array => write!(f, "byte_array"),
            Term::I8ArrayOf(elements) => list(f, "byte_array_of", elements),
            Term::I32Array => write!(f, "int_array"),
            Term::I32ArrayOf(elements) => list(f, "int_array_of", elements),
            Term::I64Array => write!(f, "long_array"),
            Term::I64ArrayOf(elements) => list(f, "long_array_of", elements),
            Term::Vec(element) => write!(f, "(list {})", element),
            Term::VecOf(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Term::Struct(items) => {
                write!(f, "(struct")?;
                if !items.is_empty() {
                    write!(f, " ")?;
                }
                fields(f, items)?;
                write!(f, ")")
            }
            Term::StructOf(items) => {
                write!(f, "{{")?;
                fields(f, items)?;
                write!(f, "}}")
            }
            Term::Point(element) => write!(f, "(point {})", element),
            Term::Union(elements) => list(f, "union", elements),
            Term::Func {
                open,
                params,
                result,
            } => {
                write!(f, "({} (", if *open { "=>" } else { "->" })?;
                for (i, (pattern, ty)) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match pattern {
                        Pattern::Drop => write!(f, "{}", ty)?,
                        _ => write!(f, "({} : {})", pattern, ty)?,
                    }
                }
                write!(f, ") {})", result)
            }
            Term::FuncOf {
                open,
                params,
                result,
            } => {
                write!(f, "({} (", if *open { "open-fn" } else { "fn" })?;
                for (i, pattern) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", pattern)?;
                }
                write!(f, ") {})", result)
            }
            Term::Apply { open, func, args } => {
                write!(f, "(")?;
                if *open {
                    write!(f, "! ")?;
                }
                write!(f, "{}", func)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Term::Code(element) => write!(f, "(code {})", element),
            Term::CodeOf(element) => write!(f, "`{}", element),
            Term::Splice(element) => write!(f, ",{}", element),
            Term::Path(element) => write!(f, "(path {})", element),
            Term::PathOf(element) => write!(f, "(path_of {})", element),
            Term::Get(element) => write!(f, "(get {})", element),
            Term::Command(command) => write!(f, "(command {:?})", command),
            Term::Let { binder, init, body } => {
                write!(f, "(let (({} {})) {})", binder, init, body)
            }
            Term::If {
                scrutinee,
                branches,
            } => {
                write!(f, "(match {}", scrutinee)?;
                for (pattern, body) in branches {
                    write!(f, " ({} {})", pattern, body)?;
                }
                write!(f, ")")
            }
            Term::Proj { target, projection } => write!(f, "({} {})", projection, target),
            Term::Var { name, .. } => write!(f, "{}", name),
            Term::Def(location) => write!(f, "{}", location.name),
            Term::Meta { id, .. } => write!(f, "?{}", meta_number(*id)),
            Term::Builtin(builtin) => write!(f, "{}", builtin),
            Term::Hole => write!(f, "_"),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pattern::UnitOf => write!(f, "()"),
            Pattern::BoolOf(b) => write!(f, "{}", b),
            Pattern::I8Of(n) => write!(f, "{}b", n),
            Pattern::I16Of(n) => write!(f, "{}s", n),
            Pattern::I32Of(n) => write!(f, "{}", n),
            Pattern::I64Of(n) => write!(f, "{}l", n),
            Pattern::StrOf(s) => write!(f, "{:?}", s),
            Pattern::I8ArrayOf(elements) => list(f, "byte_array_of", elements),
            Pattern::I32ArrayOf(elements) => list(f, "int_array_of", elements),
            Pattern::I64ArrayOf(elements) => list(f, "long_array_of", elements),
            Pattern::VecOf(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Pattern::StructOf(items) => {
                write!(f, "{{")?;
                fields(f, items)?;
                write!(f, "}}")
            }
            Pattern::Var(name) => write!(f, "{}", name),
            Pattern::Drop | Pattern::Hole => write!(f, "_"),
        }
    }
}

/// Render a term for editor markup.
pub fn markdown(ty: &Arc<Term>) -> String {
    format!("```quill\n{}\n```", ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_syntax::{ModuleLocation, Repr};

    fn func(open: bool, params: Vec<(Pattern, Term)>, result: Term) -> Term {
        Term::Func {
            open,
            params: params.into_iter().map(|(p, t)| (p, Arc::new(t))).collect(),
            result: Arc::new(result),
        }
    }

    #[test]
    fn display_types() {
        let ty = func(
            false,
            vec![
                (Pattern::Drop, Term::I32),
                (Pattern::Var("x".into()), Term::Vec(Arc::new(Term::Str))),
            ],
            Term::Type(Arc::new(Term::TagOf(Repr::Compound))),
        );
        insta::assert_snapshot!(ty.to_string(), @"(-> (int (x : (list string))) (type compound_tag))");
    }

    #[test]
    fn display_values() {
        let mut items = IndexMap::new();
        items.insert(SmolStr::from("a"), Arc::new(Term::I8Of(1)));
        items.insert(SmolStr::from("b"), Arc::new(Term::F64Of(2.0)));
        let term = Term::VecOf(vec![
            Arc::new(Term::StructOf(items)),
            Arc::new(Term::F32Of(1.5)),
            Arc::new(Term::Def(ModuleLocation::parse("std/list").definition("map"))),
        ]);
        insta::assert_snapshot!(term.to_string(), @"[{:a 1b :b 2.0} 1.5f map]");
    }

    #[test]
    fn display_lambda() {
        let term = Term::FuncOf {
            open: true,
            params: vec![Pattern::Var("x".into()), Pattern::Drop],
            result: Arc::new(Term::Var {
                name: "x".into(),
                index: 1,
            }),
        };
        insta::assert_snapshot!(term.to_string(), @"(open-fn (x _) x)");
    }
}

use std::fmt;
use std::sync::Arc;

use crate::term::{Pattern, Term};
use crate::value::Value;

/// Primitive operations bound by `(def name :builtin TYPE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Not,
    And,
    Or,
    IntAdd,
    IntSub,
    IntMul,
    IntEq,
    IntLt,
    StringConcat,
}

const ALL: [Builtin; 9] = [
    Builtin::Not,
    Builtin::And,
    Builtin::Or,
    Builtin::IntAdd,
    Builtin::IntSub,
    Builtin::IntMul,
    Builtin::IntEq,
    Builtin::IntLt,
    Builtin::StringConcat,
];

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::IntAdd => "int_add",
            Builtin::IntSub => "int_sub",
            Builtin::IntMul => "int_mul",
            Builtin::IntEq => "int_eq",
            Builtin::IntLt => "int_lt",
            Builtin::StringConcat => "string_concat",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        ALL.into_iter().find(|b| b.name() == name)
    }

    /// Closed, non-dependent function type.
    pub fn ty(self) -> Term {
        let (params, result) = match self {
            Builtin::Not => (vec![Term::Bool], Term::Bool),
            Builtin::And | Builtin::Or => (vec![Term::Bool, Term::Bool], Term::Bool),
            Builtin::IntAdd | Builtin::IntSub | Builtin::IntMul => {
                (vec![Term::I32, Term::I32], Term::I32)
            }
            Builtin::IntEq | Builtin::IntLt => (vec![Term::I32, Term::I32], Term::Bool),
            Builtin::StringConcat => (vec![Term::Str, Term::Str], Term::Str),
        };
        Term::Func {
            open: false,
            params: params
                .into_iter()
                .map(|param| (Pattern::Drop, Arc::new(param)))
                .collect(),
            result: Arc::new(result),
        }
    }

    /// Constant-fold a saturated call whose arguments are all literals.
    pub fn fold(self, args: &[Value]) -> Option<Value> {
        let value = match (self, args) {
            (Builtin::Not, [Value::BoolOf(a)]) => Value::BoolOf(!a),
            (Builtin::And, [Value::BoolOf(a), Value::BoolOf(b)]) => Value::BoolOf(*a && *b),
            (Builtin::Or, [Value::BoolOf(a), Value::BoolOf(b)]) => Value::BoolOf(*a || *b),
            (Builtin::IntAdd, [Value::I32Of(a), Value::I32Of(b)]) => Value::I32Of(a.wrapping_add(*b)),
            (Builtin::IntSub, [Value::I32Of(a), Value::I32Of(b)]) => Value::I32Of(a.wrapping_sub(*b)),
            (Builtin::IntMul, [Value::I32Of(a), Value::I32Of(b)]) => Value::I32Of(a.wrapping_mul(*b)),
            (Builtin::IntEq, [Value::I32Of(a), Value::I32Of(b)]) => Value::BoolOf(a == b),
            (Builtin::IntLt, [Value::I32Of(a), Value::I32Of(b)]) => Value::BoolOf(a < b),
            (Builtin::StringConcat, [Value::StrOf(a), Value::StrOf(b)]) => {
                Value::StrOf(format!("{}{}", a, b))
            }
            _ => return None,
        };
        Some(value)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for builtin in ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(Builtin::from_name("launch_missiles"), None);
    }

    #[test]
    fn folds_literals_only() {
        assert!(matches!(
            Builtin::IntAdd.fold(&[Value::I32Of(2), Value::I32Of(3)]),
            Some(Value::I32Of(5))
        ));
        assert!(matches!(
            Builtin::IntLt.fold(&[Value::I32Of(2), Value::I32Of(3)]),
            Some(Value::BoolOf(true))
        ));
        assert!(Builtin::IntAdd.fold(&[Value::I32Of(2), Value::Hole]).is_none());
        assert!(Builtin::Not.fold(&[]).is_none());
    }
}

use std::fmt;

use indexmap::IndexMap;

use crate::{DefinitionLocation, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub span: Span,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            span,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            span,
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.span.start, self.span.end, self.message)
    }
}

/// Diagnostics grouped by the definition they belong to. The `None` bucket
/// holds module-level problems (lexing, parsing, imports).
pub type Diagnostics = IndexMap<Option<DefinitionLocation>, Vec<Diagnostic>>;

pub fn push_diagnostic(
    diagnostics: &mut Diagnostics,
    key: Option<DefinitionLocation>,
    diagnostic: Diagnostic,
) {
    diagnostics.entry(key).or_default().push(diagnostic);
}

/// Append every bucket of `other` onto `into`, keeping bucket order.
pub fn merge_diagnostics(into: &mut Diagnostics, other: Diagnostics) {
    for (key, mut list) in other {
        into.entry(key).or_default().append(&mut list);
    }
}

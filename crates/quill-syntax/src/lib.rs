//! Source-level building blocks: locations, diagnostics, the lexer and the
//! surface syntax tree produced by the parser.

pub mod diagnostic;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod surface;

pub use diagnostic::{merge_diagnostics, push_diagnostic, Diagnostic, Diagnostics, Severity};
pub use location::{DefinitionLocation, ModuleLocation, Query, SourceLocation, Span};
pub use parser::parse;
pub use surface::{Annotation, Modifier, Projection, Repr};

//! The checked core language: terms, the value domain used for
//! normalization by evaluation, metavariables, unification, zonking and
//! the elaborator that ties them together.

pub mod builtin;
pub mod ctx;
mod display;
pub mod elaborate;
pub mod eval;
pub mod meta;
pub mod term;
pub mod unify;
pub mod value;
pub mod zonk;

pub use builtin::Builtin;
pub use ctx::{Ctx, Global};
pub use display::markdown;
pub use elaborate::{elaborate, Elaborated, Hover, InlayHint};
pub use meta::{MetaId, Metas};
pub use term::{Def, Definition, Module, Pattern, Term};
pub use value::{Closure, Env, Lazy, Telescope, Value};

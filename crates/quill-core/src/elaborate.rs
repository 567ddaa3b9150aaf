//! Bidirectional elaboration of resolved modules into core modules.
//!
//! Every definition is checked in two passes: all signatures first, so
//! bodies can mention definitions further down the module, then every body
//! against its signature. Metas left unsolved at the end of a definition are
//! reported on that definition.

use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use quill_resolve::resolved::{self, PatternKind, TermKind};
use quill_syntax::{
    push_diagnostic, Diagnostic, DefinitionLocation, Diagnostics, Modifier, Projection, Query,
    Repr, Span,
};

use crate::builtin::Builtin;
use crate::ctx::{Ctx, Global};
use crate::eval::bind;
use crate::term::{Def, Definition, Module, Pattern, Term};
use crate::value::{Env, Lazy, Telescope, Value};

pub struct Elaborated {
    pub module: Module,
    pub diagnostics: Diagnostics,
    pub hover: Option<Hover>,
    pub inlay_hints: Vec<InlayHint>,
}

/// Type of the innermost term under a [`Query::Hover`] offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Hover {
    pub span: Span,
    pub ty: Term,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlayHint {
    pub offset: u32,
    pub label: String,
}

/// Check `module` against its already elaborated dependencies.
pub fn elaborate(
    module: &resolved::Module,
    dependencies: &[&Module],
    query: Option<Query>,
) -> Elaborated {
    let ctx = Ctx::new();
    for dependency in dependencies {
        ctx.load_module(dependency);
    }

    let mut elaborator = Elaborator::new(&ctx, query);
    let module = elaborator.elaborate_module(module);
    let hover = elaborator.render_hover();
    let inlay_hints = elaborator.render_inlay_hints();
    tracing::debug!(module = %module.name, metas = ctx.metas().len(), "elaborated");

    Elaborated {
        module,
        diagnostics: elaborator.diagnostics,
        hover,
        inlay_hints,
    }
}

fn universe(repr: Repr) -> Value {
    Value::Type(Lazy::new(Value::TagOf(repr)))
}

/// Forms that build a value directly and are quoted implicitly when a
/// `code` type is expected.
fn quotable(kind: &TermKind) -> bool {
    matches!(
        kind,
        TermKind::UnitOf
            | TermKind::BoolOf(_)
            | TermKind::I8Of(_)
            | TermKind::I16Of(_)
            | TermKind::I32Of(_)
            | TermKind::I64Of(_)
            | TermKind::F32Of(_)
            | TermKind::F64Of(_)
            | TermKind::StrOf(_)
            | TermKind::I8ArrayOf(_)
            | TermKind::I32ArrayOf(_)
            | TermKind::I64ArrayOf(_)
            | TermKind::VecOf(_)
            | TermKind::StructOf(_)
            | TermKind::FuncOf { .. }
    )
}

fn split_annotation(pattern: &resolved::Pattern) -> (&resolved::Pattern, Option<&resolved::Term>) {
    match &pattern.kind {
        PatternKind::Anno { pattern, ty } => (pattern, Some(ty)),
        _ => (pattern, None),
    }
}

/// Rebuild the value a pattern stands for from the variables of its binders.
fn pattern_value<I: Iterator<Item = Value>>(pattern: &Pattern, vars: &mut I) -> Value {
    let all = |elements: &[Pattern], vars: &mut I| -> Vec<Lazy> {
        elements
            .iter()
            .map(|element| Lazy::new(pattern_value(element, vars)))
            .collect()
    };
    match pattern {
        Pattern::UnitOf => Value::UnitOf,
        Pattern::BoolOf(b) => Value::BoolOf(*b),
        Pattern::I8Of(n) => Value::I8Of(*n),
        Pattern::I16Of(n) => Value::I16Of(*n),
        Pattern::I32Of(n) => Value::I32Of(*n),
        Pattern::I64Of(n) => Value::I64Of(*n),
        Pattern::StrOf(s) => Value::StrOf(s.clone()),
        Pattern::I8ArrayOf(elements) => Value::I8ArrayOf(all(elements, vars)),
        Pattern::I32ArrayOf(elements) => Value::I32ArrayOf(all(elements, vars)),
        Pattern::I64ArrayOf(elements) => Value::I64ArrayOf(all(elements, vars)),
        Pattern::VecOf(elements) => Value::VecOf(all(elements, vars)),
        Pattern::StructOf(fields) => Value::StructOf(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), Lazy::new(pattern_value(field, vars))))
                .collect(),
        ),
        Pattern::Var(_) => vars.next().unwrap_or(Value::Hole),
        Pattern::Drop | Pattern::Hole => Value::Hole,
    }
}

struct PendingHover {
    span: Span,
    level: usize,
    ty: Value,
    doc: Option<String>,
}

struct PendingHint {
    offset: u32,
    level: usize,
    ty: Value,
}

struct Elaborator<'a> {
    ctx: &'a Ctx,
    query: Option<Query>,
    env: Env,
    /// Types of the variables in `env`, outermost first.
    types: Vec<Value>,
    current: Option<DefinitionLocation>,
    recursive: bool,
    errors: Vec<Diagnostic>,
    diagnostics: Diagnostics,
    hover: Option<PendingHover>,
    hints: Vec<PendingHint>,
}

impl<'a> Elaborator<'a> {
    fn new(ctx: &'a Ctx, query: Option<Query>) -> Self {
        Self {
            ctx,
            query,
            env: Env::new(),
            types: Vec::new(),
            current: None,
            recursive: false,
            errors: Vec::new(),
            diagnostics: Diagnostics::new(),
            hover: None,
            hints: Vec::new(),
        }
    }

    // ── Modules ───────────────────────────────────────────────────

    fn elaborate_module(&mut self, module: &resolved::Module) -> Module {
        let mut signatures = IndexMap::new();
        for (location, definition) in &module.definitions {
            let resolved::Definition::Def(def) = definition else {
                continue;
            };
            self.enter(def);
            let universe = self.ctx.fresh_type(def.ty.span);
            let ty = self.check(&def.ty, &universe);
            self.ctx.define(
                location.clone(),
                Global {
                    ty: Arc::new(ty.clone()),
                    body: None,
                    annotations: def.annotations.clone(),
                    doc: def.doc.clone(),
                },
            );
            signatures.insert(location.clone(), ty);
            self.leave();
        }

        let mut definitions = IndexMap::new();
        for (location, definition) in &module.definitions {
            let def = match definition {
                resolved::Definition::Def(def) => def,
                resolved::Definition::Hole(span) => {
                    definitions.insert(location.clone(), Definition::Hole(*span));
                    continue;
                }
            };
            let ty = signatures.get(location).cloned().unwrap_or(Term::Hole);
            let def = self.elaborate_def(def, ty);
            definitions.insert(location.clone(), Definition::Def(def));
        }

        Module {
            name: module.name.clone(),
            imports: module.imports.clone(),
            definitions,
        }
    }

    fn elaborate_def(&mut self, def: &resolved::Def, ty: Term) -> Def {
        self.enter(def);
        let ty_value = self.ctx.eval(&Env::new(), &ty);
        let doc = (!def.doc.is_empty()).then(|| def.doc.clone());
        self.record_hover(def.name_span, &ty_value, doc);

        let body = if def.has_modifier(Modifier::Builtin) {
            self.builtin(def, &ty_value)
        } else {
            self.check(&def.body, &ty_value)
        };

        let (zonked, errors) = self.ctx.check_solved(&[&ty, &body]);
        self.errors.extend(errors);
        let mut zonked = zonked.into_iter();
        let ty = zonked.next().unwrap_or(Term::Hole);
        let body = zonked.next().unwrap_or(Term::Hole);

        // Recursive bodies are kept as written; unfolding them has no end.
        let empty = Env::new();
        let ty = Arc::new(self.ctx.normalize(&empty, &ty));
        let body = if def.has_modifier(Modifier::Rec) || def.has_modifier(Modifier::Builtin) {
            Arc::new(body)
        } else {
            Arc::new(self.ctx.normalize(&empty, &body))
        };

        let def = Def {
            doc: def.doc.clone(),
            annotations: def.annotations.clone(),
            modifiers: def.modifiers.clone(),
            name: def.name.clone(),
            name_span: def.name_span,
            ty,
            body,
        };
        if def.unfolds() {
            self.ctx.define(
                def.name.clone(),
                Global {
                    ty: def.ty.clone(),
                    body: Some(def.body.clone()),
                    annotations: def.annotations.clone(),
                    doc: def.doc.clone(),
                },
            );
        }
        self.leave();
        def
    }

    fn builtin(&mut self, def: &resolved::Def, ty: &Value) -> Term {
        let Some(builtin) = Builtin::from_name(&def.name.name) else {
            self.error(format!("unknown builtin `{}`", def.name.name), def.name_span);
            return Term::Hole;
        };
        let expected = self.ctx.eval(&Env::new(), &builtin.ty());
        self.expect(def.ty.span, &expected, ty);
        Term::Builtin(builtin)
    }

    fn enter(&mut self, def: &resolved::Def) {
        self.current = Some(def.name.clone());
        self.recursive = def.has_modifier(Modifier::Rec);
        self.env = Env::new();
        self.types.clear();
    }

    fn leave(&mut self) {
        let errors = std::mem::take(&mut self.errors);
        let key = self.current.take();
        for error in errors {
            push_diagnostic(&mut self.diagnostics, key.clone(), error);
        }
    }

    // ── Diagnostics and queries ───────────────────────────────────

    fn error(&mut self, message: String, span: Span) {
        self.errors.push(Diagnostic::error(message, span));
    }

    fn level(&self) -> usize {
        self.types.len()
    }

    fn render(&self, value: &Value) -> String {
        let level = self.level();
        self.ctx
            .zonk(level, &self.ctx.quote(level, value))
            .to_string()
    }

    /// Unify `found` into `expected`, reporting a mismatch on failure.
    fn expect(&mut self, span: Span, expected: &Value, found: &Value) {
        if !self.ctx.unify(self.level(), expected, found) {
            let message = format!(
                "type mismatch: expected {}, found {}",
                self.render(expected),
                self.render(found)
            );
            self.error(message, span);
        }
    }

    fn record_hover(&mut self, span: Span, ty: &Value, doc: Option<String>) {
        let Some(Query::Hover(offset)) = self.query else {
            return;
        };
        if !span.contains(offset) {
            return;
        }
        if let Some(best) = &self.hover {
            if best.span.len() <= span.len() {
                return;
            }
        }
        self.hover = Some(PendingHover {
            span,
            level: self.level(),
            ty: ty.clone(),
            doc,
        });
    }

    fn record_hint(&mut self, span: Span, ty: &Value) {
        let Some(Query::InlayHints(range)) = self.query else {
            return;
        };
        if range.overlaps(span) {
            self.hints.push(PendingHint {
                offset: span.end,
                level: self.level(),
                ty: ty.clone(),
            });
        }
    }

    fn render_hover(&self) -> Option<Hover> {
        let hover = self.hover.as_ref()?;
        let ty = self.ctx.quote(hover.level, &hover.ty);
        Some(Hover {
            span: hover.span,
            ty: self.ctx.zonk(hover.level, &ty),
            doc: hover.doc.clone(),
        })
    }

    fn render_inlay_hints(&self) -> Vec<InlayHint> {
        self.hints
            .iter()
            .map(|hint| {
                let ty = self.ctx.quote(hint.level, &hint.ty);
                InlayHint {
                    offset: hint.offset,
                    label: format!(": {}", self.ctx.zonk(hint.level, &ty)),
                }
            })
            .collect()
    }

    // ── Scope ─────────────────────────────────────────────────────

    fn save(&self) -> (Env, usize) {
        (self.env.clone(), self.types.len())
    }

    fn restore(&mut self, (env, len): (Env, usize)) {
        self.env = env;
        self.types.truncate(len);
    }

    /// Bind the variables of `pattern` as fresh neutral values and return
    /// the value of the whole pattern.
    fn push_vars(&mut self, pattern: &Pattern, types: Vec<Value>) -> Value {
        let mut vars = Vec::with_capacity(types.len());
        for (name, ty) in pattern.binders().into_iter().zip(types) {
            let var = Value::var(name, self.level(), ty.clone());
            self.env.push(Lazy::new(var.clone()));
            self.types.push(ty);
            vars.push(var);
        }
        pattern_value(pattern, &mut vars.into_iter())
    }

    /// Bind the variables of `pattern` by destructuring `value`.
    fn push_value(&mut self, pattern: &Pattern, value: Lazy, types: Vec<Value>) {
        bind(pattern, value, &mut self.env);
        self.types.extend(types);
    }

    // ── Patterns ──────────────────────────────────────────────────

    fn check_pattern(&mut self, pattern: &resolved::Pattern, expected: &Value) -> (Pattern, Vec<Value>) {
        let mut types = Vec::new();
        let pattern = self.check_pattern_into(pattern, expected, true, &mut types);
        (pattern, types)
    }

    /// Check `pattern` against `expected`, appending the types of its
    /// binders in binding order. The binder count always matches the
    /// resolved pattern, even on errors.
    fn check_pattern_into(
        &mut self,
        pattern: &resolved::Pattern,
        expected: &Value,
        hint: bool,
        types: &mut Vec<Value>,
    ) -> Pattern {
        let expected = self.ctx.force(expected.clone());
        let span = pattern.span;
        match &pattern.kind {
            PatternKind::UnitOf => {
                self.expect(span, &expected, &Value::Unit);
                Pattern::UnitOf
            }
            PatternKind::BoolOf(b) => {
                self.expect(span, &expected, &Value::Bool);
                Pattern::BoolOf(*b)
            }
            PatternKind::I8Of(n) => {
                self.expect(span, &expected, &Value::I8);
                Pattern::I8Of(*n)
            }
            PatternKind::I16Of(n) => {
                self.expect(span, &expected, &Value::I16);
                Pattern::I16Of(*n)
            }
            PatternKind::I32Of(n) => {
                self.expect(span, &expected, &Value::I32);
                Pattern::I32Of(*n)
            }
            PatternKind::I64Of(n) => {
                self.expect(span, &expected, &Value::I64);
                Pattern::I64Of(*n)
            }
            PatternKind::StrOf(s) => {
                self.expect(span, &expected, &Value::Str);
                Pattern::StrOf(s.clone())
            }
            PatternKind::I8ArrayOf(elements) => {
                self.expect(span, &expected, &Value::I8Array);
                Pattern::I8ArrayOf(self.check_patterns(elements, &Value::I8, types))
            }
            PatternKind::I32ArrayOf(elements) => {
                self.expect(span, &expected, &Value::I32Array);
                Pattern::I32ArrayOf(self.check_patterns(elements, &Value::I32, types))
            }
            PatternKind::I64ArrayOf(elements) => {
                self.expect(span, &expected, &Value::I64Array);
                Pattern::I64ArrayOf(self.check_patterns(elements, &Value::I64, types))
            }
            PatternKind::VecOf(elements) => {
                let element = match &expected {
                    Value::Vec(element) => element.force(self.ctx),
                    _ => {
                        let element = self.ctx.fresh_type_value(span);
                        self.expect(span, &expected, &Value::Vec(Lazy::new(element.clone())));
                        element
                    }
                };
                Pattern::VecOf(self.check_patterns(elements, &element, types))
            }
            PatternKind::StructOf(fields) => {
                let known = match &expected {
                    Value::Struct(known) => Some(known.clone()),
                    _ => None,
                };
                let mut patterns = IndexMap::new();
                let mut field_types = IndexMap::new();
                for (name, field) in fields {
                    let ty = match &known {
                        Some(known) => match known.get(name) {
                            Some(ty) => ty.force(self.ctx),
                            None => {
                                let message =
                                    format!("no field `{}` in `{}`", name, self.render(&expected));
                                self.error(message, field.span);
                                Value::Hole
                            }
                        },
                        None => self.ctx.fresh_type_value(field.span),
                    };
                    field_types.insert(name.clone(), Lazy::new(ty.clone()));
                    let pattern = self.check_pattern_into(field, &ty, hint, types);
                    patterns.insert(name.clone(), pattern);
                }
                if known.is_none() {
                    self.expect(span, &expected, &Value::Struct(field_types));
                }
                Pattern::StructOf(patterns)
            }
            PatternKind::Var(name) => {
                if hint {
                    self.record_hint(span, &expected);
                }
                types.push(expected);
                Pattern::Var(name.clone())
            }
            PatternKind::Drop => Pattern::Drop,
            PatternKind::Anno { pattern, ty } => {
                let universe = self.ctx.fresh_type(ty.span);
                let ty = self.check(ty, &universe);
                let ty = self.ctx.eval(&self.env, &ty);
                self.expect(span, &expected, &ty);
                self.check_pattern_into(pattern, &ty, false, types)
            }
            PatternKind::Hole => Pattern::Hole,
        }
    }

    fn check_patterns(
        &mut self,
        patterns: &[resolved::Pattern],
        expected: &Value,
        types: &mut Vec<Value>,
    ) -> Vec<Pattern> {
        patterns
            .iter()
            .map(|pattern| self.check_pattern_into(pattern, expected, true, types))
            .collect()
    }

    // ── Checking ──────────────────────────────────────────────────

    fn check(&mut self, term: &resolved::Term, expected: &Value) -> Term {
        let expected = self.ctx.force(expected.clone());
        let span = term.span;
        let checked = match (&term.kind, &expected) {
            (
                TermKind::FuncOf {
                    open,
                    params,
                    result,
                },
                Value::Func {
                    open: expected_open,
                    telescope,
                },
            ) if open == expected_open && params.len() == telescope.params.len() => {
                self.check_func_of(*open, params, result, telescope)
            }
            (TermKind::CodeOf(element), Value::Code(ty)) => {
                let ty = ty.force(self.ctx);
                Term::CodeOf(Arc::new(self.check(element, &ty)))
            }
            (kind, Value::Code(ty)) if quotable(kind) => {
                let ty = ty.force(self.ctx);
                Term::CodeOf(Arc::new(self.check(term, &ty)))
            }
            (TermKind::VecOf(elements), Value::Vec(ty)) => {
                let ty = ty.force(self.ctx);
                Term::VecOf(
                    elements
                        .iter()
                        .map(|element| Arc::new(self.check(element, &ty)))
                        .collect(),
                )
            }
            (TermKind::StructOf(fields), Value::Struct(types))
                if fields.len() == types.len() && fields.keys().all(|k| types.contains_key(k)) =>
            {
                let mut checked = IndexMap::new();
                for (name, field) in fields {
                    let ty = types
                        .get(name)
                        .map_or(Value::Hole, |ty| ty.force(self.ctx));
                    checked.insert(name.clone(), Arc::new(self.check(field, &ty)));
                }
                Term::StructOf(checked)
            }
            (TermKind::Let { binder, init, body }, _) => {
                self.elaborate_let(binder, init, body, Some(&expected)).0
            }
            (
                TermKind::If {
                    scrutinee,
                    branches,
                },
                _,
            ) => self.elaborate_if(span, scrutinee, branches, Some(&expected)).0,
            (TermKind::Meta, _) => {
                let meta = self.ctx.fresh_value(span, expected.clone());
                self.ctx.quote(self.level(), &meta)
            }
            // Commands are opaque to the checker.
            (TermKind::Command(command), _) => Term::Command(command.clone()),
            (TermKind::Hole, _) => Term::Hole,
            _ => {
                let (inferred, found) = self.infer(term);
                return self.coerce(span, inferred, &found, &expected);
            }
        };
        self.record_hover(span, &expected, None);
        checked
    }

    fn coerce(&mut self, span: Span, term: Term, found: &Value, expected: &Value) -> Term {
        if let Value::Code(element) = expected {
            let found = self.ctx.force(found.clone());
            if !matches!(found, Value::Code(_) | Value::Meta { .. } | Value::Hole) {
                let element = element.force(self.ctx);
                self.expect(span, &element, &found);
                return Term::CodeOf(Arc::new(term));
            }
        }
        self.expect(span, expected, found);
        term
    }

    fn check_func_of(
        &mut self,
        open: bool,
        params: &[resolved::Pattern],
        result: &resolved::Term,
        telescope: &Telescope,
    ) -> Term {
        let saved = self.save();
        let mut env = telescope.env.clone();
        let mut patterns = Vec::with_capacity(params.len());
        for (param, (expected_pattern, ty)) in params.iter().zip(&telescope.params) {
            let ty = self.ctx.eval(&env, ty);
            let (pattern, types) = self.check_pattern(param, &ty);
            let arg = self.push_vars(&pattern, types);
            bind(expected_pattern, Lazy::new(arg), &mut env);
            patterns.push(pattern);
        }
        let result_ty = self.ctx.eval(&env, &telescope.result);
        let body = self.check(result, &result_ty);
        self.restore(saved);
        Term::FuncOf {
            open,
            params: patterns,
            result: Arc::new(body),
        }
    }

    // ── Inference ─────────────────────────────────────────────────

    fn infer(&mut self, term: &resolved::Term) -> (Term, Value) {
        let span = term.span;
        let (inferred, ty) = match &term.kind {
            TermKind::Tag => (Term::Tag, universe(Repr::End)),
            TermKind::TagOf(repr) => (Term::TagOf(*repr), Value::Tag),
            TermKind::Type(tag) => {
                let tag = self.check(tag, &Value::Tag);
                (Term::Type(Arc::new(tag)), universe(Repr::End))
            }
            TermKind::Unit => (Term::Unit, universe(Repr::Byte)),
            TermKind::UnitOf => (Term::UnitOf, Value::Unit),
            TermKind::Bool => (Term::Bool, universe(Repr::Byte)),
            TermKind::BoolOf(b) => (Term::BoolOf(*b), Value::Bool),
            TermKind::I8 => (Term::I8, universe(Repr::Byte)),
            TermKind::I8Of(n) => (Term::I8Of(*n), Value::I8),
            TermKind::I16 => (Term::I16, universe(Repr::Short)),
            TermKind::I16Of(n) => (Term::I16Of(*n), Value::I16),
            TermKind::I32 => (Term::I32, universe(Repr::Int)),
            TermKind::I32Of(n) => (Term::I32Of(*n), Value::I32),
            TermKind::I64 => (Term::I64, universe(Repr::Long)),
            TermKind::I64Of(n) => (Term::I64Of(*n), Value::I64),
            TermKind::F32 => (Term::F32, universe(Repr::Float)),
            TermKind::F32Of(n) => (Term::F32Of(*n), Value::F32),
            TermKind::F64 => (Term::F64, universe(Repr::Double)),
            TermKind::F64Of(n) => (Term::F64Of(*n), Value::F64),
            TermKind::Str => (Term::Str, universe(Repr::String)),
            TermKind::StrOf(s) => (Term::StrOf(s.clone()), Value::Str),
            TermKind::I8Array => (Term::I8Array, universe(Repr::ByteArray)),
            TermKind::I8ArrayOf(elements) => (
                Term::I8ArrayOf(self.check_all(elements, &Value::I8)),
                Value::I8Array,
            ),
            TermKind::I32Array => (Term::I32Array, universe(Repr::IntArray)),
            TermKind::I32ArrayOf(elements) => (
                Term::I32ArrayOf(self.check_all(elements, &Value::I32)),
                Value::I32Array,
            ),
            TermKind::I64Array => (Term::I64Array, universe(Repr::LongArray)),
            TermKind::I64ArrayOf(elements) => (
                Term::I64ArrayOf(self.check_all(elements, &Value::I64)),
                Value::I64Array,
            ),
            TermKind::Vec(element) => {
                let element = self.check_type(element);
                (Term::Vec(Arc::new(element)), universe(Repr::List))
            }
            TermKind::VecOf(elements) => {
                let element = self.ctx.fresh_type_value(span);
                (
                    Term::VecOf(self.check_all(elements, &element)),
                    Value::Vec(Lazy::new(element)),
                )
            }
            TermKind::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), Arc::new(self.check_type(ty))))
                    .collect();
                (Term::Struct(fields), universe(Repr::Compound))
            }
            TermKind::StructOf(fields) => {
                let mut terms = IndexMap::new();
                let mut types = IndexMap::new();
                for (name, field) in fields {
                    let (term, ty) = self.infer(field);
                    terms.insert(name.clone(), Arc::new(term));
                    types.insert(name.clone(), Lazy::new(ty));
                }
                (Term::StructOf(terms), Value::Struct(types))
            }
            TermKind::Point(element) => {
                let universe = self.ctx.fresh_type(span);
                let ty = self.ctx.fresh_value(span, universe.clone());
                let element = self.check(element, &ty);
                (Term::Point(Arc::new(element)), universe)
            }
            TermKind::Union(elements) if elements.is_empty() => {
                (Term::Union(Vec::new()), universe(Repr::End))
            }
            TermKind::Union(elements) => {
                let universe = self.ctx.fresh_type(span);
                (Term::Union(self.check_all(elements, &universe)), universe)
            }
            TermKind::Func {
                open,
                params,
                result,
            } => self.infer_func(*open, params, result),
            TermKind::FuncOf {
                open,
                params,
                result,
            } => self.infer_func_of(*open, params, result),
            TermKind::Apply { open, func, args } => self.infer_apply(span, *open, func, args),
            TermKind::Code(element) => {
                let element = self.check_type(element);
                (Term::Code(Arc::new(element)), universe(Repr::End))
            }
            TermKind::CodeOf(element) => {
                let (element, ty) = self.infer(element);
                (Term::CodeOf(Arc::new(element)), Value::Code(Lazy::new(ty)))
            }
            TermKind::Splice(element) => {
                let ty = self.ctx.fresh_type_value(span);
                let element = self.check(element, &Value::Code(Lazy::new(ty.clone())));
                (Term::Splice(Arc::new(element)), ty)
            }
            TermKind::Path(element) => {
                let element = self.check_type(element);
                (Term::Path(Arc::new(element)), universe(Repr::End))
            }
            TermKind::PathOf(element) => {
                let (element, ty) = self.infer(element);
                (Term::PathOf(Arc::new(element)), Value::Path(Lazy::new(ty)))
            }
            TermKind::Get(element) => {
                let ty = self.ctx.fresh_type_value(span);
                let element = self.check(element, &Value::Path(Lazy::new(ty.clone())));
                (Term::Get(Arc::new(element)), ty)
            }
            TermKind::Command(command) => {
                (Term::Command(command.clone()), self.ctx.fresh_type_value(span))
            }
            TermKind::Let { binder, init, body } => self.elaborate_let(binder, init, body, None),
            TermKind::If {
                scrutinee,
                branches,
            } => self.elaborate_if(span, scrutinee, branches, None),
            TermKind::Proj { target, projection } => self.infer_proj(span, target, projection),
            TermKind::Var { name, index } => {
                let ty = self
                    .level()
                    .checked_sub(index + 1)
                    .and_then(|level| self.types.get(level))
                    .cloned()
                    .unwrap_or(Value::Hole);
                (
                    Term::Var {
                        name: name.clone(),
                        index: *index,
                    },
                    ty,
                )
            }
            TermKind::Def(location) => self.infer_def(span, location),
            TermKind::Meta => {
                let ty = self.ctx.fresh_type_value(span);
                let meta = self.ctx.fresh_value(span, ty.clone());
                (self.ctx.quote(self.level(), &meta), ty)
            }
            TermKind::Hole => (Term::Hole, Value::Hole),
        };
        self.record_hover(span, &ty, None);
        (inferred, ty)
    }

    fn check_all(&mut self, terms: &[resolved::Term], expected: &Value) -> Vec<Arc<Term>> {
        terms
            .iter()
            .map(|term| Arc::new(self.check(term, expected)))
            .collect()
    }

    /// Check `term` against a type universe with an unknown tag.
    fn check_type(&mut self, term: &resolved::Term) -> Term {
        let universe = self.ctx.fresh_type(term.span);
        self.check(term, &universe)
    }

    fn infer_func(
        &mut self,
        open: bool,
        params: &[(resolved::Pattern, resolved::Term)],
        result: &resolved::Term,
    ) -> (Term, Value) {
        let saved = self.save();
        let mut checked = Vec::with_capacity(params.len());
        for (pattern, ty) in params {
            let ty = self.check_type(ty);
            let ty_value = self.ctx.eval(&self.env, &ty);
            let (pattern, types) = self.check_pattern(pattern, &ty_value);
            self.push_vars(&pattern, types);
            checked.push((pattern, Arc::new(ty)));
        }
        let result = self.check_type(result);
        self.restore(saved);
        (
            Term::Func {
                open,
                params: checked,
                result: Arc::new(result),
            },
            universe(Repr::Compound),
        )
    }

    fn infer_func_of(
        &mut self,
        open: bool,
        params: &[resolved::Pattern],
        result: &resolved::Term,
    ) -> (Term, Value) {
        let saved = self.save();
        let mut patterns = Vec::with_capacity(params.len());
        let mut telescope = Vec::with_capacity(params.len());
        for param in params {
            let level = self.level();
            let ty = self.ctx.fresh_type_value(param.span);
            let (pattern, types) = self.check_pattern(param, &ty);
            self.push_vars(&pattern, types);
            telescope.push((pattern.clone(), Arc::new(self.ctx.quote(level, &ty))));
            patterns.push(pattern);
        }
        let (body, result_ty) = self.infer(result);
        let result_ty = self.ctx.quote(self.level(), &result_ty);
        self.restore(saved);

        let ty = Value::Func {
            open,
            telescope: Rc::new(Telescope {
                env: self.env.clone(),
                params: telescope,
                result: Arc::new(result_ty),
            }),
        };
        (
            Term::FuncOf {
                open,
                params: patterns,
                result: Arc::new(body),
            },
            ty,
        )
    }

    fn infer_apply(
        &mut self,
        span: Span,
        open: bool,
        func: &resolved::Term,
        args: &[resolved::Term],
    ) -> (Term, Value) {
        let (func, func_ty) = self.infer(func);
        let func = Arc::new(func);
        let telescope = match self.ctx.force(func_ty) {
            Value::Func {
                open: func_open,
                telescope,
            } => {
                if func_open != open {
                    let message = if open {
                        "expected an open function, found a closed one"
                    } else {
                        "expected a closed function, found an open one"
                    };
                    self.error(message.into(), span);
                }
                if telescope.params.len() == args.len() {
                    Some(telescope)
                } else {
                    let message = format!(
                        "expected {} arguments, found {}",
                        telescope.params.len(),
                        args.len()
                    );
                    self.error(message, span);
                    None
                }
            }
            Value::Hole => None,
            other => {
                let message = format!("expected a function, found `{}`", self.render(&other));
                self.error(message, span);
                None
            }
        };

        let Some(telescope) = telescope else {
            let args = args
                .iter()
                .map(|arg| Arc::new(self.infer(arg).0))
                .collect();
            return (Term::Apply { open, func, args }, Value::Hole);
        };

        let mut env = telescope.env.clone();
        let mut checked = Vec::with_capacity(args.len());
        for (arg, (pattern, ty)) in args.iter().zip(&telescope.params) {
            let ty = self.ctx.eval(&env, ty);
            let arg = Arc::new(self.check(arg, &ty));
            bind(pattern, Lazy::eval(self.env.clone(), arg.clone()), &mut env);
            checked.push(arg);
        }
        let result = self.ctx.eval(&env, &telescope.result);
        (
            Term::Apply {
                open,
                func,
                args: checked,
            },
            result,
        )
    }

    fn elaborate_let(
        &mut self,
        binder: &resolved::Pattern,
        init: &resolved::Term,
        body: &resolved::Term,
        expected: Option<&Value>,
    ) -> (Term, Value) {
        let (binder, annotation) = split_annotation(binder);
        let (init, init_ty) = match annotation {
            Some(ty) => {
                let ty = self.check_type(ty);
                let ty = self.ctx.eval(&self.env, &ty);
                (self.check(init, &ty), ty)
            }
            None => self.infer(init),
        };
        let init = Arc::new(init);

        let mut types = Vec::new();
        let pattern = self.check_pattern_into(binder, &init_ty, annotation.is_none(), &mut types);
        let saved = self.save();
        self.push_value(&pattern, Lazy::eval(self.env.clone(), init.clone()), types);
        let (body, ty) = match expected {
            Some(expected) => (self.check(body, expected), expected.clone()),
            None => self.infer(body),
        };
        self.restore(saved);
        (
            Term::Let {
                binder: pattern,
                init,
                body: Arc::new(body),
            },
            ty,
        )
    }

    fn elaborate_if(
        &mut self,
        span: Span,
        scrutinee: &resolved::Term,
        branches: &[(resolved::Pattern, resolved::Term)],
        expected: Option<&Value>,
    ) -> (Term, Value) {
        let (scrutinee, scrutinee_ty) = self.infer(scrutinee);
        let scrutinee = Arc::new(scrutinee);
        let ty = match expected {
            Some(expected) => expected.clone(),
            None => self.ctx.fresh_type_value(span),
        };
        let mut checked = Vec::with_capacity(branches.len());
        for (pattern, body) in branches {
            let (pattern, types) = self.check_pattern(pattern, &scrutinee_ty);
            let saved = self.save();
            self.push_value(&pattern, Lazy::eval(self.env.clone(), scrutinee.clone()), types);
            let body = self.check(body, &ty);
            self.restore(saved);
            checked.push((pattern, Arc::new(body)));
        }
        (
            Term::If {
                scrutinee,
                branches: checked,
            },
            ty,
        )
    }

    fn infer_proj(
        &mut self,
        span: Span,
        target: &resolved::Term,
        projection: &Projection,
    ) -> (Term, Value) {
        let (target, target_ty) = self.infer(target);
        let ty = match (self.ctx.force(target_ty), projection) {
            (Value::Struct(fields), Projection::Field(name)) if fields.contains_key(name) => fields
                .get(name)
                .map_or(Value::Hole, |ty| ty.force(self.ctx)),
            (Value::Vec(element), Projection::Index(_)) => element.force(self.ctx),
            (Value::I8Array, Projection::Index(_)) => Value::I8,
            (Value::I32Array, Projection::Index(_)) => Value::I32,
            (Value::I64Array, Projection::Index(_)) => Value::I64,
            (Value::Hole, _) => Value::Hole,
            (other, projection) => {
                let message = format!(
                    "cannot project `{}` from `{}`",
                    projection,
                    self.render(&other)
                );
                self.error(message, span);
                Value::Hole
            }
        };
        (
            Term::Proj {
                target: Arc::new(target),
                projection: projection.clone(),
            },
            ty,
        )
    }

    fn infer_def(&mut self, span: Span, location: &DefinitionLocation) -> (Term, Value) {
        let term = Term::Def(location.clone());
        let Some(global) = self.ctx.global(location) else {
            // Signature not elaborated yet, or lost to an earlier error.
            return (term, Value::Hole);
        };
        if self.current.as_ref() == Some(location) {
            if !self.recursive {
                let message = format!("`{}` refers to itself without `:rec`", location.name);
                self.error(message, span);
            }
        } else {
            for annotation in &global.annotations {
                self.errors.push(Diagnostic::warning(
                    format!("`{}` is {}", location.name, annotation.name()),
                    span,
                ));
            }
        }
        let ty = self.ctx.eval(&Env::new(), &global.ty);
        let doc = (!global.doc.is_empty()).then(|| global.doc.clone());
        self.record_hover(span, &ty, doc);
        (term, ty)
    }
}

#[cfg(test)]
mod tests;

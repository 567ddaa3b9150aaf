//! Name resolution: turns the surface tree of one module into a tree where
//! every name is either a de Bruijn index or a definition location.

pub mod resolved;

use std::collections::HashMap;

use indexmap::IndexMap;
use smol_str::SmolStr;

use quill_syntax::surface;
use quill_syntax::{
    push_diagnostic, Diagnostic, Diagnostics, DefinitionLocation, Modifier, ModuleLocation, Query,
    SourceLocation, Span,
};

use resolved::{Def, Definition, Module, Pattern, PatternKind, Term, TermKind};

pub struct Resolved {
    pub module: Module,
    pub diagnostics: Diagnostics,
    /// Target of a [`Query::Definition`], when the offset hits a name.
    pub definition: Option<SourceLocation>,
}

/// Resolve `module` against the already-resolved modules it depends on.
/// Only the definitions named in `(import ...)` forms and those of the
/// prelude module are visible; unknown names become holes with a diagnostic.
pub fn resolve(module: &surface::Module, dependencies: &[&Module], query: Option<Query>) -> Resolved {
    let mut resolver = Resolver::new(module, dependencies, query);
    let resolved = resolver.resolve_module(module);
    Resolved {
        module: resolved,
        diagnostics: resolver.diagnostics,
        definition: resolver.definition,
    }
}

/// Key used for a definition form that failed to parse.
pub fn hole_location(module: &ModuleLocation, span: Span) -> DefinitionLocation {
    module.definition(format!("<hole@{}>", span.start))
}

struct Resolver {
    module: ModuleLocation,
    own: HashMap<SmolStr, (DefinitionLocation, Span)>,
    imported: HashMap<SmolStr, Vec<SourceTarget>>,
    prelude: HashMap<SmolStr, SourceTarget>,
    locals: Vec<(SmolStr, Span)>,
    current: Option<DefinitionLocation>,
    diagnostics: Diagnostics,
    lookup_offset: Option<u32>,
    definition: Option<SourceLocation>,
}

#[derive(Clone)]
struct SourceTarget {
    location: DefinitionLocation,
    span: Span,
}

impl Resolver {
    fn new(module: &surface::Module, dependencies: &[&Module], query: Option<Query>) -> Self {
        let mut diagnostics = Diagnostics::new();

        let mut own = HashMap::new();
        for definition in &module.definitions {
            if let surface::Definition::Def(def) = definition {
                own.entry(def.name.name.clone())
                    .or_insert_with(|| (def.name.clone(), def.name_span));
            }
        }

        let mut imported: HashMap<SmolStr, Vec<SourceTarget>> = HashMap::new();
        for (location, span) in &module.imports {
            // Modules missing from `dependencies` were skipped upstream, which
            // reports the reason itself.
            let Some(dependency) = dependencies.iter().find(|d| d.name == location.module) else {
                continue;
            };
            match dependency.definitions.get(location) {
                Some(Definition::Def(def)) => {
                    let targets = imported.entry(location.name.clone()).or_default();
                    if !targets.iter().any(|t| t.location == *location) {
                        targets.push(SourceTarget {
                            location: location.clone(),
                            span: def.name_span,
                        });
                    }
                }
                _ => push_diagnostic(
                    &mut diagnostics,
                    None,
                    Diagnostic::error(
                        format!("definition `{}` not found in `{}`", location.name, location.module),
                        *span,
                    ),
                ),
            }
        }

        let mut prelude = HashMap::new();
        let prelude_location = ModuleLocation::prelude();
        if module.name != prelude_location {
            if let Some(dependency) = dependencies.iter().find(|d| d.name == prelude_location) {
                for definition in dependency.definitions.values() {
                    if let Definition::Def(def) = definition {
                        prelude.insert(
                            def.name.name.clone(),
                            SourceTarget {
                                location: def.name.clone(),
                                span: def.name_span,
                            },
                        );
                    }
                }
            }
        }

        let lookup_offset = match query {
            Some(Query::Definition(offset)) => Some(offset),
            _ => None,
        };

        Self {
            module: module.name.clone(),
            own,
            imported,
            prelude,
            locals: Vec::new(),
            current: None,
            diagnostics,
            lookup_offset,
            definition: None,
        }
    }

    fn error(&mut self, message: String, span: Span) {
        push_diagnostic(
            &mut self.diagnostics,
            self.current.clone(),
            Diagnostic::error(message, span),
        );
    }

    fn record_target(&mut self, span: Span, module: &ModuleLocation, target: Span) {
        if self.lookup_offset.is_some_and(|offset| span.contains(offset)) {
            self.definition = Some(SourceLocation {
                module: module.clone(),
                span: target,
            });
        }
    }

    // ── Modules ───────────────────────────────────────────────────

    fn resolve_module(&mut self, module: &surface::Module) -> Module {
        let mut definitions = IndexMap::new();

        for definition in &module.definitions {
            match definition {
                surface::Definition::Hole(span) => {
                    definitions.insert(hole_location(&self.module, *span), Definition::Hole(*span));
                }
                surface::Definition::Def(def) => {
                    if definitions.contains_key(&def.name) {
                        self.current = None;
                        self.error(format!("duplicate definition `{}`", def.name.name), def.name_span);
                        continue;
                    }
                    self.current = Some(def.name.clone());
                    let resolved = self.resolve_def(def);
                    definitions.insert(def.name.clone(), Definition::Def(resolved));
                }
            }
        }
        self.current = None;

        Module {
            name: module.name.clone(),
            imports: module.imports.clone(),
            definitions,
        }
    }

    fn resolve_def(&mut self, def: &surface::Def) -> Def {
        if def.has_modifier(Modifier::Inline) && def.has_modifier(Modifier::Rec) {
            let span = def
                .modifiers
                .iter()
                .find(|(m, _)| *m == Modifier::Rec)
                .map(|(_, s)| *s)
                .unwrap_or(def.name_span);
            self.error("conflicting modifiers `:inline` and `:rec`".into(), span);
        }

        let ty = self.resolve_term(&def.ty);
        let body = self.resolve_term(&def.body);
        Def {
            doc: def.doc.clone(),
            annotations: def.annotations.iter().map(|(a, _)| *a).collect(),
            modifiers: def.modifiers.iter().map(|(m, _)| *m).collect(),
            name: def.name.clone(),
            name_span: def.name_span,
            ty,
            body,
        }
    }

    // ── Names ─────────────────────────────────────────────────────

    fn resolve_name(&mut self, name: &SmolStr, span: Span) -> TermKind {
        if let Some(position) = self.locals.iter().rposition(|(n, _)| n == name) {
            let binder = self.locals[position].1;
            let module = self.module.clone();
            self.record_target(span, &module, binder);
            return TermKind::Var {
                name: name.clone(),
                index: self.locals.len() - 1 - position,
            };
        }

        if let Some((location, target)) = self.own.get(name).cloned() {
            let module = self.module.clone();
            self.record_target(span, &module, target);
            return TermKind::Def(location);
        }

        if let Some(targets) = self.imported.get(name).cloned() {
            if targets.len() > 1 {
                let candidates: Vec<String> = targets.iter().map(|t| t.location.to_string()).collect();
                self.error(
                    format!("ambiguous name `{}`: could be {}", name, candidates.join(", ")),
                    span,
                );
            }
            let target = &targets[0];
            self.record_target(span, &target.location.module, target.span);
            return TermKind::Def(target.location.clone());
        }

        if let Some(target) = self.prelude.get(name).cloned() {
            self.record_target(span, &target.location.module, target.span);
            return TermKind::Def(target.location);
        }

        self.error(format!("name not found: `{}`", name), span);
        TermKind::Hole
    }

    fn bind(&mut self, pattern: &Pattern) {
        self.locals.extend(pattern.binders());
    }

    // ── Terms ─────────────────────────────────────────────────────

    fn resolve_terms(&mut self, terms: &[surface::Term]) -> Vec<Term> {
        terms.iter().map(|t| self.resolve_term(t)).collect()
    }

    fn resolve_boxed(&mut self, term: &surface::Term) -> Box<Term> {
        Box::new(self.resolve_term(term))
    }

    fn resolve_fields(&mut self, fields: &[(SmolStr, Span, surface::Term)]) -> IndexMap<SmolStr, Term> {
        let mut resolved = IndexMap::new();
        for (name, span, term) in fields {
            let term = self.resolve_term(term);
            if resolved.contains_key(name) {
                self.error(format!("duplicate field `{}`", name), *span);
            } else {
                resolved.insert(name.clone(), term);
            }
        }
        resolved
    }

    fn resolve_term(&mut self, term: &surface::Term) -> Term {
        use surface::TermKind as S;

        let kind = match &term.kind {
            S::Tag => TermKind::Tag,
            S::TagOf(repr) => TermKind::TagOf(*repr),
            S::Type(inner) => TermKind::Type(self.resolve_boxed(inner)),
            S::Unit => TermKind::Unit,
            S::UnitOf => TermKind::UnitOf,
            S::Bool => TermKind::Bool,
            S::BoolOf(b) => TermKind::BoolOf(*b),
            S::I8 => TermKind::I8,
            S::I8Of(n) => TermKind::I8Of(*n),
            S::I16 => TermKind::I16,
            S::I16Of(n) => TermKind::I16Of(*n),
            S::I32 => TermKind::I32,
            S::I32Of(n) => TermKind::I32Of(*n),
            S::I64 => TermKind::I64,
            S::I64Of(n) => TermKind::I64Of(*n),
            S::F32 => TermKind::F32,
            S::F32Of(n) => TermKind::F32Of(*n),
            S::F64 => TermKind::F64,
            S::F64Of(n) => TermKind::F64Of(*n),
            S::Str => TermKind::Str,
            S::StrOf(s) => TermKind::StrOf(s.clone()),
            S::I8Array => TermKind::I8Array,
            S::I8ArrayOf(elements) => TermKind::I8ArrayOf(self.resolve_terms(elements)),
            S::I32Array => TermKind::I32Array,
            S::I32ArrayOf(elements) => TermKind::I32ArrayOf(self.resolve_terms(elements)),
            S::I64Array => TermKind::I64Array,
            S::I64ArrayOf(elements) => TermKind::I64ArrayOf(self.resolve_terms(elements)),
            S::Vec(element) => TermKind::Vec(self.resolve_boxed(element)),
            S::VecOf(elements) => TermKind::VecOf(self.resolve_terms(elements)),
            S::Struct(fields) => TermKind::Struct(self.resolve_fields(fields)),
            S::StructOf(fields) => TermKind::StructOf(self.resolve_fields(fields)),
            S::Point(inner) => TermKind::Point(self.resolve_boxed(inner)),
            S::Union(elements) => TermKind::Union(self.resolve_terms(elements)),
            S::Func { open, params, result } => {
                let depth = self.locals.len();
                let mut resolved = Vec::with_capacity(params.len());
                for (pattern, ty) in params {
                    let ty = self.resolve_term(ty);
                    let pattern = self.resolve_pattern(pattern);
                    self.bind(&pattern);
                    resolved.push((pattern, ty));
                }
                let result = self.resolve_boxed(result);
                self.locals.truncate(depth);
                TermKind::Func {
                    open: *open,
                    params: resolved,
                    result,
                }
            }
            S::FuncOf { open, params, result } => {
                let depth = self.locals.len();
                let mut resolved = Vec::with_capacity(params.len());
                for pattern in params {
                    let pattern = self.resolve_pattern(pattern);
                    self.bind(&pattern);
                    resolved.push(pattern);
                }
                let result = self.resolve_boxed(result);
                self.locals.truncate(depth);
                TermKind::FuncOf {
                    open: *open,
                    params: resolved,
                    result,
                }
            }
            S::Apply { open, func, args } => TermKind::Apply {
                open: *open,
                func: self.resolve_boxed(func),
                args: self.resolve_terms(args),
            },
            S::Code(inner) => TermKind::Code(self.resolve_boxed(inner)),
            S::CodeOf(inner) => TermKind::CodeOf(self.resolve_boxed(inner)),
            S::Splice(inner) => TermKind::Splice(self.resolve_boxed(inner)),
            S::Path(inner) => TermKind::Path(self.resolve_boxed(inner)),
            S::PathOf(inner) => TermKind::PathOf(self.resolve_boxed(inner)),
            S::Get(inner) => TermKind::Get(self.resolve_boxed(inner)),
            S::Command(command) => TermKind::Command(command.clone()),
            S::Let { binder, init, body } => {
                let init = self.resolve_boxed(init);
                let binder = self.resolve_pattern(binder);
                let depth = self.locals.len();
                self.bind(&binder);
                let body = self.resolve_boxed(body);
                self.locals.truncate(depth);
                TermKind::Let { binder, init, body }
            }
            S::If { scrutinee, branches } => {
                let scrutinee = self.resolve_boxed(scrutinee);
                let mut resolved = Vec::with_capacity(branches.len());
                for (pattern, body) in branches {
                    let pattern = self.resolve_pattern(pattern);
                    let depth = self.locals.len();
                    self.bind(&pattern);
                    let body = self.resolve_term(body);
                    self.locals.truncate(depth);
                    resolved.push((pattern, body));
                }
                TermKind::If {
                    scrutinee,
                    branches: resolved,
                }
            }
            S::Proj { target, projection } => TermKind::Proj {
                target: self.resolve_boxed(target),
                projection: projection.clone(),
            },
            S::Var(name) => self.resolve_name(name, term.span),
            S::Meta => TermKind::Meta,
            S::Hole => TermKind::Hole,
        };
        Term::new(kind, term.span)
    }

    // ── Patterns ──────────────────────────────────────────────────

    fn resolve_patterns(&mut self, patterns: &[surface::Pattern]) -> Vec<Pattern> {
        patterns.iter().map(|p| self.resolve_pattern(p)).collect()
    }

    fn resolve_pattern(&mut self, pattern: &surface::Pattern) -> Pattern {
        use surface::PatternKind as S;

        let kind = match &pattern.kind {
            S::UnitOf => PatternKind::UnitOf,
            S::BoolOf(b) => PatternKind::BoolOf(*b),
            S::I8Of(n) => PatternKind::I8Of(*n),
            S::I16Of(n) => PatternKind::I16Of(*n),
            S::I32Of(n) => PatternKind::I32Of(*n),
            S::I64Of(n) => PatternKind::I64Of(*n),
            S::StrOf(s) => PatternKind::StrOf(s.clone()),
            S::I8ArrayOf(elements) => PatternKind::I8ArrayOf(self.resolve_patterns(elements)),
            S::I32ArrayOf(elements) => PatternKind::I32ArrayOf(self.resolve_patterns(elements)),
            S::I64ArrayOf(elements) => PatternKind::I64ArrayOf(self.resolve_patterns(elements)),
            S::VecOf(elements) => PatternKind::VecOf(self.resolve_patterns(elements)),
            S::StructOf(fields) => {
                let mut resolved = IndexMap::new();
                for (name, span, field) in fields {
                    let field = self.resolve_pattern(field);
                    if resolved.contains_key(name) {
                        self.error(format!("duplicate field `{}`", name), *span);
                    } else {
                        resolved.insert(name.clone(), field);
                    }
                }
                PatternKind::StructOf(resolved)
            }
            S::Var(name) => PatternKind::Var(name.clone()),
            S::Drop => PatternKind::Drop,
            S::Anno { pattern, ty } => PatternKind::Anno {
                pattern: Box::new(self.resolve_pattern(pattern)),
                ty: self.resolve_boxed(ty),
            },
            S::Hole => PatternKind::Hole,
        };
        Pattern::new(kind, pattern.span)
    }
}

use smol_str::SmolStr;

use crate::lexer::{lex, Token};
use crate::surface::*;
use crate::{Diagnostic, ModuleLocation, Span};

/// Parse one module. Never fails: malformed definition forms come back as
/// [`Definition::Hole`] alongside their diagnostics.
pub fn parse(source: &str, name: ModuleLocation) -> (Module, Vec<Diagnostic>) {
    let (tokens, lex_errors) = lex(source);
    let mut parser = Parser::new(tokens, name);
    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .into_iter()
        .map(|span| Diagnostic::error("unexpected character", span))
        .collect();
    let module = parser.parse_module();
    diagnostics.append(&mut parser.diagnostics);
    (module, diagnostics)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    name: ModuleLocation,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>, name: ModuleLocation) -> Self {
        Self {
            tokens,
            pos: 0,
            name,
            diagnostics: Vec::new(),
        }
    }

    // ── Token helpers ─────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| {
                self.tokens
                    .last()
                    .map(|(_, s)| Span::new(s.end, s.end))
                    .unwrap_or(Span::new(0, 0))
            })
    }

    fn advance(&mut self) -> (Token, Span) {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn check_symbol(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Symbol(s)) if s.as_str() == name)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_symbol(&mut self, name: &str) -> bool {
        if self.check_symbol(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Option<Span> {
        if self.check(expected) {
            let (_, span) = self.advance();
            Some(span)
        } else {
            let span = self.peek_span();
            self.error(
                format!("expected {:?}, found {:?}", expected, self.peek()),
                span,
            );
            None
        }
    }

    fn expect_symbol(&mut self) -> Option<(SmolStr, Span)> {
        if let Some(Token::Symbol(_)) = self.peek() {
            let (tok, span) = self.advance();
            if let Token::Symbol(s) = tok {
                return Some((s, span));
            }
        }
        let span = self.peek_span();
        self.error(format!("expected symbol, found {:?}", self.peek()), span);
        None
    }

    fn expect_keyword(&mut self) -> Option<(SmolStr, Span)> {
        if let Some(Token::Keyword(_)) = self.peek() {
            let (tok, span) = self.advance();
            if let Token::Keyword(s) = tok {
                return Some((s, span));
            }
        }
        let span = self.peek_span();
        self.error(
            format!("expected field keyword (:name), found {:?}", self.peek()),
            span,
        );
        None
    }

    fn error(&mut self, message: String, span: Span) {
        self.diagnostics.push(Diagnostic::error(message, span));
    }

    /// Move past the form whose opening delimiter sits at `start`.
    fn skip_form(&mut self, start: usize) {
        let mut depth = 0usize;
        self.pos = start;
        while !self.at_end() {
            match self.peek() {
                Some(Token::LParen | Token::LBracket | Token::LBrace) => depth += 1,
                Some(Token::RParen | Token::RBracket | Token::RBrace) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Whether the parenthesized form at the cursor has a `:` directly
    /// inside it, as in `(x : int)`.
    fn paren_has_colon(&self) -> bool {
        let mut depth = 0usize;
        for (token, _) in &self.tokens[self.pos..] {
            match token {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return false;
                    }
                }
                Token::Colon if depth == 1 => return true,
                _ => {}
            }
        }
        false
    }

    fn last_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    // ── Module parsing ────────────────────────────────────────────

    fn parse_module(&mut self) -> Module {
        let mut module = Module {
            name: self.name.clone(),
            imports: Vec::new(),
            definitions: Vec::new(),
        };

        while !self.at_end() {
            let start_pos = self.pos;
            let start = self.peek_span();
            if !self.eat(&Token::LParen) {
                self.error("expected '(' to start a top-level form".into(), start);
                self.advance();
                continue;
            }

            if self.eat_symbol("import") {
                if self.parse_import(&mut module.imports).is_none() {
                    self.skip_form(start_pos);
                }
            } else if self.eat_symbol("def") {
                match self.parse_def(start) {
                    Some(def) => module.definitions.push(Definition::Def(def)),
                    None => {
                        self.skip_form(start_pos);
                        let span = start.merge(self.last_span());
                        module.definitions.push(Definition::Hole(span));
                    }
                }
            } else {
                let span = self.peek_span();
                self.error(
                    format!("expected top-level form (def, import), found {:?}", self.peek()),
                    span,
                );
                self.skip_form(start_pos);
            }
        }

        module
    }

    // ── import ────────────────────────────────────────────────────

    fn parse_import(&mut self, imports: &mut Vec<(crate::DefinitionLocation, Span)>) -> Option<()> {
        let (path, _) = self.expect_symbol()?;
        let module = ModuleLocation::parse(&path);
        while !self.at_end() && !self.check(&Token::RParen) {
            let (name, span) = self.expect_symbol()?;
            imports.push((module.definition(name), span));
        }
        self.expect(&Token::RParen)?;
        Some(())
    }

    // ── def ───────────────────────────────────────────────────────

    fn parse_def(&mut self, start: Span) -> Option<Def> {
        let (name, name_span) = self.expect_symbol()?;

        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Keyword(_)) => {
                    let (tok, span) = self.advance();
                    if let Token::Keyword(k) = tok {
                        match Modifier::from_name(&k) {
                            Some(modifier) => modifiers.push((modifier, span)),
                            None => self.error(format!("unknown modifier `:{}`", k), span),
                        }
                    }
                }
                Some(Token::Annotation(_)) => {
                    let (tok, span) = self.advance();
                    if let Token::Annotation(a) = tok {
                        match Annotation::from_name(&a) {
                            Some(annotation) => annotations.push((annotation, span)),
                            None => self.error(format!("unknown annotation `@{}`", a), span),
                        }
                    }
                }
                _ => break,
            }
        }

        let doc = if let Some(Token::String(_)) = self.peek() {
            let (tok, _) = self.advance();
            match tok {
                Token::String(s) => s,
                _ => String::new(),
            }
        } else {
            String::new()
        };

        let ty = self.parse_term()?;

        let body = if self.check(&Token::RParen) {
            let span = self.peek_span();
            if !modifiers.iter().any(|(m, _)| *m == Modifier::Builtin) {
                self.error(format!("missing body for `{}`", name), span);
            }
            Term::hole(span)
        } else {
            self.parse_term()?
        };

        let end = self.expect(&Token::RParen)?;
        Some(Def {
            doc,
            annotations,
            modifiers,
            name: self.name.definition(name),
            name_span,
            ty,
            body,
            span: start.merge(end),
        })
    }

    // ── Terms ─────────────────────────────────────────────────────

    fn parse_term(&mut self) -> Option<Term> {
        let start = self.peek_span();
        let kind = match self.peek() {
            Some(Token::LParen) => return self.parse_list_term(),
            Some(Token::LBracket) => {
                self.advance();
                let elements = self.parse_terms_until(&Token::RBracket)?;
                let end = self.expect(&Token::RBracket)?;
                return Some(Term::new(TermKind::VecOf(elements), start.merge(end)));
            }
            Some(Token::LBrace) => {
                self.advance();
                let fields = self.parse_fields_until(&Token::RBrace)?;
                let end = self.expect(&Token::RBrace)?;
                return Some(Term::new(TermKind::StructOf(fields), start.merge(end)));
            }
            Some(Token::Backtick) => {
                self.advance();
                let inner = self.parse_term()?;
                let span = start.merge(inner.span);
                return Some(Term::new(TermKind::CodeOf(Box::new(inner)), span));
            }
            Some(Token::Comma) => {
                self.advance();
                let inner = self.parse_term()?;
                let span = start.merge(inner.span);
                return Some(Term::new(TermKind::Splice(Box::new(inner)), span));
            }
            Some(Token::Byte(n)) => TermKind::I8Of(*n),
            Some(Token::Short(n)) => TermKind::I16Of(*n),
            Some(Token::Int(n)) => TermKind::I32Of(*n),
            Some(Token::Long(n)) => TermKind::I64Of(*n),
            Some(Token::Float(n)) => TermKind::F32Of(*n),
            Some(Token::Double(n)) => TermKind::F64Of(*n),
            Some(Token::String(s)) => TermKind::StrOf(s.clone()),
            Some(Token::True) => TermKind::BoolOf(true),
            Some(Token::False) => TermKind::BoolOf(false),
            Some(Token::Symbol(s)) => atom(s),
            _ => {
                self.error(format!("unexpected token {:?}", self.peek()), start);
                return None;
            }
        };
        self.advance();
        Some(Term::new(kind, start))
    }

    fn parse_terms_until(&mut self, close: &Token) -> Option<Vec<Term>> {
        let mut terms = Vec::new();
        while !self.at_end() && !self.check(close) {
            terms.push(self.parse_term()?);
        }
        Some(terms)
    }

    fn parse_fields_until(&mut self, close: &Token) -> Option<Vec<(SmolStr, Span, Term)>> {
        let mut fields = Vec::new();
        while !self.at_end() && !self.check(close) {
            let (name, span) = self.expect_keyword()?;
            let value = self.parse_term()?;
            fields.push((name, span, value));
        }
        Some(fields)
    }

    fn parse_list_term(&mut self) -> Option<Term> {
        let start = self.expect(&Token::LParen)?;

        if self.check(&Token::RParen) {
            let end = self.expect(&Token::RParen)?;
            return Some(Term::new(TermKind::UnitOf, start.merge(end)));
        }

        if let Some(Token::FieldAccess(_)) = self.peek() {
            let (tok, _) = self.advance();
            let projection = match tok {
                Token::FieldAccess(accessor) => Projection::from_accessor(&accessor),
                _ => return None,
            };
            let target = self.parse_term()?;
            let end = self.expect(&Token::RParen)?;
            return Some(Term::new(
                TermKind::Proj {
                    target: Box::new(target),
                    projection,
                },
                start.merge(end),
            ));
        }

        let head = match self.peek() {
            Some(Token::Symbol(s)) => s.clone(),
            _ => SmolStr::default(),
        };

        let kind = match head.as_str() {
            "type" | "list" | "point" | "code" | "path" | "path_of" | "get" => {
                self.advance();
                let inner = Box::new(self.parse_term()?);
                match head.as_str() {
                    "type" => TermKind::Type(inner),
                    "list" => TermKind::Vec(inner),
                    "point" => TermKind::Point(inner),
                    "code" => TermKind::Code(inner),
                    "path" => TermKind::Path(inner),
                    "path_of" => TermKind::PathOf(inner),
                    _ => TermKind::Get(inner),
                }
            }
            "byte_array_of" => {
                self.advance();
                TermKind::I8ArrayOf(self.parse_terms_until(&Token::RParen)?)
            }
            "int_array_of" => {
                self.advance();
                TermKind::I32ArrayOf(self.parse_terms_until(&Token::RParen)?)
            }
            "long_array_of" => {
                self.advance();
                TermKind::I64ArrayOf(self.parse_terms_until(&Token::RParen)?)
            }
            "union" => {
                self.advance();
                TermKind::Union(self.parse_terms_until(&Token::RParen)?)
            }
            "struct" => {
                self.advance();
                TermKind::Struct(self.parse_fields_until(&Token::RParen)?)
            }
            "->" | "=>" => {
                self.advance();
                self.parse_func_type(head == "=>")?
            }
            "fn" | "open-fn" => {
                self.advance();
                self.expect(&Token::LParen)?;
                let mut params = Vec::new();
                while !self.at_end() && !self.check(&Token::RParen) {
                    params.push(self.parse_pattern()?);
                }
                self.expect(&Token::RParen)?;
                let result = self.parse_term()?;
                TermKind::FuncOf {
                    open: head == "open-fn",
                    params,
                    result: Box::new(result),
                }
            }
            "!" => {
                self.advance();
                let func = self.parse_term()?;
                let args = self.parse_terms_until(&Token::RParen)?;
                TermKind::Apply {
                    open: true,
                    func: Box::new(func),
                    args,
                }
            }
            "command" => {
                self.advance();
                match self.peek() {
                    Some(Token::String(_)) => match self.advance() {
                        (Token::String(s), _) => TermKind::Command(s),
                        _ => return None,
                    },
                    _ => {
                        let span = self.peek_span();
                        self.error("expected command string".into(), span);
                        return None;
                    }
                }
            }
            "let" => {
                self.advance();
                return self.parse_let(start);
            }
            "match" => {
                self.advance();
                let scrutinee = self.parse_term()?;
                let mut branches = Vec::new();
                while !self.at_end() && !self.check(&Token::RParen) {
                    self.expect(&Token::LParen)?;
                    let pattern = self.parse_pattern()?;
                    let body = self.parse_term()?;
                    self.expect(&Token::RParen)?;
                    branches.push((pattern, body));
                }
                TermKind::If {
                    scrutinee: Box::new(scrutinee),
                    branches,
                }
            }
            _ => {
                let func = self.parse_term()?;
                let args = self.parse_terms_until(&Token::RParen)?;
                TermKind::Apply {
                    open: false,
                    func: Box::new(func),
                    args,
                }
            }
        };

        let end = self.expect(&Token::RParen)?;
        Some(Term::new(kind, start.merge(end)))
    }

    /// `(-> (int (x : int)) (result))`: each parameter is either a bare
    /// type or an annotated pattern.
    fn parse_func_type(&mut self, open: bool) -> Option<TermKind> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            if self.check(&Token::LParen) && self.paren_has_colon() {
                self.advance();
                let pattern = self.parse_pattern()?;
                self.expect(&Token::Colon)?;
                let ty = self.parse_term()?;
                self.expect(&Token::RParen)?;
                params.push((pattern, ty));
            } else {
                let ty = self.parse_term()?;
                params.push((Pattern::new(PatternKind::Drop, ty.span), ty));
            }
        }
        self.expect(&Token::RParen)?;
        let result = self.parse_term()?;
        Some(TermKind::Func {
            open,
            params,
            result: Box::new(result),
        })
    }

    /// `(let ((p1 e1) (p2 e2)) body)` nests into one `Let` per binding.
    fn parse_let(&mut self, start: Span) -> Option<Term> {
        self.expect(&Token::LParen)?;
        let mut bindings = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            self.expect(&Token::LParen)?;
            let pattern = self.parse_pattern()?;
            let init = self.parse_term()?;
            self.expect(&Token::RParen)?;
            bindings.push((pattern, init));
        }
        self.expect(&Token::RParen)?;
        let body = self.parse_term()?;
        let end = self.expect(&Token::RParen)?;
        let span = start.merge(end);

        Some(
            bindings
                .into_iter()
                .rev()
                .fold(body, |body, (binder, init)| {
                    Term::new(
                        TermKind::Let {
                            binder,
                            init: Box::new(init),
                            body: Box::new(body),
                        },
                        span,
                    )
                }),
        )
    }

    // ── Patterns ──────────────────────────────────────────────────

    fn parse_pattern(&mut self) -> Option<Pattern> {
        let start = self.peek_span();
        let kind = match self.peek() {
            Some(Token::Symbol(s)) if s == "_" => PatternKind::Drop,
            Some(Token::Symbol(s)) => PatternKind::Var(s.clone()),
            Some(Token::Byte(n)) => PatternKind::I8Of(*n),
            Some(Token::Short(n)) => PatternKind::I16Of(*n),
            Some(Token::Int(n)) => PatternKind::I32Of(*n),
            Some(Token::Long(n)) => PatternKind::I64Of(*n),
            Some(Token::String(s)) => PatternKind::StrOf(s.clone()),
            Some(Token::True) => PatternKind::BoolOf(true),
            Some(Token::False) => PatternKind::BoolOf(false),
            Some(Token::LBracket) => {
                self.advance();
                let elements = self.parse_patterns_until(&Token::RBracket)?;
                let end = self.expect(&Token::RBracket)?;
                return Some(Pattern::new(PatternKind::VecOf(elements), start.merge(end)));
            }
            Some(Token::LBrace) => {
                self.advance();
                let mut fields = Vec::new();
                while !self.at_end() && !self.check(&Token::RBrace) {
                    let (name, span) = self.expect_keyword()?;
                    let pattern = self.parse_pattern()?;
                    fields.push((name, span, pattern));
                }
                let end = self.expect(&Token::RBrace)?;
                return Some(Pattern::new(PatternKind::StructOf(fields), start.merge(end)));
            }
            Some(Token::LParen) => return self.parse_list_pattern(),
            _ => {
                self.error(format!("expected pattern, found {:?}", self.peek()), start);
                return None;
            }
        };
        self.advance();
        Some(Pattern::new(kind, start))
    }

    fn parse_patterns_until(&mut self, close: &Token) -> Option<Vec<Pattern>> {
        let mut patterns = Vec::new();
        while !self.at_end() && !self.check(close) {
            patterns.push(self.parse_pattern()?);
        }
        Some(patterns)
    }

    fn parse_list_pattern(&mut self) -> Option<Pattern> {
        let has_colon = self.paren_has_colon();
        let start = self.expect(&Token::LParen)?;

        if self.check(&Token::RParen) {
            let end = self.expect(&Token::RParen)?;
            return Some(Pattern::new(PatternKind::UnitOf, start.merge(end)));
        }

        let kind = if has_colon {
            let pattern = self.parse_pattern()?;
            self.expect(&Token::Colon)?;
            let ty = self.parse_term()?;
            PatternKind::Anno {
                pattern: Box::new(pattern),
                ty: Box::new(ty),
            }
        } else if self.eat_symbol("byte_array_of") {
            PatternKind::I8ArrayOf(self.parse_patterns_until(&Token::RParen)?)
        } else if self.eat_symbol("int_array_of") {
            PatternKind::I32ArrayOf(self.parse_patterns_until(&Token::RParen)?)
        } else if self.eat_symbol("long_array_of") {
            PatternKind::I64ArrayOf(self.parse_patterns_until(&Token::RParen)?)
        } else {
            let span = self.peek_span();
            self.error(format!("expected pattern, found {:?}", self.peek()), span);
            return None;
        };

        let end = self.expect(&Token::RParen)?;
        Some(Pattern::new(kind, start.merge(end)))
    }
}

fn atom(symbol: &SmolStr) -> TermKind {
    match symbol.as_str() {
        "tag" => TermKind::Tag,
        "unit" => TermKind::Unit,
        "bool" => TermKind::Bool,
        "byte" => TermKind::I8,
        "short" => TermKind::I16,
        "int" => TermKind::I32,
        "long" => TermKind::I64,
        "float" => TermKind::F32,
        "double" => TermKind::F64,
        "string" => TermKind::Str,
        "byte_array" => TermKind::I8Array,
        "int_array" => TermKind::I32Array,
        "long_array" => TermKind::I64Array,
        "_" => TermKind::Meta,
        other => match Repr::from_name(other) {
            Some(repr) => TermKind::TagOf(repr),
            None => TermKind::Var(symbol.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Module {
        let (module, diagnostics) = parse(source, ModuleLocation::new(["test"]));
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        module
    }

    fn only_def(module: &Module) -> &Def {
        match module.definitions.as_slice() {
            [Definition::Def(def)] => def,
            other => panic!("expected one definition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_def_with_modifiers() {
        let module = parse_ok("(def answer :inline @deprecated \"The answer.\" int 42)");
        let def = only_def(&module);
        assert_eq!(def.name.to_string(), "test::answer");
        assert_eq!(def.doc, "The answer.");
        assert!(def.has_modifier(Modifier::Inline));
        assert_eq!(def.annotations[0].0, Annotation::Deprecated);
        assert_eq!(def.ty.kind, TermKind::I32);
        assert_eq!(def.body.kind, TermKind::I32Of(42));
    }

    #[test]
    fn test_parse_builtin_without_body() {
        let module = parse_ok("(def int_add :builtin (-> (int int) int))");
        let def = only_def(&module);
        assert_eq!(def.body.kind, TermKind::Hole);
        match &def.ty.kind {
            TermKind::Func { open, params, .. } => {
                assert!(!open);
                assert_eq!(params.len(), 2);
                assert_eq!(params[0].0.kind, PatternKind::Drop);
            }
            other => panic!("expected function type, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_body_is_error() {
        let (module, diagnostics) = parse("(def x int)", ModuleLocation::new(["test"]));
        assert_eq!(diagnostics.len(), 1);
        insta::assert_snapshot!(diagnostics[0].to_string(), @"10:11: missing body for `x`");
        assert!(matches!(only_def(&module).body.kind, TermKind::Hole));
    }

    #[test]
    fn test_parse_imports() {
        let module = parse_ok("(import std/list map filter)");
        let names: Vec<String> = module.imports.iter().map(|(l, _)| l.to_string()).collect();
        assert_eq!(names, vec!["std/list::map", "std/list::filter"]);
    }

    #[test]
    fn test_dependent_func_type() {
        let module = parse_ok("(def id (-> ((a : (type int_tag)) (x : a)) a) (fn (a x) x))");
        let def = only_def(&module);
        match &def.ty.kind {
            TermKind::Func { params, .. } => {
                assert_eq!(params[0].0.kind, PatternKind::Var("a".into()));
                assert!(matches!(params[0].1.kind, TermKind::Type(_)));
                assert_eq!(params[1].1.kind, TermKind::Var("a".into()));
            }
            other => panic!("expected function type, got {:?}", other),
        }
        assert!(matches!(def.body.kind, TermKind::FuncOf { open: false, .. }));
    }

    #[test]
    fn test_let_nests() {
        let module = parse_ok("(def x int (let ((a 1) (b a)) b))");
        let def = only_def(&module);
        let TermKind::Let { binder, body, .. } = &def.body.kind else {
            panic!("expected let");
        };
        assert_eq!(binder.kind, PatternKind::Var("a".into()));
        assert!(matches!(body.kind, TermKind::Let { .. }));
    }

    #[test]
    fn test_match_becomes_if() {
        let module = parse_ok("(def x int (match 1 (0 10) ((n : int) n) (_ 0)))");
        let def = only_def(&module);
        let TermKind::If { branches, .. } = &def.body.kind else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0].0.kind, PatternKind::I32Of(0));
        assert!(matches!(branches[1].0.kind, PatternKind::Anno { .. }));
        assert_eq!(branches[2].0.kind, PatternKind::Drop);
    }

    #[test]
    fn test_compound_terms() {
        let module = parse_ok(
            "(def x _ [{:a 1b :b \"s\"} (.a {:a 2b}) (! f `1 ,q) (byte_array_of 1b 2b) (path_of (get p))])",
        );
        let def = only_def(&module);
        assert_eq!(def.ty.kind, TermKind::Meta);
        let TermKind::VecOf(elements) = &def.body.kind else {
            panic!("expected list literal");
        };
        assert!(matches!(elements[0].kind, TermKind::StructOf(ref fields) if fields.len() == 2));
        assert!(matches!(
            elements[1].kind,
            TermKind::Proj { projection: Projection::Field(ref name), .. } if name == "a"
        ));
        assert!(matches!(elements[2].kind, TermKind::Apply { open: true, ref args, .. } if args.len() == 2));
        assert!(matches!(elements[3].kind, TermKind::I8ArrayOf(ref es) if es.len() == 2));
        assert!(matches!(elements[4].kind, TermKind::PathOf(_)));
    }

    #[test]
    fn test_tags_and_unit() {
        let module = parse_ok("(def t tag int_tag) (def u unit ())");
        let defs: Vec<&Def> = module
            .definitions
            .iter()
            .filter_map(|d| match d {
                Definition::Def(def) => Some(def),
                Definition::Hole(_) => None,
            })
            .collect();
        assert_eq!(defs[0].body.kind, TermKind::TagOf(Repr::Int));
        assert_eq!(defs[1].body.kind, TermKind::UnitOf);
    }

    #[test]
    fn test_broken_def_becomes_hole() {
        let (module, diagnostics) = parse(
            "(def a int (fn 1 2)) (def b int 2)",
            ModuleLocation::new(["test"]),
        );
        assert!(!diagnostics.is_empty());
        assert_eq!(module.definitions.len(), 2);
        assert!(matches!(module.definitions[0], Definition::Hole(_)));
        assert!(matches!(module.definitions[1], Definition::Def(ref d) if d.name.name == "b"));
    }

    #[test]
    fn test_unknown_top_level_form() {
        let (module, diagnostics) = parse("(frob 1 2) (def b int 2)", ModuleLocation::new(["test"]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(module.definitions.len(), 1);
    }
}

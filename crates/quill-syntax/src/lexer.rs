use logos::Logos;
use smol_str::SmolStr;

use crate::Span;

fn parse_string(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut result = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                'r' => result.push('\r'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                '0' => result.push('\0'),
                other => {
                    result.push('\\');
                    result.push(other);
                }
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// Strip a one-character width suffix (`b`, `s`, `l`, `f`) and parse the rest.
fn parse_suffixed<T: std::str::FromStr>(lex: &mut logos::Lexer<Token>) -> Option<T> {
    let slice = lex.slice();
    slice[..slice.len() - 1].parse().ok()
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
    #[token("`")]
    Backtick,
    #[token(",")]
    Comma,

    #[regex(r"-?[0-9]+b", priority = 3, callback = parse_suffixed::<i8>)]
    Byte(i8),

    #[regex(r"-?[0-9]+s", priority = 3, callback = parse_suffixed::<i16>)]
    Short(i16),

    #[regex(r"-?[0-9]+", priority = 2, callback = |lex| lex.slice().parse::<i32>().ok())]
    Int(i32),

    #[regex(r"-?[0-9]+l", priority = 3, callback = parse_suffixed::<i64>)]
    Long(i64),

    #[regex(r"-?[0-9]+\.[0-9]+f", priority = 3, callback = parse_suffixed::<f32>)]
    Float(f32),

    #[regex(r"-?[0-9]+\.[0-9]+", priority = 3, callback = |lex| lex.slice().parse::<f64>().ok())]
    Double(f64),

    #[regex(r#""([^"\\]|\\.)*""#, callback = parse_string)]
    String(String),

    #[token("true")]
    True,
    #[token("false")]
    False,

    /// Keyword literal: `:inline`, `:x`
    #[regex(r":[a-zA-Z_][a-zA-Z0-9_\-!?]*", callback = |lex| SmolStr::new(&lex.slice()[1..]))]
    Keyword(SmolStr),

    /// Definition annotation: `@deprecated`
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_\-]*", callback = |lex| SmolStr::new(&lex.slice()[1..]))]
    Annotation(SmolStr),

    /// Projection: `.field`, `.0`
    #[regex(r"\.[a-zA-Z0-9_][a-zA-Z0-9_\-]*", callback = |lex| SmolStr::new(&lex.slice()[1..]))]
    FieldAccess(SmolStr),

    /// Symbol (identifiers, operators and module paths): `foo`, `->`, `std/list`
    #[regex(r"[a-zA-Z_+\-*/<>=!&|^~][a-zA-Z0-9_+\-*/<>=!&|^~.?]*", priority = 1, callback = |lex| SmolStr::new(lex.slice()))]
    Symbol(SmolStr),
}

/// Lex source code into a list of (token, span) pairs.
pub fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<Span>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u32, range.end as u32);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => errors.push(span),
        }
    }

    (tokens, errors)
}

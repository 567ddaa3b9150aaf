use std::path::Path;

use quill_syntax::lexer::{lex, Token};
use quill_syntax::Span;

use crate::error::ManifestError;

/// A dependency extracted under `<deps_root>/<owner>/<repository>/<tag>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub owner: String,
    pub repository: String,
    pub tag: String,
}

/// Parsed `quill.pkg` manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub dependencies: Vec<Dependency>,
}

/// Parse the text of a `quill.pkg` manifest.
///
/// `manifest_path` only appears in error messages.
pub fn parse_manifest(source: &str, manifest_path: &Path) -> Result<Manifest, ManifestError> {
    let (tokens, lex_errors) = lex(source);
    if let Some(span) = lex_errors.first() {
        return Err(ManifestError::Parse(format!(
            "unexpected character at {} in {}",
            span.start,
            manifest_path.display()
        )));
    }

    let mut cursor = Cursor {
        tokens: &tokens,
        pos: 0,
    };
    cursor.open("package")?;
    cursor.keyword("package")?;

    let mut name = None;
    let mut version = None;
    let mut dependencies = Vec::new();

    while !cursor.at_close() {
        cursor.open("field")?;
        match cursor.symbol()?.as_str() {
            "name" => name = Some(cursor.string()?),
            "version" => version = Some(cursor.string()?),
            "deps" => {
                while !cursor.at_close() {
                    cursor.open("dep")?;
                    cursor.keyword("dep")?;
                    dependencies.push(Dependency {
                        owner: cursor.string()?,
                        repository: cursor.string()?,
                        tag: cursor.string()?,
                    });
                    cursor.close("dep")?;
                }
            }
            other => {
                return Err(ManifestError::Parse(format!("unknown field `{}`", other)));
            }
        }
        cursor.close("field")?;
    }
    cursor.close("package")?;

    Ok(Manifest {
        name: name.ok_or_else(|| ManifestError::MissingField("name".into()))?,
        version: version.ok_or_else(|| ManifestError::MissingField("version".into()))?,
        dependencies,
    })
}

/// Token cursor over a lexed manifest.
struct Cursor<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self, expected: &str) -> Result<&'a Token, ManifestError> {
        let tokens = self.tokens;
        match tokens.get(self.pos) {
            Some((token, _)) => {
                self.pos += 1;
                Ok(token)
            }
            None => Err(ManifestError::Parse(format!(
                "expected {} (unexpected end of input)",
                expected
            ))),
        }
    }

    fn unexpected(&self, expected: &str, token: &Token) -> ManifestError {
        let at = self.tokens.get(self.pos - 1).map_or(0, |(_, span)| span.start);
        ManifestError::Parse(format!("expected {} at {}, got {:?}", expected, at, token))
    }

    /// End of the current list, or of the input.
    fn at_close(&self) -> bool {
        matches!(self.tokens.get(self.pos), None | Some((Token::RParen, _)))
    }

    fn open(&mut self, form: &str) -> Result<(), ManifestError> {
        let expected = format!("`(` to open {}", form);
        match self.next(&expected)? {
            Token::LParen => Ok(()),
            other => Err(self.unexpected(&expected, other)),
        }
    }

    fn close(&mut self, form: &str) -> Result<(), ManifestError> {
        let expected = format!("`)` to close {}", form);
        match self.next(&expected)? {
            Token::RParen => Ok(()),
            other => Err(self.unexpected(&expected, other)),
        }
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), ManifestError> {
        let expected = format!("`{}`", keyword);
        match self.next(&expected)? {
            Token::Symbol(symbol) if symbol.as_str() == keyword => Ok(()),
            other => Err(self.unexpected(&expected, other)),
        }
    }

    fn symbol(&mut self) -> Result<String, ManifestError> {
        match self.next("symbol")? {
            Token::Symbol(symbol) => Ok(symbol.to_string()),
            other => Err(self.unexpected("symbol", other)),
        }
    }

    fn string(&mut self) -> Result<String, ManifestError> {
        match self.next("string")? {
            Token::String(string) => Ok(string.clone()),
            other => Err(self.unexpected("string", other)),
        }
    }
}

use std::fmt;

use smol_str::SmolStr;

/// Source span as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Inclusive on both ends, so a cursor sitting just past the last
    /// character still counts as inside.
    pub fn contains(self, offset: u32) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn overlaps(self, other: Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn len(self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// Path of a module, e.g. `std/list`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleLocation {
    pub parts: Vec<SmolStr>,
}

impl ModuleLocation {
    pub fn new<S: Into<SmolStr>>(parts: impl IntoIterator<Item = S>) -> Self {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a slash-separated module path. Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/').filter(|part| !part.is_empty()))
    }

    pub fn prelude() -> Self {
        Self::new(["prelude"])
    }

    pub fn definition(&self, name: impl Into<SmolStr>) -> DefinitionLocation {
        DefinitionLocation {
            module: self.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// A top-level definition, addressed by its module and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefinitionLocation {
    pub module: ModuleLocation,
    pub name: SmolStr,
}

impl fmt::Display for DefinitionLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// A position inside some module's source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub module: ModuleLocation,
    pub span: Span,
}

/// Editor request translated to byte offsets of one module's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Hover(u32),
    Definition(u32),
    InlayHints(Span),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_location_display() {
        let location = ModuleLocation::parse("std/list");
        assert_eq!(location.parts, vec!["std", "list"]);
        assert_eq!(location.to_string(), "std/list");
        assert_eq!(location.definition("map").to_string(), "std/list::map");
    }

    #[test]
    fn parse_drops_empty_segments() {
        assert_eq!(ModuleLocation::parse("/a//b/"), ModuleLocation::new(["a", "b"]));
    }

    #[test]
    fn span_contains_is_inclusive() {
        let span = Span::new(4, 8);
        assert!(span.contains(4));
        assert!(span.contains(8));
        assert!(!span.contains(9));
        assert!(span.overlaps(Span::new(8, 12)));
        assert!(!span.overlaps(Span::new(9, 12)));
    }
}

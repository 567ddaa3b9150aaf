use la_arena::{Arena, Idx, RawIdx};
use quill_syntax::Span;

use crate::value::{Lazy, Value};

pub type MetaId = Idx<MetaEntry>;

pub fn meta_number(id: MetaId) -> u32 {
    u32::from(id.into_raw())
}

/// One metavariable: where it was created, its type, and its solution once
/// unification finds one.
#[derive(Debug)]
pub struct MetaEntry {
    pub span: Span,
    pub ty: Lazy,
    pub solution: Option<Value>,
    /// Set when unification tried to solve this meta with a value
    /// mentioning itself. The stored solution is then a hole.
    pub cyclic: bool,
}

/// Metavariables of a single elaboration run. Never shared across runs.
#[derive(Debug, Default)]
pub struct Metas {
    entries: Arena<MetaEntry>,
}

impl Metas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, span: Span, ty: Value) -> MetaId {
        self.entries.alloc(MetaEntry {
            span,
            ty: Lazy::new(ty),
            solution: None,
            cyclic: false,
        })
    }

    /// Ids minted by another table are treated as unknown.
    pub fn get(&self, id: MetaId) -> Option<&MetaEntry> {
        if (meta_number(id) as usize) < self.entries.len() {
            Some(&self.entries[id])
        } else {
            None
        }
    }

    pub fn solution(&self, id: MetaId) -> Option<Value> {
        self.get(id).and_then(|entry| entry.solution.clone())
    }

    /// Record a solution. Only unsolved metas are ever passed in.
    pub fn solve(&mut self, id: MetaId, value: Value) {
        if (meta_number(id) as usize) < self.entries.len() {
            self.entries[id].solution = Some(value);
        }
    }

    /// Give up on a meta whose only solution would be infinite.
    pub fn solve_cyclic(&mut self, id: MetaId) {
        if (meta_number(id) as usize) < self.entries.len() {
            let entry = &mut self.entries[id];
            entry.solution = Some(Value::Hole);
            entry.cyclic = true;
        }
    }

    pub fn is_cyclic(&self, id: MetaId) -> bool {
        self.get(id).is_some_and(|entry| entry.cyclic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    pub fn unsolved(&self) -> impl Iterator<Item = MetaId> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.solution.is_none())
            .map(|(id, _)| id)
    }
}

/// Rebuild an id from its number, as printed in `?N`.
pub fn meta_id(number: u32) -> MetaId {
    Idx::from_raw(RawIdx::from(number))
}

//! Editor point queries on top of the build engine.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tower_lsp::lsp_types::{
    Hover, HoverContents, InlayHint, InlayHintKind, InlayHintLabel, MarkupContent, MarkupKind,
    Position, Range,
};

use quill_syntax::{ModuleLocation, Query, SourceLocation};

use crate::build::{Build, Generation};
use crate::document::LineIndex;
use crate::error::BuildError;

/// A point query riding along with a Resolved or Elaborated fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Hover(Position),
    Definition(Position),
    InlayHint(Range),
}

impl Instruction {
    pub fn to_query(self, line_index: &LineIndex) -> Query {
        match self {
            Instruction::Hover(position) => Query::Hover(line_index.position_to_offset(position)),
            Instruction::Definition(position) => {
                Query::Definition(line_index.position_to_offset(position))
            }
            Instruction::InlayHint(range) => Query::InlayHints(line_index.range_to_span(range)),
        }
    }
}

/// Hover contents, rendered only when the editor actually shows them.
#[derive(Clone)]
pub struct HoverProducer {
    pub range: Range,
    render: Arc<dyn Fn() -> MarkupContent + Send + Sync>,
}

impl HoverProducer {
    pub(crate) fn new(hover: quill_core::Hover, line_index: &LineIndex) -> Self {
        let range = line_index.span_to_range(hover.span);
        let quill_core::Hover { ty, doc, .. } = hover;
        let ty = Arc::new(ty);
        Self {
            range,
            render: Arc::new(move || {
                let mut value = quill_core::markdown(&ty);
                if let Some(doc) = &doc {
                    value.push_str("\n\n");
                    value.push_str(doc);
                }
                MarkupContent {
                    kind: MarkupKind::Markdown,
                    value,
                }
            }),
        }
    }

    pub fn render(&self) -> Hover {
        Hover {
            contents: HoverContents::Markup((self.render)()),
            range: Some(self.range),
        }
    }
}

impl fmt::Debug for HoverProducer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HoverProducer").field("range", &self.range).finish()
    }
}

pub(crate) fn inlay_hint(line_index: &LineIndex, hint: &quill_core::InlayHint) -> InlayHint {
    InlayHint {
        position: line_index.offset_to_position(hint.offset),
        label: InlayHintLabel::String(hint.label.clone()),
        kind: Some(InlayHintKind::TYPE),
        text_edits: None,
        tooltip: None,
        padding_left: None,
        padding_right: None,
        data: None,
    }
}

impl Build {
    /// Type and doc of the innermost term at `position`.
    ///
    /// The returned future reports `None` when `location` is edited or
    /// closed between this call and its completion.
    pub fn hover(
        self: &Arc<Self>,
        location: ModuleLocation,
        position: Position,
    ) -> impl Future<Output = Option<Hover>> + Send + 'static {
        let build = Arc::clone(self);
        let generation = build.generation(&location);
        async move {
            let fetched = build
                .fetch_elaborated(location.clone(), Some(Instruction::Hover(position)))
                .await;
            let trace = build.unless_stale(&location, &generation, fetched)?;
            trace.value.hover.as_ref().map(HoverProducer::render)
        }
    }

    pub fn definition(
        self: &Arc<Self>,
        location: ModuleLocation,
        position: Position,
    ) -> impl Future<Output = Option<SourceLocation>> + Send + 'static {
        let build = Arc::clone(self);
        let generation = build.generation(&location);
        async move {
            let fetched = build
                .fetch_elaborated(location.clone(), Some(Instruction::Definition(position)))
                .await;
            let trace = build.unless_stale(&location, &generation, fetched)?;
            trace.value.definition.clone()
        }
    }

    pub fn inlay_hints(
        self: &Arc<Self>,
        location: ModuleLocation,
        range: Range,
    ) -> impl Future<Output = Vec<InlayHint>> + Send + 'static {
        let build = Arc::clone(self);
        let generation = build.generation(&location);
        async move {
            let fetched = build
                .fetch_elaborated(location.clone(), Some(Instruction::InlayHint(range)))
                .await;
            match build.unless_stale(&location, &generation, fetched) {
                Some(trace) => trace.value.inlay_hints.clone(),
                None => Vec::new(),
            }
        }
    }

    fn unless_stale<T>(
        &self,
        location: &ModuleLocation,
        generation: &Generation,
        fetched: Result<T, BuildError>,
    ) -> Option<T> {
        match fetched {
            Err(err) => {
                tracing::debug!(module = %location, %err, "query failed");
                None
            }
            Ok(_) if !generation.is_current() => {
                tracing::debug!(module = %location, "query outlived its document");
                None
            }
            Ok(value) => Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_syntax::Span;

    #[test]
    fn instructions_become_offsets() {
        let idx = LineIndex::new("(def x int 1)\n(def y int x)");
        assert_eq!(
            Instruction::Hover(Position::new(1, 11)).to_query(&idx),
            Query::Hover(25)
        );
        assert_eq!(
            Instruction::InlayHint(Range::new(Position::new(0, 0), Position::new(1, 0))).to_query(&idx),
            Query::InlayHints(Span::new(0, 14))
        );
    }

    #[test]
    fn hover_renders_type_and_doc() {
        let idx = LineIndex::new("(def x \"the answer\" int 42)");
        let producer = HoverProducer::new(
            quill_core::Hover {
                span: Span::new(5, 6),
                ty: quill_core::Term::I32,
                doc: Some("the answer".into()),
            },
            &idx,
        );
        let hover = producer.render();
        assert_eq!(hover.range, Some(Range::new(Position::new(0, 5), Position::new(0, 6))));
        let HoverContents::Markup(markup) = hover.contents else {
            panic!("expected markup");
        };
        insta::assert_snapshot!(markup.value, @r"
        ```quill
        int
        ```

        the answer
        ");
    }
}

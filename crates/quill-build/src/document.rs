use tower_lsp::lsp_types::{self, DiagnosticSeverity, Position, Range};

use quill_syntax::{Diagnostic, Severity, Span};

/// Maps between byte offsets (used by Quill spans) and LSP positions (line/character).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        LineIndex {
            line_starts,
            len: text.len() as u32,
        }
    }

    pub fn offset_to_position(&self, offset: u32) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next_line) => next_line - 1,
        };
        let line_start = self.line_starts[line];
        Position {
            line: line as u32,
            character: offset - line_start,
        }
    }

    /// Positions past the end of the text clamp to its length.
    pub fn position_to_offset(&self, position: Position) -> u32 {
        match self.line_starts.get(position.line as usize) {
            Some(start) => start.saturating_add(position.character).min(self.len),
            None => self.len,
        }
    }

    pub fn span_to_range(&self, span: Span) -> Range {
        Range {
            start: self.offset_to_position(span.start),
            end: self.offset_to_position(span.end),
        }
    }

    pub fn range_to_span(&self, range: Range) -> Span {
        Span::new(
            self.position_to_offset(range.start),
            self.position_to_offset(range.end),
        )
    }
}

pub fn to_lsp_diagnostic(line_index: &LineIndex, diagnostic: &Diagnostic) -> lsp_types::Diagnostic {
    let severity = match diagnostic.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    };
    lsp_types::Diagnostic {
        range: line_index.span_to_range(diagnostic.span),
        severity: Some(severity),
        source: Some("quill".into()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

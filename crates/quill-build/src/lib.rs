//! Incremental, content-hashed build of Quill modules, plus the editor
//! queries and build report layered on top of it.

pub mod build;
pub mod config;
pub mod document;
pub mod error;
pub mod ide;
pub mod manifest;
pub mod read;
pub mod report;
mod trace;

pub use build::{Build, Elaborated, Fetch, Generation, Parsed, Read, Resolved, Stats};
pub use config::Config;
pub use document::{to_lsp_diagnostic, LineIndex};
pub use error::{BuildError, ManifestError, Stage};
pub use ide::{HoverProducer, Instruction};
pub use manifest::{parse_manifest, Dependency, Manifest};
pub use report::{Failure, Report};
pub use trace::Trace;

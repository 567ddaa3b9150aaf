use std::path::PathBuf;

use quill_syntax::ModuleLocation;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("I/O error: {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest parse error: {0}")]
    Parse(String),

    #[error("missing required field `{0}` in manifest")]
    MissingField(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A phase function panicked. Only the fetch that ran it fails; the
    /// cached trace for its key is left as it was.
    #[error("{stage} of `{module}` aborted")]
    Aborted {
        module: ModuleLocation,
        stage: Stage,
    },

    #[error("{stage} of `{module}` was cancelled")]
    Cancelled {
        module: ModuleLocation,
        stage: Stage,
    },
}

impl BuildError {
    pub(crate) fn from_join(error: tokio::task::JoinError, module: ModuleLocation, stage: Stage) -> Self {
        if error.is_panic() {
            tracing::warn!(%module, %stage, "phase panicked");
            BuildError::Aborted { module, stage }
        } else {
            BuildError::Cancelled { module, stage }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Read,
    Parsed,
    Resolved,
    Elaborated,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Parsed => "parse",
            Stage::Resolved => "resolve",
            Stage::Elaborated => "elaboration",
        };
        write!(f, "{}", name)
    }
}

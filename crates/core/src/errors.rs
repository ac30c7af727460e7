use std::path::PathBuf;

use thiserror::Error;

/// Registry-contract violations are programmer errors and surface to the
/// caller; a bound implementation's own failure is propagated unchanged
/// inside `Failed`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: `{0}`")]
    NotFound(String),
    #[error("tool `{0}` is registered but has no bound implementation")]
    Unbound(String),
    #[error("tool `{name}` failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ToolError {
    pub fn failed(name: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Failed { name: name.into(), source }
    }
}

/// Store failures are reported but never fatal for a turn: the in-memory log
/// keeps the full history when a persist fails.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("could not persist interaction log to `{path}`: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize interaction log: {0}")]
    Serialize(#[from] serde_json::Error),
}

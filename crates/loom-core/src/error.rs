//! Error types for loom-core.

use thiserror::Error;

/// Result type for loom-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in loom-core.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema is malformed or incomplete (missing pages, unresolved tree id, ...).
    #[error("invalid schema: {0}")]
    Validation(String),

    /// The schema document is not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// A submission is missing required fields.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// A scaffold template could not be rendered.
    #[error("template error in {path}: {message}")]
    Template { path: String, message: String },

    /// The external bundler failed or could not be started.
    #[error("external build failed: {0}")]
    ExternalTool(String),

    /// The bundler finished but the expected entry artifact is missing.
    #[error("artifact missing: {0}")]
    Artifact(String),

    /// Uploading to the artifact store failed.
    #[error("publish failed: {0}")]
    Publish(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IPC communication error with a worker process.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// The worker reported an explicit failure.
    #[error("build worker failed: {message}")]
    WorkerFailed { message: String },

    /// The worker exited without sending a terminal message.
    #[error("build worker exited unexpectedly{}", status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    WorkerCrashed { status: Option<i32> },

    /// A bounded operation ran out of time.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl Error {
    /// Render the error with a short recovery hint, for CLI output.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Self::Validation(_) => {
                Some("every page needs a treeId that matches a componentsTree id with children")
            }
            Self::Parse(_) => Some("check that the schema file is valid JSON"),
            Self::InvalidJob(_) => Some("pass both --build-id and --template"),
            Self::ExternalTool(_) | Self::Artifact(_) => {
                Some("inspect the build log; the bundler output is captured there")
            }
            Self::Ipc(_) | Self::WorkerCrashed { .. } => {
                Some("set LOOM_WORKER_PATH or make sure loom-worker is on PATH")
            }
            Self::Timeout(_) => Some("raise LOOM_BUILD_TIMEOUT_SECS if the build is expected to be slow"),
            _ => None,
        };
        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

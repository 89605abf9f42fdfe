//! Error types for rbsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use crate::host::HostError;
use crate::state_store::StateError;

/// Fatal errors: any of these aborts a run before the checkpoint moves.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A repository lookup the run cannot proceed without failed.
    #[error("upstream unavailable while {step}: {source}")]
    Upstream {
        step: &'static str,
        #[source]
        source: HostError,
    },

    /// The state store holds no checkpoint and none was supplied.
    #[error("no synced commit recorded under '{key}'; seed one or pass an explicit start commit")]
    NoPreviousReference { key: String },

    /// Reading the checkpoint failed.
    #[error("state store error: {0}")]
    State(#[from] StateError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (report file).
    #[error("report JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Upstream`].
pub(crate) fn upstream(step: &'static str, source: HostError) -> SyncError {
    SyncError::Upstream { step, source }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

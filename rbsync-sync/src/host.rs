//! Collaborator seams: the repository host and the automation host.
//!
//! Both are blocking. Implementations map their transport's "404" onto
//! [`HostError::NotFound`] so the procedure can tell an absent resource from a
//! broken call.

use thiserror::Error;

use rbsync_core::{CommitSha, FileChange, Runbook, RunbookName, Tags};

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The host answered with a non-success status.
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl HostError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound(_))
    }
}

/// Result of an idempotent delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Read access to the watched repository.
pub trait RepositoryHost {
    /// Latest commit on `branch`.
    fn head_commit(&self, branch: &str) -> Result<CommitSha, HostError>;

    /// Path-level changes between two commits, in host order.
    fn compare(&self, from: &CommitSha, to: &CommitSha) -> Result<Vec<FileChange>, HostError>;

    /// Decoded text of `path` at `reference`.
    fn file_content(&self, path: &str, reference: &CommitSha) -> Result<String, HostError>;
}

/// Runbook management in the automation account.
pub trait AutomationHost {
    /// `Ok(None)` when the runbook does not exist.
    fn get_runbook(&self, name: &RunbookName) -> Result<Option<Runbook>, HostError>;

    fn delete_runbook(&self, name: &RunbookName) -> Result<DeleteOutcome, HostError>;

    /// Create or replace the runbook with `content` and publish it. Existing
    /// tags are not preserved.
    fn import_runbook(&self, name: &RunbookName, content: &str) -> Result<(), HostError>;

    fn set_tags(&self, name: &RunbookName, tags: &Tags) -> Result<(), HostError>;
}

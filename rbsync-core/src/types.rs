//! Domain types shared by the sync engine, the HTTP clients and the CLI.
//!
//! Identifiers are newtypes over `String` so a commit SHA can never be passed
//! where a runbook name is expected.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A commit identifier in the watched repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitSha(pub String);

impl CommitSha {
    /// First 8 characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommitSha {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitSha {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The name of a runbook in the automation account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunbookName(pub String);

impl RunbookName {
    /// Derive the runbook name for a repository path: the file name without
    /// its extension. Directories are ignored, so `a/Deploy.ps1` and
    /// `b/Deploy.ps1` map to the same runbook.
    pub fn from_path(path: &str) -> Option<Self> {
        let stem = Path::new(path).file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.to_owned()))
    }
}

impl fmt::Display for RunbookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RunbookName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunbookName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Runbook metadata tags. Ordered so reports and request bodies are stable.
pub type Tags = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One path-level entry of a compare between two commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub is_deleted: bool,
}

impl FileChange {
    pub fn modified(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_deleted: false,
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_deleted: true,
        }
    }
}

/// What the automation host reports about an existing runbook.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Runbook {
    pub name: RunbookName,
    #[serde(default)]
    pub tags: Tags,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

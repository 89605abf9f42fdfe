//! Per-file outcomes and the aggregate run report.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rbsync_core::{CommitSha, RunbookName};

use crate::error::{io_err, SyncError};
use crate::state_store::write_atomic;

/// What happened to the tags of a replaced runbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TagRestore {
    /// No prior runbook, or it carried no tags.
    NotNeeded,
    Restored { count: usize },
    Failed { reason: String },
}

/// Result of applying one file change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FileResult {
    Deleted,
    /// Delete requested but the runbook did not exist.
    AlreadyAbsent,
    Imported {
        /// A runbook with this name existed before the import.
        replaced: bool,
        tags: TagRestore,
    },
    WouldDelete,
    WouldImport {
        replaced: bool,
    },
    /// No remote action was attempted.
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

impl FileResult {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileResult::Failed { .. }
                | FileResult::Imported {
                    tags: TagRestore::Failed { .. },
                    ..
                }
        )
    }

    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            FileResult::Deleted | FileResult::AlreadyAbsent | FileResult::Imported { .. }
        )
    }
}

/// One entry per diffed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runbook: Option<RunbookName>,
    #[serde(flatten)]
    pub result: FileResult,
}

/// Aggregate result of a completed (non-fatal) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub previous: CommitSha,
    pub current: CommitSha,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<FileOutcome>,
    /// `false` in dry-run mode or when writing the checkpoint failed.
    pub state_persisted: bool,
}

impl SyncReport {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_applied()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, FileResult::Skipped { .. }))
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || (!self.dry_run && !self.state_persisted)
    }

    /// Persist as JSON (atomic `.tmp` + rename).
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes()).map_err(|(path, e)| io_err(path, e))
    }

    /// Load a previously saved report; `Ok(None)` if there is none yet.
    pub fn load(path: &Path) -> Result<Option<SyncReport>, SyncError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

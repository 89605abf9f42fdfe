//! The sync procedure.
//!
//! ## Steps
//!
//! 1. Read the previous checkpoint (or take the explicit override).
//! 2. Resolve the branch head.
//! 3. Compare previous → head.
//! 4. Apply each matching change: delete the runbook, or fetch the script and
//!    re-import it, restoring the tags the old runbook carried.
//! 5. Store the head as the new checkpoint.
//!
//! Steps 1–3 are fatal on failure and leave the checkpoint untouched. Step 4
//! records failures per file and moves on. A failure in step 5 is logged and
//! reported, never raised; every per-file action is idempotent, so the next
//! run simply replays the same diff.

use chrono::Utc;

use rbsync_core::{CommitSha, FileChange, RunbookName, SyncConfig};

use crate::error::{upstream, SyncError};
use crate::filter::ScriptFilter;
use crate::host::{AutomationHost, DeleteOutcome, RepositoryHost};
use crate::report::{FileOutcome, FileResult, SyncReport, TagRestore};
use crate::state_store::StateStore;

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Branch whose head is mirrored.
    pub branch: String,
    /// State-store key holding the last synced commit.
    pub state_key: String,
    pub filter: ScriptFilter,
    /// Read everything, change nothing.
    pub dry_run: bool,
    /// Use this commit instead of the stored checkpoint.
    pub from: Option<CommitSha>,
}

impl SyncOptions {
    /// Options for a regular run of `config`.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            branch: config.gitlab.branch.clone(),
            state_key: config.state.variable.clone(),
            filter: ScriptFilter::new(&config.filter.extension),
            dry_run: false,
            from: None,
        }
    }
}

/// Run one synchronization pass.
///
/// Returns `Err` only for fatal conditions; per-file problems are in the
/// returned [`SyncReport`].
pub fn run(
    repo: &dyn RepositoryHost,
    automation: &dyn AutomationHost,
    state: &mut dyn StateStore,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let started_at = Utc::now();

    let previous = match &options.from {
        Some(sha) => sha.clone(),
        None => match state.get(&options.state_key) {
            Ok(Some(sha)) if !sha.trim().is_empty() => CommitSha::from(sha.trim()),
            Ok(_) => {
                tracing::error!("no checkpoint stored under '{}'", options.state_key);
                return Err(SyncError::NoPreviousReference {
                    key: options.state_key.clone(),
                });
            }
            Err(err) => {
                tracing::error!("failed to read checkpoint '{}': {err}", options.state_key);
                return Err(err.into());
            }
        },
    };

    let current = repo.head_commit(&options.branch).map_err(|err| {
        tracing::error!("failed to resolve head of '{}': {err}", options.branch);
        upstream("resolving branch head", err)
    })?;

    let changes = if previous == current {
        tracing::info!("already at {}; nothing to compare", current.short());
        Vec::new()
    } else {
        repo.compare(&previous, &current).map_err(|err| {
            tracing::error!(
                "failed to compare {}..{}: {err}",
                previous.short(),
                current.short()
            );
            upstream("comparing commits", err)
        })?
    };

    tracing::info!(
        "{} change(s) between {} and {}",
        changes.len(),
        previous.short(),
        current.short()
    );

    let outcomes: Vec<FileOutcome> = changes
        .iter()
        .map(|change| apply_change(change, &current, repo, automation, options))
        .collect();

    let state_persisted = if options.dry_run {
        tracing::info!("[dry-run] would record {} as synced", current.short());
        false
    } else {
        match state.set(&options.state_key, &current.0) {
            Ok(()) => {
                tracing::info!("recorded {} as synced", current.short());
                true
            }
            Err(err) => {
                tracing::error!(
                    "failed to record {} under '{}': {err}; next run will replay this diff",
                    current.short(),
                    options.state_key
                );
                false
            }
        }
    };

    Ok(SyncReport {
        previous,
        current,
        dry_run: options.dry_run,
        started_at,
        finished_at: Utc::now(),
        outcomes,
        state_persisted,
    })
}

fn apply_change(
    change: &FileChange,
    current: &CommitSha,
    repo: &dyn RepositoryHost,
    automation: &dyn AutomationHost,
    options: &SyncOptions,
) -> FileOutcome {
    if !options.filter.matches(&change.path) {
        tracing::debug!("ignoring {}", change.path);
        return FileOutcome {
            path: change.path.clone(),
            runbook: None,
            result: FileResult::Skipped {
                reason: format!("not a {} script", options.filter.extension()),
            },
        };
    }

    let Some(name) = RunbookName::from_path(&change.path) else {
        return FileOutcome {
            path: change.path.clone(),
            runbook: None,
            result: FileResult::Skipped {
                reason: "cannot derive a runbook name".to_string(),
            },
        };
    };

    let result = if change.is_deleted {
        delete(&name, automation, options.dry_run)
    } else {
        import(&change.path, &name, current, repo, automation, options.dry_run)
    };

    FileOutcome {
        path: change.path.clone(),
        runbook: Some(name),
        result,
    }
}

fn delete(name: &RunbookName, automation: &dyn AutomationHost, dry_run: bool) -> FileResult {
    if dry_run {
        tracing::info!("[dry-run] would delete runbook {name}");
        return FileResult::WouldDelete;
    }
    match automation.delete_runbook(name) {
        Ok(DeleteOutcome::Deleted) => {
            tracing::info!("deleted runbook {name}");
            FileResult::Deleted
        }
        Ok(DeleteOutcome::AlreadyAbsent) => {
            tracing::info!("runbook {name} already absent");
            FileResult::AlreadyAbsent
        }
        Err(err) => {
            tracing::warn!("failed to delete runbook {name}: {err}");
            FileResult::Failed {
                reason: format!("delete failed: {err}"),
            }
        }
    }
}

fn import(
    path: &str,
    name: &RunbookName,
    current: &CommitSha,
    repo: &dyn RepositoryHost,
    automation: &dyn AutomationHost,
    dry_run: bool,
) -> FileResult {
    let content = match repo.file_content(path, current) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!("failed to fetch {path} at {}: {err}", current.short());
            return FileResult::Failed {
                reason: format!("fetch failed: {err}"),
            };
        }
    };

    // A failed lookup (other than not-found) would make us drop the tags on
    // overwrite, so leave the runbook alone.
    let existing = match automation.get_runbook(name) {
        Ok(existing) => existing,
        Err(err) if err.is_not_found() => None,
        Err(err) => {
            tracing::warn!("failed to look up runbook {name}: {err}");
            return FileResult::Failed {
                reason: format!("lookup failed: {err}"),
            };
        }
    };
    let replaced = existing.is_some();

    if dry_run {
        tracing::info!("[dry-run] would import runbook {name} from {path}");
        return FileResult::WouldImport { replaced };
    }

    if let Err(err) = automation.import_runbook(name, &content) {
        tracing::warn!("failed to import runbook {name}: {err}");
        return FileResult::Failed {
            reason: format!("import failed: {err}"),
        };
    }
    tracing::info!("imported runbook {name} from {path}");

    let tags = match existing {
        Some(prior) if !prior.tags.is_empty() => match automation.set_tags(name, &prior.tags) {
            Ok(()) => TagRestore::Restored {
                count: prior.tags.len(),
            },
            Err(err) => {
                tracing::warn!("failed to restore tags on runbook {name}: {err}");
                TagRestore::Failed {
                    reason: err.to_string(),
                }
            }
        },
        _ => TagRestore::NotNeeded,
    };

    FileResult::Imported { replaced, tags }
}

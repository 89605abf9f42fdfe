//! # rbsync-sync
//!
//! Mirror PowerShell scripts from a repository into automation runbooks.
//!
//! Call [`run`] with a [`RepositoryHost`], an [`AutomationHost`] and a
//! [`StateStore`]. The procedure reads the last synced commit, compares it to
//! the branch head, applies every matching file change and records the head as
//! the new checkpoint. Per-file failures are collected in the [`SyncReport`];
//! only the head and diff lookups abort a run.

pub mod error;
pub mod filter;
pub mod host;
pub mod procedure;
pub mod report;
pub mod state_store;

pub use error::SyncError;
pub use filter::ScriptFilter;
pub use host::{AutomationHost, DeleteOutcome, HostError, RepositoryHost};
pub use procedure::{run, SyncOptions};
pub use report::{FileOutcome, FileResult, SyncReport, TagRestore};
pub use state_store::{FileStateStore, MemoryStateStore, StateError, StateStore};

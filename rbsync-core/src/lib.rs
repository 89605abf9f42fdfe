//! rbsync core library — domain types, configuration, errors.
//!
//! - [`types`] — newtypes and the diff / runbook structs
//! - [`config`] — YAML configuration and credential resolution
//! - [`paths`] — locations under `~/.rbsync/`
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{Credentials, StateBackend, SyncConfig};
pub use error::ConfigError;
pub use types::{CommitSha, FileChange, Runbook, RunbookName, Tags};

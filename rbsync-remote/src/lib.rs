//! # rbsync-remote
//!
//! Blocking HTTP implementations of the sync collaborators:
//! [`GitLabClient`] (repository host), [`AutomationClient`] (automation host)
//! and [`AutomationVariableStore`] (checkpoint kept as a variable asset).
//!
//! [`Remotes::connect`] builds all three from a loaded config.

pub mod automation;
pub mod gitlab;
mod http;

use std::path::Path;

use rbsync_core::{Credentials, StateBackend, SyncConfig};
use rbsync_sync::{FileStateStore, StateStore};

pub use automation::{AutomationClient, AutomationVariableStore};
pub use gitlab::GitLabClient;

/// The collaborators for one run, built from config.
pub struct Remotes {
    pub repo: GitLabClient,
    pub automation: AutomationClient,
    pub state: Box<dyn StateStore>,
}

impl Remotes {
    pub fn connect(config: &SyncConfig, credentials: &Credentials, home: &Path) -> Self {
        let repo = GitLabClient::from_config(&config.gitlab, &credentials.gitlab_token);
        let automation =
            AutomationClient::from_config(&config.automation, &credentials.azure_token);
        let state = open_state_store(config, &automation, home);
        Self {
            repo,
            automation,
            state,
        }
    }
}

/// The configured checkpoint backend.
pub fn open_state_store(
    config: &SyncConfig,
    automation: &AutomationClient,
    home: &Path,
) -> Box<dyn StateStore> {
    match config.state.backend {
        StateBackend::File => Box::new(FileStateStore::new(config.state_path(home))),
        StateBackend::AutomationVariable => {
            Box::new(AutomationVariableStore::new(automation.clone()))
        }
    }
}

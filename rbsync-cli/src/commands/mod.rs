pub mod serve;
pub mod state;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use rbsync_core::{config, paths, SyncConfig};

use crate::GlobalArgs;

pub fn home_dir() -> Result<PathBuf> {
    paths::home().context("could not determine home directory")
}

/// Load the config named by `--config`, or `<home>/.rbsync/config.yaml`.
pub fn load_config(home: &Path, global: &GlobalArgs) -> Result<SyncConfig> {
    match &global.config {
        Some(path) => config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => config::load_at(home).context("failed to load config"),
    }
}

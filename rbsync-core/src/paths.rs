//! Well-known locations under `<home>/.rbsync/`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.yaml";
pub const STATE_FILE: &str = "state.json";
pub const LAST_REPORT_FILE: &str = "last_report.json";

pub fn rbsync_root(home: &Path) -> PathBuf {
    home.join(".rbsync")
}

pub fn config_path(home: &Path) -> PathBuf {
    rbsync_root(home).join(CONFIG_FILE)
}

pub fn state_path(home: &Path) -> PathBuf {
    rbsync_root(home).join(STATE_FILE)
}

pub fn last_report_path(home: &Path) -> PathBuf {
    rbsync_root(home).join(LAST_REPORT_FILE)
}

/// The current user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

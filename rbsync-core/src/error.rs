//! Error types for rbsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while locating, loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load, with file path and line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// A token is neither in the config file nor in its environment variable.
    #[error("missing {name} credential; set it in the config file or export {env}")]
    MissingCredential { name: &'static str, env: &'static str },

    /// A required field is empty or malformed.
    #[error("invalid config: {0}")]
    Invalid(String),
}

//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.rbsync/
//!   config.yaml        (this file; may hold tokens)
//!   last_report.json   (report of the last run)
//!   state.json         (file state backend)
//! ```
//!
//! # Example
//!
//! ```yaml
//! gitlab:
//!   base_url: https://gitlab.example.com
//!   project: ops/runbooks
//!   branch: master
//! automation:
//!   subscription_id: 00000000-0000-0000-0000-000000000000
//!   resource_group: rg-automation
//!   account: aa-ops
//!   location: westeurope
//! state:
//!   backend: automation_variable
//!   variable: GitLabLastSyncedCommit
//! ```
//!
//! # API pattern
//!
//! Loaders come in two forms, as with every home-rooted lookup in this crate:
//! - `load_at(home)` — explicit home; used in tests with `TempDir`
//! - `load_from(path)` — explicit file, for `--config`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths;

pub const GITLAB_TOKEN_ENV: &str = "RBSYNC_GITLAB_TOKEN";
pub const AZURE_TOKEN_ENV: &str = "RBSYNC_AZURE_TOKEN";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub gitlab: GitLabConfig,
    pub automation: AutomationConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Repository host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabConfig {
    pub base_url: String,
    /// Numeric project id or `namespace/project` path.
    pub project: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Automation account settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default = "default_management_url")]
    pub base_url: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub account: String,
    pub location: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_runbook_type")]
    pub runbook_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Where the last synced commit is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// JSON file under `~/.rbsync/`.
    #[default]
    File,
    /// A variable asset in the automation account.
    AutomationVariable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackend,
    /// Key (or variable asset name) holding the last synced commit.
    #[serde(default = "default_state_variable")]
    pub variable: String,
    /// Override for the file backend location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            variable: default_state_variable(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Expected value of the `X-Gitlab-Token` header, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            secret_token: None,
        }
    }
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_management_url() -> String {
    "https://management.azure.com".to_string()
}

fn default_api_version() -> String {
    "2023-11-01".to_string()
}

fn default_runbook_type() -> String {
    "PowerShell".to_string()
}

fn default_state_variable() -> String {
    "GitLabLastSyncedCommit".to_string()
}

fn default_extension() -> String {
    ".ps1".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:8089".to_string()
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Resolved bearer credentials for both hosts.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub gitlab_token: String,
    pub azure_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gitlab_token", &"<redacted>")
            .field("azure_token", &"<redacted>")
            .finish()
    }
}

impl SyncConfig {
    /// Resolve tokens from the file, falling back to the process environment.
    pub fn resolve_credentials(&self) -> Result<Credentials, ConfigError> {
        self.resolve_credentials_with(|name| std::env::var(name).ok())
    }

    /// As [`SyncConfig::resolve_credentials`], with an injectable env lookup.
    pub fn resolve_credentials_with<F>(&self, lookup: F) -> Result<Credentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gitlab_token = pick_token(self.gitlab.token.as_deref(), GITLAB_TOKEN_ENV, &lookup)
            .ok_or(ConfigError::MissingCredential {
                name: "GitLab",
                env: GITLAB_TOKEN_ENV,
            })?;
        let azure_token = self.azure_token_with(&lookup)?;
        Ok(Credentials {
            gitlab_token,
            azure_token,
        })
    }

    /// Only the automation account token, for callers that never talk to GitLab.
    pub fn azure_token(&self) -> Result<String, ConfigError> {
        self.azure_token_with(|name| std::env::var(name).ok())
    }

    fn azure_token_with<F>(&self, lookup: F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        pick_token(self.automation.token.as_deref(), AZURE_TOKEN_ENV, &lookup).ok_or(
            ConfigError::MissingCredential {
                name: "Azure",
                env: AZURE_TOKEN_ENV,
            },
        )
    }

    /// Reject configs the clients could not work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("gitlab.base_url", &self.gitlab.base_url),
            ("gitlab.project", &self.gitlab.project),
            ("gitlab.branch", &self.gitlab.branch),
            ("automation.base_url", &self.automation.base_url),
            ("automation.subscription_id", &self.automation.subscription_id),
            ("automation.resource_group", &self.automation.resource_group),
            ("automation.account", &self.automation.account),
            ("automation.location", &self.automation.location),
            ("automation.api_version", &self.automation.api_version),
            ("state.variable", &self.state.variable),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }

        let ext = &self.filter.extension;
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "filter.extension must look like '.ps1', got '{ext}'"
            )));
        }
        Ok(())
    }

    /// Location of the file state backend for this config.
    pub fn state_path(&self, home: &Path) -> PathBuf {
        self.state
            .path
            .clone()
            .unwrap_or_else(|| paths::state_path(home))
    }
}

fn pick_token<F>(configured: Option<&str>, env: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    configured
        .map(str::to_owned)
        .or_else(|| lookup(env))
        .filter(|t| !t.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate `<home>/.rbsync/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    load_from(&paths::config_path(home))
}

/// Load and validate a config file at an explicit path.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let config: SyncConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

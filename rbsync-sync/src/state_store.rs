//! Where the last synced commit lives between runs.
//!
//! [`FileStateStore`] persists a `StateFile` JSON document (by default at
//! `<home>/.rbsync/state.json`). Writes use an atomic `.tmp` + rename.
//! Remote backends implement [`StateStore`] in `rbsync-remote`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::HostError;

/// Errors from a [`StateStore`] backend.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("remote state error: {0}")]
    Remote(#[from] HostError),
}

/// Key/value checkpoint storage.
pub trait StateStore {
    /// `Ok(None)` when `key` has never been written.
    fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StateError>;
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// On-disk payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// JSON-file state store.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document. Returns an empty document if the file does
    /// not yet exist.
    pub fn load(&self) -> Result<StateFile, StateError> {
        if !self.path.exists() {
            return Ok(StateFile::default());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| StateError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| StateError::Json {
            path: self.path.clone(),
            source: e,
        })
    }

    fn save(&self, state: &StateFile) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state).map_err(|e| StateError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        write_atomic(&self.path, json.as_bytes()).map_err(|(path, source)| StateError::Io {
            path,
            source,
        })
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.load()?.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StateError> {
        let mut state = self.load()?;
        state.values.insert(key.to_string(), value.to_string());
        state.updated_at = Some(Utc::now());
        self.save(&state)
    }
}

/// Write `bytes` to `<path>.tmp`, then rename over `path`. Creates the parent
/// directory. On failure the offending path is returned with the error.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), (PathBuf, std::io::Error)> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| (dir.to_path_buf(), e))?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, bytes).map_err(|e| (tmp.clone(), e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err((path.to_path_buf(), e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local store; used by tests and as a scratch store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    values: BTreeMap<String, String>,
}

impl MemoryStateStore {
    pub fn with_value(key: &str, value: &str) -> Self {
        let mut values = BTreeMap::new();
        values.insert(key.to_string(), value.to_string());
        Self { values }
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StateError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

//! Which repository paths are mirrored as runbooks.

/// Case-insensitive file-extension filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFilter {
    extension: String,
}

impl ScriptFilter {
    /// `extension` includes the leading dot, e.g. `.ps1`.
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.to_ascii_lowercase(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The file name must end in the extension and have a non-empty stem.
    pub fn matches(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        file_name.len() > self.extension.len()
            && file_name.to_ascii_lowercase().ends_with(&self.extension)
    }
}

impl Default for ScriptFilter {
    fn default() -> Self {
        Self::new(".ps1")
    }
}

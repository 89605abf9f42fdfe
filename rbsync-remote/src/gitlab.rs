//! GitLab API v4 client, the repository host.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use rbsync_core::{config::GitLabConfig, CommitSha, FileChange};
use rbsync_sync::{HostError, RepositoryHost};

use crate::http::{agent, encode_segment, host_error, read_json};

#[derive(Debug, Deserialize)]
struct CommitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default)]
    diffs: Vec<DiffEntry>,
}

#[derive(Debug, Deserialize)]
struct DiffEntry {
    new_path: String,
    #[serde(default)]
    deleted_file: bool,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Blocking client scoped to one project.
pub struct GitLabClient {
    agent: ureq::Agent,
    /// `<base>/api/v4/projects/<encoded project>`
    project_url: String,
    token: String,
}

impl GitLabClient {
    pub fn new(base_url: &str, project: &str, token: impl Into<String>) -> Self {
        Self {
            agent: agent(),
            project_url: format!(
                "{}/api/v4/projects/{}",
                base_url.trim_end_matches('/'),
                encode_segment(project)
            ),
            token: token.into(),
        }
    }

    pub fn from_config(config: &GitLabConfig, token: &str) -> Self {
        Self::new(&config.base_url, &config.project, token)
    }

    fn get(&self, url: &str) -> ureq::Request {
        self.agent.get(url).query("private_token", &self.token)
    }
}

impl RepositoryHost for GitLabClient {
    fn head_commit(&self, branch: &str) -> Result<CommitSha, HostError> {
        let url = format!(
            "{}/repository/commits/{}",
            self.project_url,
            encode_segment(branch)
        );
        let response = self.get(&url).call().map_err(|e| host_error(&url, e))?;
        let commit: CommitResponse = read_json(&url, response)?;
        tracing::debug!("head of {branch} is {}", commit.id);
        Ok(CommitSha::from(commit.id))
    }

    fn compare(&self, from: &CommitSha, to: &CommitSha) -> Result<Vec<FileChange>, HostError> {
        let url = format!("{}/repository/compare", self.project_url);
        let response = self
            .get(&url)
            .query("from", &from.0)
            .query("to", &to.0)
            .call()
            .map_err(|e| host_error(&url, e))?;
        let compare: CompareResponse = read_json(&url, response)?;
        Ok(compare
            .diffs
            .into_iter()
            .map(|d| FileChange {
                path: d.new_path,
                is_deleted: d.deleted_file,
            })
            .collect())
    }

    fn file_content(&self, path: &str, reference: &CommitSha) -> Result<String, HostError> {
        let url = format!(
            "{}/repository/files/{}",
            self.project_url,
            encode_segment(path)
        );
        let response = self
            .get(&url)
            .query("ref", &reference.0)
            .call()
            .map_err(|e| host_error(&url, e))?;
        let file: FileResponse = read_json(&url, response)?;
        decode_content(&file).map_err(|reason| HostError::InvalidResponse(format!("{path}: {reason}")))
    }
}

fn decode_content(file: &FileResponse) -> Result<String, String> {
    match file.encoding.as_deref() {
        Some("text") => Ok(file.content.clone()),
        Some("base64") | None => {
            let compact: String = file
                .content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            let bytes = STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| format!("invalid base64 content: {e}"))?;
            String::from_utf8(bytes).map_err(|e| format!("content is not UTF-8: {e}"))
        }
        Some(other) => Err(format!("unsupported encoding '{other}'")),
    }
}

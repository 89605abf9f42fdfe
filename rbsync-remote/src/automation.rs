//! Azure Automation (Resource Manager) client, the automation host.
//!
//! Every request is scoped to one automation account:
//!
//! ```text
//! <base>/subscriptions/<sub>/resourceGroups/<rg>/providers/Microsoft.Automation/automationAccounts/<account>
//!     /runbooks/<name>                  GET | PUT | PATCH | DELETE
//!     /runbooks/<name>/draft/content    PUT (script text)
//!     /runbooks/<name>/draft/publish    POST
//!     /variables/<name>                 GET | PUT
//! ```

use serde::Deserialize;
use serde_json::json;

use rbsync_core::{config::AutomationConfig, Runbook, RunbookName, Tags};
use rbsync_sync::{AutomationHost, DeleteOutcome, HostError, StateError, StateStore};

use crate::http::{agent, encode_segment, host_error, read_json};

#[derive(Debug, Deserialize)]
struct RunbookResponse {
    name: String,
    #[serde(default)]
    tags: Option<Tags>,
}

#[derive(Debug, Deserialize)]
struct VariableResponse {
    #[serde(default)]
    properties: VariableProperties,
}

#[derive(Debug, Default, Deserialize)]
struct VariableProperties {
    #[serde(default)]
    value: Option<String>,
}

/// Blocking client scoped to one automation account.
#[derive(Clone)]
pub struct AutomationClient {
    agent: ureq::Agent,
    account_url: String,
    api_version: String,
    location: String,
    runbook_type: String,
    token: String,
}

impl AutomationClient {
    pub fn from_config(config: &AutomationConfig, token: &str) -> Self {
        Self {
            agent: agent(),
            account_url: format!(
                "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Automation/automationAccounts/{}",
                config.base_url.trim_end_matches('/'),
                encode_segment(&config.subscription_id),
                encode_segment(&config.resource_group),
                encode_segment(&config.account),
            ),
            api_version: config.api_version.clone(),
            location: config.location.clone(),
            runbook_type: config.runbook_type.clone(),
            token: token.to_string(),
        }
    }

    fn runbook_url(&self, name: &RunbookName) -> String {
        format!("{}/runbooks/{}", self.account_url, encode_segment(&name.0))
    }

    fn variable_url(&self, name: &str) -> String {
        format!("{}/variables/{}", self.account_url, encode_segment(name))
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .query("api-version", &self.api_version)
            .set("Authorization", &format!("Bearer {}", self.token))
    }

    /// Read a variable asset. `Ok(None)` when the variable does not exist.
    pub fn get_variable(&self, name: &str) -> Result<Option<String>, HostError> {
        let url = self.variable_url(name);
        let response = match self.request("GET", &url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(err) => return Err(host_error(&url, err)),
        };
        let variable: VariableResponse = read_json(&url, response)?;
        Ok(variable.properties.value.map(|raw| decode_variable_value(&raw)))
    }

    /// Create or overwrite an unencrypted string variable asset.
    pub fn set_variable(&self, name: &str, value: &str) -> Result<(), HostError> {
        let url = self.variable_url(name);
        let encoded = serde_json::Value::String(value.to_string()).to_string();
        self.request("PUT", &url)
            .send_json(json!({
                "name": name,
                "properties": { "value": encoded, "isEncrypted": false },
            }))
            .map_err(|e| host_error(&url, e))?;
        Ok(())
    }
}

/// Variable values are stored JSON-encoded (`"\"abc\""`); fall back to the
/// raw text for values written by other tools.
fn decode_variable_value(raw: &str) -> String {
    serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string())
}

impl AutomationHost for AutomationClient {
    fn get_runbook(&self, name: &RunbookName) -> Result<Option<Runbook>, HostError> {
        let url = self.runbook_url(name);
        let response = match self.request("GET", &url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(err) => return Err(host_error(&url, err)),
        };
        let runbook: RunbookResponse = read_json(&url, response)?;
        Ok(Some(Runbook {
            name: RunbookName::from(runbook.name),
            tags: runbook.tags.unwrap_or_default(),
        }))
    }

    fn delete_runbook(&self, name: &RunbookName) -> Result<DeleteOutcome, HostError> {
        let url = self.runbook_url(name);
        match self.request("DELETE", &url).call() {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(ureq::Error::Status(404, _)) => Ok(DeleteOutcome::AlreadyAbsent),
            Err(err) => Err(host_error(&url, err)),
        }
    }

    fn import_runbook(&self, name: &RunbookName, content: &str) -> Result<(), HostError> {
        let url = self.runbook_url(name);
        self.request("PUT", &url)
            .send_json(json!({
                "name": name.0,
                "location": self.location,
                "properties": {
                    "runbookType": self.runbook_type,
                    "logProgress": false,
                    "logVerbose": false,
                    "draft": {},
                },
            }))
            .map_err(|e| host_error(&url, e))?;

        let content_url = format!("{url}/draft/content");
        self.request("PUT", &content_url)
            .set("Content-Type", "text/powershell")
            .send_string(content)
            .map_err(|e| host_error(&content_url, e))?;

        let publish_url = format!("{url}/draft/publish");
        self.request("POST", &publish_url)
            .send_string("")
            .map_err(|e| host_error(&publish_url, e))?;

        tracing::debug!("published runbook {name}");
        Ok(())
    }

    fn set_tags(&self, name: &RunbookName, tags: &Tags) -> Result<(), HostError> {
        let url = self.runbook_url(name);
        self.request("PATCH", &url)
            .send_json(json!({ "tags": tags }))
            .map_err(|e| host_error(&url, e))?;
        Ok(())
    }
}

/// Checkpoint kept as a variable asset in the automation account.
pub struct AutomationVariableStore {
    client: AutomationClient,
}

impl AutomationVariableStore {
    pub fn new(client: AutomationClient) -> Self {
        Self { client }
    }
}

impl StateStore for AutomationVariableStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.client.get_variable(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StateError> {
        Ok(self.client.set_variable(key, value)?)
    }
}

//! Shared ureq plumbing: agent construction and error mapping.

use std::time::Duration;

use rbsync_sync::HostError;

pub const TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("rbsync/", env!("CARGO_PKG_VERSION"));

pub(crate) fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
}

/// Map a ureq failure onto [`HostError`]. `url` must not carry credentials.
pub(crate) fn host_error(url: &str, err: ureq::Error) -> HostError {
    match err {
        ureq::Error::Status(404, _) => HostError::NotFound(url.to_string()),
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            HostError::Status {
                status,
                url: url.to_string(),
                message: truncate(body.trim(), 300),
            }
        }
        // The transport's own Display includes the full URL, query token and all.
        ureq::Error::Transport(transport) => HostError::Transport(match transport.message() {
            Some(message) => format!("{url}: {}: {message}", transport.kind()),
            None => format!("{url}: {}", transport.kind()),
        }),
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    url: &str,
    response: ureq::Response,
) -> Result<T, HostError> {
    response
        .into_json::<T>()
        .map_err(|e| HostError::InvalidResponse(format!("{url}: {e}")))
}

/// Percent-encode a single path segment (`/` included), as GitLab expects
/// for project paths, refs and file paths.
pub(crate) fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

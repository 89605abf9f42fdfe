//! HTTP surface of the listener.
//!
//! - `POST /hooks/gitlab` queues a sync for pushes to the configured branch
//! - `GET /status` reports the processor state and the last run
//! - `GET /healthz` liveness probe

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use crate::runtime::{DaemonStatus, SyncJob};

pub const TOKEN_HEADER: &str = "x-gitlab-token";

#[derive(Clone)]
pub struct AppState {
    pub(crate) sync_tx: mpsc::Sender<SyncJob>,
    pub(crate) status: Arc<RwLock<DaemonStatus>>,
    pub(crate) secret_token: Option<String>,
    pub(crate) branch: String,
}

/// The subset of a push event payload the listener looks at.
#[derive(Debug, Default, Deserialize)]
struct PushEvent {
    #[serde(rename = "ref", default)]
    git_ref: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/hooks/gitlab", post(gitlab_hook))
        .route("/status", get(status))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

async fn gitlab_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(expected) = &state.secret_token {
        let given = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            tracing::warn!("rejected webhook with missing or wrong token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid webhook token" })),
            );
        }
    }

    // Unparseable payloads still trigger a run; the branch head is what gets synced.
    let event: PushEvent = serde_json::from_slice(&body).unwrap_or_default();
    let wanted = format!("refs/heads/{}", state.branch);
    if let Some(git_ref) = &event.git_ref {
        if *git_ref != wanted {
            tracing::debug!(git_ref = %git_ref, "ignoring push to another ref");
            return (
                StatusCode::OK,
                Json(json!({ "queued": false, "reason": format!("ref {git_ref} is not {wanted}") })),
            );
        }
    }

    let job = SyncJob {
        source: "webhook",
        git_ref: event.git_ref,
    };
    match state.sync_tx.try_send(job) {
        Ok(()) => {
            tracing::info!("sync queued from webhook");
            (StatusCode::ACCEPTED, Json(json!({ "queued": true })))
        }
        Err(TrySendError::Full(_)) => {
            tracing::debug!("sync already pending, coalescing webhook");
            (
                StatusCode::ACCEPTED,
                Json(json!({ "queued": true, "coalesced": true })),
            )
        }
        Err(TrySendError::Closed(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "sync processor is not running" })),
        ),
    }
}

async fn status(State(state): State<AppState>) -> Json<DaemonStatus> {
    Json(state.status.read().await.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(secret: Option<&str>) -> (Router, mpsc::Receiver<SyncJob>) {
        let (sync_tx, sync_rx) = mpsc::channel(1);
        let router = build_router(AppState {
            sync_tx,
            status: Arc::new(RwLock::new(DaemonStatus::new())),
            secret_token: secret.map(str::to_string),
            branch: "master".into(),
        });
        (router, sync_rx)
    }

    fn push(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/hooks/gitlab")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("X-Gitlab-Token", token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let (app, mut rx) = app(Some("s3cret"));
        let (status, _) = send(app.clone(), push(Some("nope"), "{}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(app, push(None, "{}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn push_to_branch_is_queued() {
        let (app, mut rx) = app(Some("s3cret"));
        let (status, body) = send(
            app,
            push(Some("s3cret"), r#"{"object_kind":"push","ref":"refs/heads/master"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["queued"], true);
        let job = rx.try_recv().expect("job queued");
        assert_eq!(job.git_ref.as_deref(), Some("refs/heads/master"));
    }

    #[tokio::test]
    async fn push_to_other_branch_is_ignored() {
        let (app, mut rx) = app(None);
        let (status, body) = send(app, push(None, r#"{"ref":"refs/heads/feature"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["queued"], false);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pending_sync_coalesces_further_pushes() {
        let (app, mut rx) = app(None);
        let (status, body) = send(app.clone(), push(None, "not json")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.get("coalesced").is_none());

        let (status, body) = send(app, push(None, r#"{"ref":"refs/heads/master"}"#)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["coalesced"], true);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_processor_returns_unavailable() {
        let (app, rx) = app(None);
        drop(rx);
        let (status, _) = send(app, push(None, "{}")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn status_reports_idle_processor() {
        let (app, _rx) = app(None);
        let req = Request::builder().uri("/status").body(Body::empty()).unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], false);
        assert_eq!(body["runs"], 0);
        assert!(body["last"].is_null());
    }
}

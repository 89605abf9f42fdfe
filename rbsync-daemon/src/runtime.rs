use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::Instant;

use rbsync_core::{paths, Credentials, SyncConfig};
use rbsync_remote::Remotes;
use rbsync_sync::{SyncError, SyncOptions, SyncReport};

use crate::error::DaemonError;
use crate::webhook::{build_router, AppState};

/// Executes one sync pass. Runs on the blocking pool.
pub type Runner = Arc<dyn Fn() -> Result<SyncReport, SyncError> + Send + Sync>;

/// A queued trigger. Only one job waits at a time; later triggers fold into it.
#[derive(Debug, Clone)]
pub(crate) struct SyncJob {
    pub source: &'static str,
    pub git_ref: Option<String>,
}

/// Outcome of one processed job, as exposed on `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub state_persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u128,
    pub finished_at: DateTime<Utc>,
}

impl SyncSummary {
    fn from_result(job: &SyncJob, result: &Result<SyncReport, SyncError>, elapsed_ms: u128) -> Self {
        let base = SyncSummary {
            source: job.source.to_string(),
            git_ref: job.git_ref.clone(),
            ok: false,
            previous: None,
            current: None,
            applied: 0,
            failed: 0,
            skipped: 0,
            state_persisted: false,
            error: None,
            duration_ms: elapsed_ms,
            finished_at: Utc::now(),
        };
        match result {
            Ok(report) => SyncSummary {
                ok: !report.has_failures(),
                previous: Some(report.previous.0.clone()),
                current: Some(report.current.0.clone()),
                applied: report.applied(),
                failed: report.failed(),
                skipped: report.skipped(),
                state_persisted: report.state_persisted,
                ..base
            },
            Err(err) => SyncSummary {
                error: Some(err.to_string()),
                ..base
            },
        }
    }
}

/// Listener-wide state behind `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub runs: u64,
    pub last: Option<SyncSummary>,
}

impl DaemonStatus {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Utc::now(),
            running: false,
            runs: 0,
            last: None,
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub listen: String,
    pub secret_token: Option<String>,
    pub branch: String,
}

impl ServeOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            listen: config.webhook.listen.clone(),
            secret_token: config.webhook.secret_token.clone(),
            branch: config.gitlab.branch.clone(),
        }
    }
}

/// A [`Runner`] that performs a real run against the configured hosts and
/// records the report under `<home>/.rbsync/`.
pub fn config_runner(home: PathBuf, config: SyncConfig, credentials: Credentials) -> Runner {
    Arc::new(move || {
        let mut remotes = Remotes::connect(&config, &credentials, &home);
        let options = SyncOptions::from_config(&config);
        let report = rbsync_sync::run(
            &remotes.repo,
            &remotes.automation,
            remotes.state.as_mut(),
            &options,
        )?;
        let report_path = paths::last_report_path(&home);
        if let Err(err) = report.save(&report_path) {
            tracing::warn!(error = %err, path = %report_path.display(), "failed to save sync report");
        }
        Ok(report)
    })
}

/// Start the listener and block the current thread until it exits.
pub fn start_blocking(
    home: &Path,
    config: SyncConfig,
    credentials: Credentials,
) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let options = ServeOptions::from_config(&config);
    let runner = config_runner(home.to_path_buf(), config, credentials);
    runtime.block_on(run(options, runner))
}

/// Run the listener: HTTP server, sync processor and ctrl-c handler.
pub async fn run(options: ServeOptions, runner: Runner) -> Result<(), DaemonError> {
    let listener = tokio::net::TcpListener::bind(&options.listen)
        .await
        .map_err(|source| DaemonError::Bind {
            addr: options.listen.clone(),
            source,
        })?;
    tracing::info!(addr = %options.listen, branch = %options.branch, "webhook listener started");

    // Capacity 1: one job may wait while another runs; further triggers coalesce.
    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(1);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    let status = Arc::new(RwLock::new(DaemonStatus::new()));

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let status = status.clone();
        let runner = runner.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = sync_processor_task(runner, status, sync_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        let app = build_router(AppState {
            sync_tx,
            status: status.clone(),
            secret_token: options.secret_token.clone(),
            branch: options.branch.clone(),
        });
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .map_err(DaemonError::from);
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down listener");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Task(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (processor_result, server_result, signal_result) =
        tokio::join!(processor_handle, server_handle, signal_handle);

    handle_join("sync_processor", processor_result)?;
    handle_join("http_server", server_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

pub(crate) async fn sync_processor_task(
    runner: Runner,
    status: Arc<RwLock<DaemonStatus>>,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                status.write().await.running = true;
                let started = Instant::now();

                let runner = runner.clone();
                let result = tokio::task::spawn_blocking(move || runner())
                    .await
                    .map_err(|err| DaemonError::Task(format!("sync task join error: {err}")))?;

                let summary = SyncSummary::from_result(&job, &result, started.elapsed().as_millis());
                match &result {
                    Ok(_) => tracing::info!(
                        source = %summary.source,
                        current = summary.current.as_deref().unwrap_or(""),
                        applied = summary.applied,
                        failed = summary.failed,
                        duration_ms = summary.duration_ms,
                        "sync completed",
                    ),
                    Err(err) => tracing::error!(source = %summary.source, error = %err, "sync failed"),
                }

                let mut current = status.write().await;
                current.running = false;
                current.runs += 1;
                current.last = Some(summary);
            }
        }
    }

    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task(format!("{task} task join failure: {err}"))),
    }
}

/// Install the process-wide subscriber on stderr. `RUST_LOG` overrides the
/// default `info` filter; records from the `log` facade are bridged in.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use rbsync_core::CommitSha;

    fn report() -> SyncReport {
        let now = Utc::now();
        SyncReport {
            previous: CommitSha::from("A"),
            current: CommitSha::from("B"),
            dry_run: false,
            started_at: now,
            finished_at: now,
            outcomes: vec![],
            state_persisted: true,
        }
    }

    async fn wait_for_runs(status: &Arc<RwLock<DaemonStatus>>, runs: u64) {
        for _ in 0..200 {
            if status.read().await.runs >= runs {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("processor did not finish {runs} run(s)");
    }

    #[tokio::test]
    async fn processor_records_successful_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let runner: Runner = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(report())
        });
        let status = Arc::new(RwLock::new(DaemonStatus::new()));
        let (tx, rx) = mpsc::channel(1);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let handle = tokio::spawn(sync_processor_task(
            runner,
            status.clone(),
            rx,
            shutdown_tx.subscribe(),
        ));
        tx.send(SyncJob {
            source: "webhook",
            git_ref: Some("refs/heads/master".into()),
        })
        .await
        .unwrap();
        wait_for_runs(&status, 1).await;

        let snapshot = status.read().await.clone();
        let last = snapshot.last.expect("summary");
        assert!(last.ok);
        assert_eq!(last.current.as_deref(), Some("B"));
        assert!(!snapshot.running);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn processor_records_fatal_error_and_keeps_going() {
        let runner: Runner = Arc::new(|| {
            Err(SyncError::NoPreviousReference {
                key: "GitLabLastSyncedCommit".into(),
            })
        });
        let status = Arc::new(RwLock::new(DaemonStatus::new()));
        let (tx, rx) = mpsc::channel(1);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(sync_processor_task(
            runner,
            status.clone(),
            rx,
            shutdown_tx.subscribe(),
        ));

        for expected in 1..=2 {
            tx.send(SyncJob {
                source: "test",
                git_ref: None,
            })
            .await
            .unwrap();
            wait_for_runs(&status, expected).await;
        }

        let last = status.read().await.last.clone().expect("summary");
        assert!(!last.ok);
        assert!(last.error.unwrap().contains("GitLabLastSyncedCommit"));

        drop(tx);
        handle.await.unwrap().unwrap();
    }
}

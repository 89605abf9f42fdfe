//! Webhook listener: GitLab push hooks in, serialized sync runs out.

mod error;
mod runtime;
pub mod webhook;

pub use error::DaemonError;
pub use runtime::{
    config_runner, init_tracing, run, start_blocking, DaemonStatus, Runner, ServeOptions,
    SyncSummary,
};

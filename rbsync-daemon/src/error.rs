use thiserror::Error;

/// Error surface for the webhook listener and its sync processor.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("daemon task error: {0}")]
    Task(String),
}

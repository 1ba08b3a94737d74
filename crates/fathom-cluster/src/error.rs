//! Error types for worker supervision.

use thiserror::Error;

/// Worker supervision errors.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] fathom_config::ConfigError),

    /// No worker executable configured.
    #[error("No worker program configured (set worker.program)")]
    NoWorkerProgram,

    /// Worker already running.
    #[error("Worker on port {0} is already running")]
    WorkerAlreadyRunning(u16),

    /// Worker failed to start.
    #[error("Worker on port {0} failed to start: {1}")]
    WorkerStartFailed(u16, String),

    /// Worker failed to shut down.
    #[error("Worker on port {0} failed to close: {1}")]
    WorkerCloseFailed(u16, String),

    /// Process spawn error.
    #[error("Failed to spawn process: {0}")]
    SpawnError(String),
}

/// Result type for worker supervision.
pub type Result<T> = std::result::Result<T, Error>;

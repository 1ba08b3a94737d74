//! Error types for the test cluster harness.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`ClusterHarness`](crate::ClusterHarness).
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] fathom_config::ConfigError),

    #[error("Failed to prepare test directory {path}: {source}")]
    TestDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid coordination connection string '{0}' (expected host:port)")]
    InvalidConnectString(String),

    #[error("Port counters exhausted (next bit port {next_bit}, next user port {next_user})")]
    PortsExhausted { next_bit: u32, next_user: u32 },

    #[error("Worker {index} failed to start: {source}")]
    WorkerStart {
        index: usize,
        source: fathom_cluster::Error,
    },

    #[error("Worker supervisor error: {0}")]
    Supervisor(fathom_cluster::Error),

    #[error("Coordination ensemble error: {0}")]
    Coordination(#[from] fathom_coord::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

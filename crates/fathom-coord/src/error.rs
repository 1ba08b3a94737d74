//! Error types for the coordination ensemble.

use thiserror::Error;

/// Coordination ensemble errors.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] fathom_config::ConfigError),

    /// No free port left above the requested one.
    #[error("No free client port at or above {0}")]
    PortsExhausted(u16),

    /// Node never answered the health probe.
    #[error("Timed out after {1}ms waiting for coordination node on port {0} to start")]
    StartupTimeout(u16, u128),

    /// Node kept answering the health probe after being stopped.
    #[error("Timed out after {1}ms waiting for coordination node on port {0} to stop")]
    ShutdownTimeout(u16, u128),
}

/// Result type for coordination operations.
pub type Result<T> = std::result::Result<T, Error>;

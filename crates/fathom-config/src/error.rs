//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to resolve configuration: {0}")]
    SourceError(#[from] config::ConfigError),

    #[error("Failed to render configuration as TOML: {0}")]
    RenderError(#[from] toml::ser::Error),

    #[error("Invalid value for '{key}': {reason}")]
    ValidationError { key: String, reason: String },

    #[error("XDG directory error: {0}")]
    XdgError(String),
}

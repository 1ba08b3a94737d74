//! Configuration management for the Fathom test cluster
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (FATHOM_* prefix, highest precedence)
//! 2. fathom.local.toml (gitignored, local overrides)
//! 3. fathom.toml (git-tracked, project config)
//! 4. ~/.config/fathom/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! The loaded result is an immutable [`Settings`] value. Per-worker
//! configurations are derived from it with [`Settings::with_value`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
pub mod keys;
mod loader;
mod paths;
mod settings;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;
pub use settings::Settings;

/// Typed view of the Fathom configuration, used for built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FathomConfig {
    pub worker: WorkerConfig,
    pub coordination: CoordinationConfig,
    pub harness: HarnessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// First inter-worker data port; each started worker takes the next one.
    pub initial_bit_port: u16,
    /// First client port; each started worker takes the next one.
    pub initial_user_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub startup_grace_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        // Bases sit far apart so incremented user ports never reach the bit range.
        Self {
            initial_bit_port: 32010,
            initial_user_port: 31010,
            program: None,
            args: Vec::new(),
            startup_grace_ms: 200,
            shutdown_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Connection string in `host:port` form.
    pub connect: String,
    pub connection_timeout_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            connect: "localhost:2181".to_string(),
            connection_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub test_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            test_dir: PathBuf::from("target/test-data"),
        }
    }
}

impl FathomConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Settings> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Settings> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.harness.test_dir.is_relative() {
            self.harness.test_dir = base.join(&self.harness.test_dir);
        }

        if let Some(program) = &self.worker.program {
            if program.components().count() > 1 && program.is_relative() {
                self.worker.program = Some(base.join(program));
            }
        }
    }
}

//! Worker supervisor contract and the process-backed implementation.

use crate::worker::{WorkerLaunch, WorkerProcess};
use crate::{Error, Result};
use async_trait::async_trait;
use fathom_config::{Settings, keys};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// A started worker that can be shut down.
#[async_trait]
pub trait WorkerHandle: Send {
    /// Inter-worker data port this worker was started with.
    fn bit_port(&self) -> u16;

    /// Client port this worker was started with.
    fn user_port(&self) -> u16;

    /// Shuts the worker down.
    async fn close(&mut self) -> Result<()>;
}

/// Starts workers from a fully derived configuration.
#[async_trait]
pub trait WorkerSupervisor: Send + Sync {
    type Handle: WorkerHandle;

    /// Starts one worker. Ports are read from `settings`.
    async fn start(&self, settings: &Settings) -> Result<Self::Handle>;
}

/// Launches each worker as a child process of the test run.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    program: Option<PathBuf>,
    args: Vec<String>,
    config_dir: PathBuf,
    startup_grace: Duration,
    shutdown_timeout: Duration,
}

impl ProcessSupervisor {
    /// Creates a supervisor that renders worker configs into `config_dir`.
    pub fn new(program: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
            args: Vec::new(),
            config_dir: config_dir.into(),
            startup_grace: Duration::from_millis(200),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// Builds a supervisor from the `worker.*` and `harness.test_dir` keys.
    ///
    /// A missing `worker.program` is only reported when a worker is started,
    /// so runs that never start workers need not configure one.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let program = settings.get_optional_string(keys::WORKER_PROGRAM)?;
        let args: Vec<String> = settings
            .get_optional(keys::WORKER_ARGS)?
            .unwrap_or_default();
        let config_dir = settings.get_string(keys::HARNESS_TEST_DIR)?;

        Ok(Self {
            program: program.map(PathBuf::from),
            args,
            config_dir: PathBuf::from(config_dir),
            startup_grace: millis(settings, keys::WORKER_STARTUP_GRACE_MS)?,
            shutdown_timeout: millis(settings, keys::WORKER_SHUTDOWN_TIMEOUT_MS)?,
        })
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn millis(settings: &Settings, key: &str) -> Result<Duration> {
    let raw = settings.get_int(key)?;
    let ms = u64::try_from(raw).map_err(|_| fathom_config::ConfigError::ValidationError {
        key: key.to_string(),
        reason: format!("{raw} is negative"),
    })?;
    Ok(Duration::from_millis(ms))
}

#[async_trait]
impl WorkerSupervisor for ProcessSupervisor {
    type Handle = WorkerProcess;

    async fn start(&self, settings: &Settings) -> Result<WorkerProcess> {
        let program = self.program.clone().ok_or(Error::NoWorkerProgram)?;
        let bit_port = settings.get_port(keys::INITIAL_BIT_PORT)?;
        let user_port = settings.get_port(keys::INITIAL_USER_PORT)?;

        tokio::fs::create_dir_all(&self.config_dir).await?;

        let stem = format!("worker-{bit_port}-{user_port}");
        let config_path = self.config_dir.join(format!("{stem}.toml"));
        tokio::fs::write(&config_path, settings.to_toml_string()?).await?;
        debug!(path = %config_path.display(), "rendered worker configuration");

        let mut worker = WorkerProcess::new(WorkerLaunch {
            program,
            args: self.args.clone(),
            config_path,
            log_path: self.config_dir.join(format!("{stem}.log")),
            bit_port,
            user_port,
            startup_grace: self.startup_grace,
            shutdown_timeout: self.shutdown_timeout,
        });
        worker.start().await?;

        Ok(worker)
    }
}

//! Worker process management.

use crate::{Error, Result, WorkerHandle};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Placeholder in worker arguments replaced with the rendered config path.
pub const CONFIG_PLACEHOLDER: &str = "{config}";

/// Status of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Worker is stopped.
    Stopped,

    /// Worker is starting up.
    Starting,

    /// Worker is running normally.
    Running,

    /// Worker exited on its own.
    Crashed,
}

/// Everything needed to launch one worker.
#[derive(Debug, Clone)]
pub struct WorkerLaunch {
    /// Executable to run.
    pub program: PathBuf,

    /// Arguments; [`CONFIG_PLACEHOLDER`] is substituted.
    pub args: Vec<String>,

    /// Rendered configuration file for this worker.
    pub config_path: PathBuf,

    /// Where stdout and stderr are captured.
    pub log_path: PathBuf,

    /// Assigned inter-worker data port.
    pub bit_port: u16,

    /// Assigned client port.
    pub user_port: u16,

    /// How long the process must stay alive to count as started.
    pub startup_grace: Duration,

    /// How long `close` waits for the process to exit.
    pub shutdown_timeout: Duration,
}

impl WorkerLaunch {
    /// Arguments with the config placeholder substituted.
    pub fn rendered_args(&self) -> Vec<String> {
        let config = self.config_path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(CONFIG_PLACEHOLDER, &config))
            .collect()
    }
}

/// A managed worker process.
pub struct WorkerProcess {
    launch: WorkerLaunch,

    /// Child process handle.
    process: Option<Child>,

    /// Current status.
    status: WorkerStatus,
}

impl WorkerProcess {
    /// Creates a new worker process (not started).
    pub fn new(launch: WorkerLaunch) -> Self {
        Self {
            launch,
            process: None,
            status: WorkerStatus::Stopped,
        }
    }

    /// Starts the worker process.
    ///
    /// The process must survive the startup grace period, otherwise the
    /// start fails with [`Error::WorkerStartFailed`].
    pub async fn start(&mut self) -> Result<()> {
        if self.status != WorkerStatus::Stopped && self.status != WorkerStatus::Crashed {
            return Err(Error::WorkerAlreadyRunning(self.launch.bit_port));
        }

        self.status = WorkerStatus::Starting;

        let log = File::create(&self.launch.log_path)?;
        let log_err = log.try_clone()?;

        let child = Command::new(&self.launch.program)
            .args(self.launch.rendered_args())
            .env("FATHOM_CONFIG", &self.launch.config_path)
            .env("FATHOM_BIT_PORT", self.launch.bit_port.to_string())
            .env("FATHOM_USER_PORT", self.launch.user_port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                self.status = WorkerStatus::Crashed;
                Error::SpawnError(format!("{}: {e}", self.launch.program.display()))
            })?;

        debug!(
            pid = ?child.id(),
            program = %self.launch.program.display(),
            "worker process spawned"
        );
        self.process = Some(child);

        sleep(self.launch.startup_grace).await;

        if self.is_alive() {
            self.status = WorkerStatus::Running;
            info!(
                bit_port = self.launch.bit_port,
                user_port = self.launch.user_port,
                "worker started"
            );
            Ok(())
        } else {
            self.status = WorkerStatus::Crashed;
            Err(Error::WorkerStartFailed(
                self.launch.bit_port,
                format!(
                    "process exited during startup (see {})",
                    self.launch.log_path.display()
                ),
            ))
        }
    }

    /// Kills the process and waits for it to exit.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.process.take() else {
            return Ok(()); // Already stopped
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!(bit_port = self.launch.bit_port, %status, "worker already exited");
            self.status = WorkerStatus::Stopped;
            return Ok(());
        }

        child.start_kill()?;

        let exit_status = tokio::time::timeout(self.launch.shutdown_timeout, child.wait()).await;
        self.status = WorkerStatus::Stopped;

        match exit_status {
            Ok(Ok(_status)) => Ok(()),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => {
                warn!(bit_port = self.launch.bit_port, "worker did not exit after kill");
                Err(Error::WorkerCloseFailed(
                    self.launch.bit_port,
                    format!(
                        "still running {}ms after kill",
                        self.launch.shutdown_timeout.as_millis()
                    ),
                ))
            }
        }
    }

    /// Checks if the worker process is alive.
    pub fn is_alive(&mut self) -> bool {
        if let Some(child) = &mut self.process {
            match child.try_wait() {
                Ok(Some(_exit_status)) => false, // Process has exited
                Ok(None) => true,                // Still running
                Err(_) => false,                 // Error checking, assume dead
            }
        } else {
            false
        }
    }

    /// Returns the current status, noticing processes that died since the last check.
    pub fn status(&mut self) -> WorkerStatus {
        if self.status == WorkerStatus::Running && !self.is_alive() {
            self.status = WorkerStatus::Crashed;
        }
        self.status
    }

    /// OS process id while the process is running.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(Child::id)
    }

    pub fn config_path(&self) -> &Path {
        &self.launch.config_path
    }

    pub fn log_path(&self) -> &Path {
        &self.launch.log_path
    }
}

#[async_trait]
impl WorkerHandle for WorkerProcess {
    fn bit_port(&self) -> u16 {
        self.launch.bit_port
    }

    fn user_port(&self) -> u16 {
        self.launch.user_port
    }

    async fn close(&mut self) -> Result<()> {
        self.stop().await
    }
}

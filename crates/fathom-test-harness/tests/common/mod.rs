//! Stub collaborators shared by the harness integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use fathom_cluster::{WorkerHandle, WorkerSupervisor};
use fathom_config::{Settings, keys};
use fathom_coord::EnsembleController;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Base settings pointing the harness at `test_dir`.
pub fn settings_for(test_dir: &Path) -> Settings {
    Settings::defaults()
        .unwrap()
        .with_value(
            keys::HARNESS_TEST_DIR,
            test_dir.to_string_lossy().into_owned(),
        )
        .unwrap()
}

/// A worker start as seen by the stub supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRecord {
    pub bit_port: u16,
    pub user_port: u16,
    pub connect: String,
}

#[derive(Debug, Default)]
pub struct Journal {
    pub starts: Vec<StartRecord>,
    /// Worker ids (global start order) whose close was attempted.
    pub close_attempts: Vec<usize>,
}

/// Records every start and close; can be told to fail either.
#[derive(Clone, Default)]
pub struct StubSupervisor {
    pub journal: Arc<Mutex<Journal>>,
    fail_start_at: Option<usize>,
    fail_close_for: HashSet<usize>,
}

impl StubSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `id`-th start (0-based, across batches) fails.
    pub fn failing_start_at(mut self, id: usize) -> Self {
        self.fail_start_at = Some(id);
        self
    }

    /// Closing the worker with this id fails.
    pub fn failing_close_for(mut self, id: usize) -> Self {
        self.fail_close_for.insert(id);
        self
    }

    pub fn starts(&self) -> Vec<StartRecord> {
        self.journal.lock().unwrap().starts.clone()
    }

    pub fn close_attempts(&self) -> Vec<usize> {
        self.journal.lock().unwrap().close_attempts.clone()
    }
}

pub struct StubWorker {
    id: usize,
    bit_port: u16,
    user_port: u16,
    fail_close: bool,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl WorkerHandle for StubWorker {
    fn bit_port(&self) -> u16 {
        self.bit_port
    }

    fn user_port(&self) -> u16 {
        self.user_port
    }

    async fn close(&mut self) -> fathom_cluster::Result<()> {
        self.journal.lock().unwrap().close_attempts.push(self.id);
        if self.fail_close {
            return Err(fathom_cluster::Error::WorkerCloseFailed(
                self.bit_port,
                "stub refused to close".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerSupervisor for StubSupervisor {
    type Handle = StubWorker;

    async fn start(&self, settings: &Settings) -> fathom_cluster::Result<StubWorker> {
        let bit_port = settings.get_port(keys::INITIAL_BIT_PORT)?;
        let user_port = settings.get_port(keys::INITIAL_USER_PORT)?;
        let connect = settings.get_string(keys::COORDINATION_CONNECT)?;

        let mut journal = self.journal.lock().unwrap();
        let id = journal.starts.len();
        if self.fail_start_at == Some(id) {
            return Err(fathom_cluster::Error::WorkerStartFailed(
                bit_port,
                "stub refused to start".to_string(),
            ));
        }
        journal.starts.push(StartRecord {
            bit_port,
            user_port,
            connect,
        });

        Ok(StubWorker {
            id,
            bit_port,
            user_port,
            fail_close: self.fail_close_for.contains(&id),
            journal: Arc::clone(&self.journal),
        })
    }
}

/// Host the stub ensemble reports in its connection string.
pub const STUB_ENSEMBLE_HOST: &str = "coord.stub";

/// Ensemble that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct StubEnsemble {
    pub default_client_port: Option<u16>,
    pub startups: Vec<(PathBuf, usize)>,
    pub shutdowns: usize,
    pub fail_shutdown: bool,
    started: bool,
}

#[async_trait]
impl EnsembleController for StubEnsemble {
    fn set_default_client_port(&mut self, port: u16) {
        self.default_client_port = Some(port);
    }

    async fn startup(
        &mut self,
        base_dir: &Path,
        node_count: usize,
    ) -> fathom_coord::Result<Option<u16>> {
        self.startups.push((base_dir.to_path_buf(), node_count));
        if node_count == 0 {
            return Ok(None);
        }
        self.started = true;
        Ok(Some(self.default_client_port.unwrap_or_default()))
    }

    async fn shutdown(&mut self) -> fathom_coord::Result<()> {
        self.shutdowns += 1;
        if self.fail_shutdown {
            return Err(fathom_coord::Error::ShutdownTimeout(
                self.default_client_port.unwrap_or_default(),
                0,
            ));
        }
        self.started = false;
        Ok(())
    }

    fn client_port(&self) -> Option<u16> {
        if self.started {
            self.default_client_port
        } else {
            None
        }
    }

    fn connect_string(&self) -> Option<String> {
        self.client_port()
            .map(|port| format!("{STUB_ENSEMBLE_HOST}:{port}"))
    }

    fn is_started(&self) -> bool {
        self.started
    }
}

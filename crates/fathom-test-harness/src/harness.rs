//! Cluster lifecycle for integration tests.

use crate::connect::CoordinationEndpoint;
use crate::ports::{PortAllocator, PortPair};
use crate::{HarnessError, Result};
use fathom_cluster::{ProcessSupervisor, WorkerHandle, WorkerSupervisor};
use fathom_config::{Settings, keys};
use fathom_coord::{EnsembleController, MiniEnsemble};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A worker that could not be closed during [`ClusterHarness::stop_cluster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    /// Position of the worker in the started sequence.
    pub index: usize,
    pub bit_port: u16,
    pub user_port: u16,
    pub error: String,
}

/// Outcome of a best-effort worker teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub closed: usize,
    pub failures: Vec<CloseFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Starts and stops workers and a coordination ensemble for one test run.
///
/// All operations run sequentially on the caller's task. Port counters are
/// owned by the harness, so two harnesses seeded from the same settings hand
/// out the same ports; give parallel test runs distinct base ports.
pub struct ClusterHarness<S: WorkerSupervisor, E: EnsembleController> {
    settings: Settings,
    test_dir: PathBuf,
    endpoint: CoordinationEndpoint,
    ports: PortAllocator,
    supervisor: S,
    ensemble: E,
    workers: Vec<S::Handle>,
}

impl ClusterHarness<ProcessSupervisor, MiniEnsemble> {
    /// Harness that launches worker processes and an embedded ensemble.
    pub fn local(settings: Settings) -> Result<Self> {
        let supervisor =
            ProcessSupervisor::from_settings(&settings).map_err(HarnessError::Supervisor)?;
        let ensemble = MiniEnsemble::from_settings(&settings)?;
        Self::set_up(settings, supervisor, ensemble)
    }
}

impl<S: WorkerSupervisor, E: EnsembleController> ClusterHarness<S, E> {
    /// Reads the base ports, connection string and test directory, and
    /// creates the test directory if it does not exist yet.
    pub fn set_up(settings: Settings, supervisor: S, ensemble: E) -> Result<Self> {
        let bit_port = settings.get_port(keys::INITIAL_BIT_PORT)?;
        let user_port = settings.get_port(keys::INITIAL_USER_PORT)?;
        let endpoint =
            CoordinationEndpoint::parse(&settings.get_string(keys::COORDINATION_CONNECT)?)?;
        let test_dir = PathBuf::from(settings.get_string(keys::HARNESS_TEST_DIR)?);

        ensure_test_dir(&test_dir)?;

        debug!(
            bit_port,
            user_port,
            coordination = %endpoint.with_port(endpoint.port),
            test_dir = %test_dir.display(),
            "harness set up"
        );

        Ok(Self {
            settings,
            test_dir,
            endpoint,
            ports: PortAllocator::new(bit_port, user_port),
            supervisor,
            ensemble,
            workers: Vec::new(),
        })
    }

    /// Starts `count` workers, each on the next pair of ports.
    ///
    /// The new workers replace any previously started set; call
    /// [`stop_cluster`](Self::stop_cluster) first to close the old ones.
    /// If a worker fails to start, the remaining ones are not attempted and
    /// the previous set is kept.
    pub async fn start_cluster(&mut self, count: usize) -> Result<()> {
        let mut started = Vec::with_capacity(count);

        for index in 0..count {
            let settings = self.next_worker_settings()?;
            let worker = self
                .supervisor
                .start(&settings)
                .await
                .map_err(|source| HarnessError::WorkerStart { index, source })?;

            debug!(
                index,
                bit_port = worker.bit_port(),
                user_port = worker.user_port(),
                "worker started"
            );
            started.push(worker);
        }

        self.workers = started;
        info!(workers = count, "cluster started");
        Ok(())
    }

    /// Starts a coordination ensemble of `node_count` nodes in the test directory.
    ///
    /// The ensemble's first node tries the port of the configured connection
    /// string. Returns the client port actually bound, or `None` when
    /// `node_count` is zero and nothing was started.
    pub async fn start_coordination(&mut self, node_count: usize) -> Result<Option<u16>> {
        self.ensemble.set_default_client_port(self.endpoint.port);
        let client_port = self.ensemble.startup(&self.test_dir, node_count).await?;
        Ok(client_port)
    }

    /// Closes every started worker in order.
    ///
    /// A failure to close one worker is logged and does not stop the others.
    pub async fn stop_cluster(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        for (index, mut worker) in std::mem::take(&mut self.workers).into_iter().enumerate() {
            match worker.close().await {
                Ok(()) => report.closed += 1,
                Err(e) => {
                    warn!(
                        index,
                        bit_port = worker.bit_port(),
                        error = %e,
                        "error shutting down worker"
                    );
                    report.failures.push(CloseFailure {
                        index,
                        bit_port: worker.bit_port(),
                        user_port: worker.user_port(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.closed > 0 || !report.failures.is_empty() {
            info!(
                closed = report.closed,
                failed = report.failures.len(),
                "cluster stopped"
            );
        }
        report
    }

    /// Shuts down the coordination ensemble if it was started.
    pub async fn stop_coordination(&mut self) -> Result<()> {
        self.ensemble.shutdown().await?;
        Ok(())
    }

    /// Connection string of the running ensemble, as the ensemble reports it.
    pub fn coordination_connect(&self) -> Option<String> {
        self.ensemble.connect_string()
    }

    /// Ports the next started worker will receive.
    pub fn next_ports(&self) -> Option<PortPair> {
        self.ports.peek()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn test_dir(&self) -> &Path {
        &self.test_dir
    }

    pub fn workers(&self) -> &[S::Handle] {
        &self.workers
    }

    pub fn ensemble(&self) -> &E {
        &self.ensemble
    }

    pub fn ensemble_mut(&mut self) -> &mut E {
        &mut self.ensemble
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    /// Base settings with the next port pair, pointed at the running ensemble.
    fn next_worker_settings(&mut self) -> Result<Settings> {
        let pair = self.ports.allocate()?;

        let mut settings = self
            .settings
            .with_value(keys::INITIAL_BIT_PORT, i64::from(pair.bit_port))?
            .with_value(keys::INITIAL_USER_PORT, i64::from(pair.user_port))?;

        if let Some(connect) = self.coordination_connect() {
            settings = settings.with_value(keys::COORDINATION_CONNECT, connect)?;
        }

        Ok(settings)
    }
}

fn ensure_test_dir(path: &Path) -> Result<()> {
    // create_dir_all succeeds when the directory already exists
    std::fs::create_dir_all(path).map_err(|source| HarnessError::TestDir {
        path: path.to_path_buf(),
        source,
    })
}

//! Embedded multi-node coordination ensemble.

use crate::node::CoordinationNode;
use crate::probe::{wait_for_server_down, wait_for_server_up};
use crate::{EnsembleController, Error, Result};
use async_trait::async_trait;
use fathom_config::{Settings, keys};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// An in-process ensemble of coordination nodes for tests.
///
/// Every node is standalone: it owns a client port and a data directory
/// under the base directory, and answers the health probe. The first live
/// node is the active one; its port is the ensemble's client port.
#[derive(Debug)]
pub struct MiniEnsemble {
    default_client_port: u16,
    connection_timeout: Duration,
    nodes: Vec<CoordinationNode>,
    started: bool,
}

impl MiniEnsemble {
    pub fn new() -> Self {
        Self {
            default_client_port: 0,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            nodes: Vec::new(),
            started: false,
        }
    }

    /// Builds an ensemble using `coordination.connection_timeout_ms`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let raw = settings.get_int(keys::COORDINATION_CONNECTION_TIMEOUT_MS)?;
        let ms = u64::try_from(raw).map_err(|_| fathom_config::ConfigError::ValidationError {
            key: keys::COORDINATION_CONNECTION_TIMEOUT_MS.to_string(),
            reason: format!("{raw} is negative"),
        })?;

        Ok(Self::new().with_connection_timeout(Duration::from_millis(ms)))
    }

    /// How long to wait for a node to come up or go down.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn default_client_port(&self) -> u16 {
        self.default_client_port
    }

    /// Client ports of every live node, active node first.
    pub fn client_ports(&self) -> Vec<u16> {
        self.nodes.iter().map(CoordinationNode::port).collect()
    }

    /// Data directories of every live node, active node first.
    pub fn data_dirs(&self) -> Vec<PathBuf> {
        self.nodes
            .iter()
            .map(|node| node.data_dir().to_path_buf())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Stops the active node; the next node becomes active.
    ///
    /// Returns the new client port, or `None` once no node is left.
    pub async fn kill_active_node(&mut self) -> Result<Option<u16>> {
        if !self.started || self.nodes.is_empty() {
            return Ok(None);
        }

        let node = self.nodes.remove(0);
        self.stop_node(node).await?;

        if self.nodes.is_empty() {
            self.started = false;
            info!("last coordination node killed");
            return Ok(None);
        }

        let port = self.nodes[0].port();
        info!(client_port = port, "active coordination node killed");
        Ok(Some(port))
    }

    /// Stops the first backup node, if there is one.
    pub async fn kill_backup_node(&mut self) -> Result<()> {
        if !self.started || self.nodes.len() <= 1 {
            return Ok(());
        }

        let node = self.nodes.remove(1);
        self.stop_node(node).await
    }

    async fn stop_node(&self, mut node: CoordinationNode) -> Result<()> {
        let port = node.port();
        node.stop().await;

        if !wait_for_server_down(port, self.connection_timeout).await {
            return Err(Error::ShutdownTimeout(
                port,
                self.connection_timeout.as_millis(),
            ));
        }

        debug!(node = node.id(), port, "coordination node stopped");
        Ok(())
    }
}

impl Default for MiniEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

/// Deletes and recreates `dir` so each run starts from empty node state.
async fn recreate_dir(dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

#[async_trait]
impl EnsembleController for MiniEnsemble {
    fn set_default_client_port(&mut self, port: u16) {
        self.default_client_port = port;
    }

    async fn startup(&mut self, base_dir: &Path, node_count: usize) -> Result<Option<u16>> {
        if node_count == 0 {
            debug!("no coordination nodes requested");
            return Ok(None);
        }

        self.shutdown().await?;

        let mut tentative_port = self.default_client_port;
        let mut nodes = Vec::with_capacity(node_count);

        // Nodes started so far are dropped, and so stopped, on early return.
        for id in 0..node_count {
            let data_dir = base_dir.join(format!("coordination_{id}"));
            recreate_dir(&data_dir).await?;
            tokio::fs::write(data_dir.join("myid"), id.to_string()).await?;

            let node = CoordinationNode::start(id, tentative_port, data_dir).await?;
            let port = node.port();

            if !wait_for_server_up(port, self.connection_timeout).await {
                return Err(Error::StartupTimeout(
                    port,
                    self.connection_timeout.as_millis(),
                ));
            }
            debug!(node = id, port, "coordination node up");

            if tentative_port != 0 {
                tentative_port = port.checked_add(1).ok_or(Error::PortsExhausted(port))?;
            }
            nodes.push(node);
        }

        self.nodes = nodes;
        self.started = true;

        let client_port = self.nodes[0].port();
        info!(
            nodes = node_count,
            client_port,
            base_dir = %base_dir.display(),
            "coordination ensemble started"
        );
        Ok(Some(client_port))
    }

    async fn shutdown(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }

        let mut first_error = None;
        for node in std::mem::take(&mut self.nodes) {
            if let Err(e) = self.stop_node(node).await {
                warn!(error = %e, "coordination node did not stop");
                first_error.get_or_insert(e);
            }
        }
        self.started = false;

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("coordination ensemble stopped");
                Ok(())
            }
        }
    }

    fn client_port(&self) -> Option<u16> {
        if self.started {
            self.nodes.first().map(CoordinationNode::port)
        } else {
            None
        }
    }

    /// Nodes only listen on the loopback address.
    fn connect_string(&self) -> Option<String> {
        self.client_port().map(|port| format!("127.0.0.1:{port}"))
    }

    fn is_started(&self) -> bool {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{STAT_PREFIX, send_command};
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    fn test_ensemble() -> MiniEnsemble {
        MiniEnsemble::new().with_connection_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_startup_and_shutdown() {
        let temp = TempDir::new().unwrap();
        let mut ensemble = test_ensemble();

        let client_port = ensemble.startup(temp.path(), 3).await.unwrap().unwrap();
        assert!(ensemble.is_started());
        assert_eq!(ensemble.client_port(), Some(client_port));
        assert_eq!(
            ensemble.connect_string(),
            Some(format!("127.0.0.1:{client_port}"))
        );
        assert_eq!(ensemble.node_count(), 3);

        let ports = ensemble.client_ports();
        assert_eq!(ports[0], client_port);
        for port in &ports {
            assert_eq!(send_command(*port, "ruok").await.unwrap(), "imok");
        }

        for id in 0..3 {
            let dir = temp.path().join(format!("coordination_{id}"));
            assert!(dir.is_dir());
            assert_eq!(std::fs::read_to_string(dir.join("myid")).unwrap(), id.to_string());
        }

        ensemble.shutdown().await.unwrap();
        assert!(!ensemble.is_started());
        assert_eq!(ensemble.client_port(), None);
        for port in ports {
            assert!(send_command(port, "ruok").await.is_err());
        }
    }

    #[tokio::test]
    async fn test_zero_nodes_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let mut ensemble = test_ensemble();

        assert_eq!(ensemble.startup(temp.path(), 0).await.unwrap(), None);
        assert!(!ensemble.is_started());
        assert_eq!(ensemble.connect_string(), None);
        assert!(!temp.path().join("coordination_0").exists());

        ensemble.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_when_not_started() {
        let mut ensemble = test_ensemble();
        ensemble.shutdown().await.unwrap();
        assert!(ensemble.kill_active_node().await.unwrap().is_none());
        ensemble.kill_backup_node().await.unwrap();
    }

    #[tokio::test]
    async fn test_default_client_port_skips_busy_port() {
        let temp = TempDir::new().unwrap();
        let blocker = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = blocker.local_addr().unwrap().port();

        let mut ensemble = test_ensemble();
        ensemble.set_default_client_port(taken);
        let client_port = ensemble.startup(temp.path(), 2).await.unwrap().unwrap();

        assert!(client_port > taken);
        let ports = ensemble.client_ports();
        assert!(ports[1] > ports[0]);

        ensemble.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_recreates_data_dirs() {
        let temp = TempDir::new().unwrap();
        let mut ensemble = test_ensemble();

        ensemble.startup(temp.path(), 1).await.unwrap();
        let stale = temp.path().join("coordination_0").join("stale");
        std::fs::write(&stale, "x").unwrap();

        // A second startup replaces the running ensemble
        ensemble.startup(temp.path(), 2).await.unwrap();
        assert_eq!(ensemble.node_count(), 2);
        assert!(!stale.exists());

        ensemble.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_kill_active_fails_over() {
        let temp = TempDir::new().unwrap();
        let mut ensemble = test_ensemble();
        ensemble.startup(temp.path(), 2).await.unwrap();
        let ports = ensemble.client_ports();

        let next = ensemble.kill_active_node().await.unwrap();
        assert_eq!(next, Some(ports[1]));
        assert_eq!(ensemble.client_port(), Some(ports[1]));
        assert!(send_command(ports[0], "ruok").await.is_err());

        assert_eq!(ensemble.kill_active_node().await.unwrap(), None);
        assert!(!ensemble.is_started());
    }

    #[tokio::test]
    async fn test_kill_backup_keeps_active() {
        let temp = TempDir::new().unwrap();
        let mut ensemble = test_ensemble();
        let client_port = ensemble.startup(temp.path(), 3).await.unwrap().unwrap();
        let ports = ensemble.client_ports();

        ensemble.kill_backup_node().await.unwrap();
        assert_eq!(ensemble.client_port(), Some(client_port));
        assert_eq!(ensemble.client_ports(), vec![ports[0], ports[2]]);

        let stat = send_command(client_port, "stat").await.unwrap();
        assert!(stat.starts_with(STAT_PREFIX));

        ensemble.shutdown().await.unwrap();
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings::defaults()
            .unwrap()
            .with_value(keys::COORDINATION_CONNECTION_TIMEOUT_MS, 1500_i64)
            .unwrap();

        let ensemble = MiniEnsemble::from_settings(&settings).unwrap();
        assert_eq!(ensemble.connection_timeout, Duration::from_millis(1500));
        assert_eq!(ensemble.connect_string(), None);
    }
}

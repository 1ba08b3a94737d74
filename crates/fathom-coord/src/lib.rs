//! Embedded coordination ensemble for Fathom test clusters.
//!
//! Workers under test find each other through a coordination service. For
//! tests, [`MiniEnsemble`] runs a small ensemble inside the test process:
//! - one listener per node on consecutive client ports
//! - one data directory per node under a shared base directory
//! - a four-letter-word health probe (see [`probe`])
//!
//! The harness only talks to the [`EnsembleController`] trait, so an
//! external coordination service can be plugged in instead.

pub mod ensemble;
pub mod error;
pub mod node;
pub mod probe;

pub use ensemble::MiniEnsemble;
pub use error::{Error, Result};
pub use node::CoordinationNode;

use async_trait::async_trait;
use std::path::Path;

/// Lifecycle control over a coordination ensemble.
#[async_trait]
pub trait EnsembleController: Send {
    /// Port the first node tries to bind at the next startup.
    fn set_default_client_port(&mut self, port: u16);

    /// Starts `node_count` nodes rooted at `base_dir` and returns the client port.
    ///
    /// A `node_count` of zero does nothing and returns `None`.
    async fn startup(&mut self, base_dir: &Path, node_count: usize) -> Result<Option<u16>>;

    /// Stops every node. Does nothing if the ensemble is not started.
    async fn shutdown(&mut self) -> Result<()>;

    /// Client port of the active node while started.
    fn client_port(&self) -> Option<u16>;

    /// `host:port` clients should use to reach the active node while started.
    fn connect_string(&self) -> Option<String>;

    fn is_started(&self) -> bool;
}

//! Test cluster harness for Fathom integration tests.
//!
//! A [`ClusterHarness`] owns everything a test run needs to exercise the
//! distributed engine end to end:
//!
//! - a shared scratch directory, created on [`set_up`](ClusterHarness::set_up)
//!   and never deleted
//! - a coordination ensemble rooted in that directory
//! - any number of workers, each on its own (bit port, user port) pair
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use fathom_config::ConfigLoader;
//! use fathom_test_harness::ClusterHarness;
//!
//! let settings = ConfigLoader::new().load()?;
//! let mut harness = ClusterHarness::local(settings)?;
//!
//! harness.start_coordination(1).await?;
//! harness.start_cluster(3).await?;
//! // ... drive the cluster ...
//! let report = harness.stop_cluster().await;
//! assert!(report.is_clean());
//! harness.stop_coordination().await?;
//! # Ok(())
//! # }
//! ```

pub mod connect;
pub mod error;
pub mod harness;
pub mod ports;

pub use connect::CoordinationEndpoint;
pub use error::{HarnessError, Result};
pub use harness::{CloseFailure, ClusterHarness, TeardownReport};
pub use ports::{PortAllocator, PortPair};

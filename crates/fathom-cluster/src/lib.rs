//! Worker process supervision for Fathom test clusters.
//!
//! Provides the two seams the test harness drives:
//! - [`WorkerSupervisor`] starts a worker from a derived [`Settings`](fathom_config::Settings)
//! - [`WorkerHandle`] reports the worker's ports and shuts it down
//!
//! [`ProcessSupervisor`] implements both by spawning the configured worker
//! executable as a child process, one process per worker.

pub mod error;
pub mod supervisor;
pub mod worker;

pub use error::{Error, Result};
pub use supervisor::{ProcessSupervisor, WorkerHandle, WorkerSupervisor};
pub use worker::{CONFIG_PLACEHOLDER, WorkerLaunch, WorkerProcess, WorkerStatus};

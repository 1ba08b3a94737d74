//! Recognized configuration keys.
//!
//! Keys are dotted paths into the layered configuration. Environment
//! overrides use the `FATHOM_` prefix and `__` between segments, so
//! `FATHOM_WORKER__INITIAL_BIT_PORT=40000` sets [`INITIAL_BIT_PORT`].

/// First inter-worker data port handed to a worker.
pub const INITIAL_BIT_PORT: &str = "worker.initial_bit_port";

/// First client/control port handed to a worker.
pub const INITIAL_USER_PORT: &str = "worker.initial_user_port";

/// Worker executable launched by the process supervisor.
pub const WORKER_PROGRAM: &str = "worker.program";

/// Arguments passed to the worker executable.
pub const WORKER_ARGS: &str = "worker.args";

pub const WORKER_STARTUP_GRACE_MS: &str = "worker.startup_grace_ms";
pub const WORKER_SHUTDOWN_TIMEOUT_MS: &str = "worker.shutdown_timeout_ms";

/// Coordination service connection string (`host:port`).
pub const COORDINATION_CONNECT: &str = "coordination.connect";

pub const COORDINATION_CONNECTION_TIMEOUT_MS: &str = "coordination.connection_timeout_ms";

/// Shared scratch directory for every server in a test run.
pub const HARNESS_TEST_DIR: &str = "harness.test_dir";

//! Launches a test cluster and prints its addresses.
//!
//! Output on stdout, one line each, once everything is up:
//!
//! ```text
//! COORD=127.0.0.1:2181
//! WORKER=0 BIT=32010 USER=31010
//! WORKER=1 BIT=32011 USER=31011
//! ```
//!
//! The cluster runs until Ctrl+C, then is torn down.

use anyhow::{Context, Result};
use clap::Parser;
use fathom_cluster::WorkerHandle;
use fathom_config::{ConfigLoader, keys};
use fathom_test_harness::ClusterHarness;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fathom-test-harness-cli", version, about = "Start a Fathom test cluster")]
struct Cli {
    /// Project directory holding fathom.toml.
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Number of workers to start.
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Number of coordination nodes to start.
    #[arg(short = 'c', long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    coordination_nodes: u16,

    /// Worker executable (overrides worker.program).
    #[arg(long)]
    worker_program: Option<PathBuf>,

    /// Scratch directory (overrides harness.test_dir).
    #[arg(long)]
    test_dir: Option<PathBuf>,

    /// Arguments passed to every worker; `{config}` becomes the config path.
    #[arg(last = true)]
    worker_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = ConfigLoader::new()
        .with_project_dir(&cli.project)
        .load()
        .context("Failed to load configuration")?;

    if let Some(program) = &cli.worker_program {
        settings = settings.with_value(keys::WORKER_PROGRAM, program.to_string_lossy().into_owned())?;
    }
    if let Some(test_dir) = &cli.test_dir {
        settings =
            settings.with_value(keys::HARNESS_TEST_DIR, test_dir.to_string_lossy().into_owned())?;
    }
    if !cli.worker_args.is_empty() {
        settings = settings.with_value(keys::WORKER_ARGS, cli.worker_args.clone())?;
    }

    let mut harness = ClusterHarness::local(settings).context("Failed to set up harness")?;

    harness
        .start_coordination(usize::from(cli.coordination_nodes))
        .await
        .context("Failed to start coordination ensemble")?;
    let connect = harness
        .coordination_connect()
        .context("Coordination ensemble reported no client port")?;
    println!("COORD={connect}");

    if let Err(e) = harness.start_cluster(cli.workers).await {
        harness.stop_coordination().await.ok();
        return Err(e).context("Failed to start workers");
    }
    for (index, worker) in harness.workers().iter().enumerate() {
        println!(
            "WORKER={index} BIT={} USER={}",
            worker.bit_port(),
            worker.user_port()
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("shutting down test cluster");

    let report = harness.stop_cluster().await;
    if !report.is_clean() {
        warn!(failed = report.failures.len(), "some workers did not close");
    }
    harness
        .stop_coordination()
        .await
        .context("Failed to stop coordination ensemble")?;

    Ok(())
}

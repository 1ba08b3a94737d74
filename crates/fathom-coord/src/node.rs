//! A single embedded coordination node.

use crate::probe::STAT_PREFIX;
use crate::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One node of a [`MiniEnsemble`](crate::MiniEnsemble).
///
/// The node owns a listener task; dropping the node stops the task.
#[derive(Debug)]
pub struct CoordinationNode {
    id: usize,
    port: u16,
    data_dir: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CoordinationNode {
    /// Binds the first free port at or above `tentative_port` and starts serving.
    ///
    /// Port 0 asks the OS for an ephemeral port.
    pub async fn start(id: usize, tentative_port: u16, data_dir: PathBuf) -> Result<Self> {
        let mut port = tentative_port;
        let listener = loop {
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => break listener,
                Err(e) if e.kind() == io::ErrorKind::AddrInUse && port != 0 => {
                    debug!(port, "client port in use, trying next");
                    port = port
                        .checked_add(1)
                        .ok_or(Error::PortsExhausted(tentative_port))?;
                }
                Err(e) => return Err(Error::Io(e)),
            }
        };
        let port = listener.local_addr()?.port();

        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, id, rx));

        Ok(Self {
            id,
            port,
            data_dir,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    /// Stops accepting connections and waits for the listener to close.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(node = self.id, error = %e, "coordination node task failed");
            }
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

async fn serve(listener: TcpListener, id: usize, mut shutdown: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            // Fires on an explicit stop and when the node handle is dropped
            _ = &mut shutdown => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(async move {
                        if let Err(e) = answer(stream, id).await {
                            debug!(node = id, error = %e, "probe connection error");
                        }
                    });
                }
                Err(e) => warn!(node = id, error = %e, "accept failed"),
            },
        }
    }
}

async fn answer(mut stream: TcpStream, id: usize) -> io::Result<()> {
    let mut command = [0u8; 4];
    stream.read_exact(&mut command).await?;

    let reply = match &command {
        b"ruok" => "imok".to_string(),
        b"stat" | b"srvr" => format!(
            "{STAT_PREFIX} {}\nMode: standalone\nNode: {id}\n",
            env!("CARGO_PKG_VERSION")
        ),
        _ => String::new(),
    };

    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await
}

//! Four-letter-word health probe.
//!
//! A client connects, writes a four byte command and reads the reply until
//! the node closes the connection:
//!
//! ```text
//! ruok         -> imok
//! stat | srvr  -> Fathom coordination version: <v>\nMode: standalone\nNode: <id>\n
//! ```
//!
//! Any other command gets an empty reply.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};

/// Prefix of every `stat` reply.
pub const STAT_PREFIX: &str = "Fathom coordination version:";

const PROBE_INTERVAL: Duration = Duration::from_millis(250);
const PROBE_IO_TIMEOUT: Duration = Duration::from_secs(1);

/// Sends a four-letter command to the node on `127.0.0.1:port` and returns its reply.
pub async fn send_command(port: u16, command: &str) -> io::Result<String> {
    let exchange = async {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
        stream.write_all(command.as_bytes()).await?;
        stream.shutdown().await?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;
        Ok::<_, io::Error>(reply)
    };

    timeout(PROBE_IO_TIMEOUT, exchange)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "probe timed out"))?
}

/// Polls `stat` until the node answers or `deadline` elapses.
pub async fn wait_for_server_up(port: u16, deadline: Duration) -> bool {
    let start = Instant::now();
    loop {
        if let Ok(reply) = send_command(port, "stat").await {
            if reply.starts_with(STAT_PREFIX) {
                return true;
            }
        }

        if start.elapsed() > deadline {
            return false;
        }
        sleep(PROBE_INTERVAL).await;
    }
}

/// Polls `stat` until connecting fails or `deadline` elapses.
pub async fn wait_for_server_down(port: u16, deadline: Duration) -> bool {
    let start = Instant::now();
    loop {
        if send_command(port, "stat").await.is_err() {
            return true;
        }

        if start.elapsed() > deadline {
            return false;
        }
        sleep(PROBE_INTERVAL).await;
    }
}

//! Coordination connection strings.

use crate::{HarnessError, Result};

/// Host and client port taken from a `host:port` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinationEndpoint {
    pub host: String,
    pub port: u16,
}

impl CoordinationEndpoint {
    /// Parses `host:port`.
    ///
    /// For an ensemble list (`a:2181,b:2182`) the first entry wins.
    /// IPv6 hosts must be bracketed: `[::1]:2181`.
    pub fn parse(connect: &str) -> Result<Self> {
        let invalid = || HarnessError::InvalidConnectString(connect.to_string());

        let first = connect.split(',').next().unwrap_or_default().trim();
        let (host, port) = first.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Same host, different port.
    pub fn with_port(&self, port: u16) -> String {
        format!("{}:{port}", self.host)
    }
}

//! Listener binding.
//!
//! # Responsibilities
//! - Bind a configured `ListenAddress` (TCP or unix socket)
//! - Report the address actually bound (port 0 resolves to a free port)
//! - Remove unix socket files once the listener is gone

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

use crate::error::StartupError;
use crate::net::address::{BoundAddress, ListenAddress};

/// Which facet of the discovery service a listener exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListenerName {
    Discovery,
    Grpc,
    SecureGrpc,
    Monitoring,
    Webhook,
}

impl ListenerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerName::Discovery => "discovery",
            ListenerName::Grpc => "grpc",
            ListenerName::SecureGrpc => "secure-grpc",
            ListenerName::Monitoring => "monitoring",
            ListenerName::Webhook => "webhook",
        }
    }
}

impl fmt::Display for ListenerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bound socket.
#[derive(Debug)]
pub enum Socket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// Removes a unix socket file when dropped.
#[derive(Debug)]
pub struct SocketFile(PathBuf);

impl Drop for SocketFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!(path = ?self.0, "Removed socket file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = ?self.0, error = %e, "Failed to remove socket file"),
        }
    }
}

/// A listener that has been bound but is not yet serving.
///
/// Dropping it closes the socket.
#[derive(Debug)]
pub struct BoundListener {
    name: ListenerName,
    local: BoundAddress,
    socket: Socket,
    socket_file: Option<SocketFile>,
}

impl BoundListener {
    /// Bind to the configured address.
    pub async fn bind(name: ListenerName, address: &ListenAddress) -> Result<Self, StartupError> {
        let bind_error = |source: std::io::Error| StartupError::Bind {
            listener: name,
            address: address.to_string(),
            source,
        };

        let listener = match address {
            ListenAddress::Tcp { .. } => {
                let listener = bind_tcp(&address.bind_targets()).await.map_err(bind_error)?;
                let local = listener.local_addr().map_err(bind_error)?;
                Self {
                    name,
                    local: BoundAddress::Tcp(local),
                    socket: Socket::Tcp(listener),
                    socket_file: None,
                }
            }
            #[cfg(unix)]
            ListenAddress::Unix(path) => {
                let listener = UnixListener::bind(path).map_err(bind_error)?;
                Self {
                    name,
                    local: BoundAddress::Unix(path.clone()),
                    socket: Socket::Unix(listener),
                    socket_file: Some(SocketFile(path.clone())),
                }
            }
            #[cfg(not(unix))]
            ListenAddress::Unix(_) => {
                return Err(bind_error(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix sockets are not supported on this platform",
                )));
            }
        };

        tracing::info!(
            listener = %name,
            address = %listener.local,
            "Listener bound"
        );

        Ok(listener)
    }

    pub fn name(&self) -> ListenerName {
        self.name
    }

    /// Get the address this listener is bound to.
    pub fn local_addr(&self) -> &BoundAddress {
        &self.local
    }

    /// Split into the socket and the guard that cleans up its file.
    pub fn into_parts(self) -> (Socket, Option<SocketFile>) {
        (self.socket, self.socket_file)
    }
}

/// Bind the first target that works. Only "address family unavailable"
/// style errors move on to the next target; a busy port is final.
async fn bind_tcp(targets: &[String]) -> std::io::Result<TcpListener> {
    let mut last_error = None;
    for target in targets {
        match TcpListener::bind(target.as_str()).await {
            Ok(listener) => return Ok(listener),
            Err(e) if is_final(&e) => return Err(e),
            Err(e) => {
                tracing::debug!(target = %target, error = %e, "Bind target unavailable");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address to bind")
    }))
}

fn is_final(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::AddrInUse | std::io::ErrorKind::PermissionDenied
    )
}

//! Listener address syntax.
//!
//! Accepted forms:
//! - `host:port`, `:port`, `[::1]:port`
//! - `http://host[:port]`
//! - `unix:///absolute/path/to/socket`

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;
use url::Url;

/// Error for an address that is not a valid network or socket address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("missing port in {0:?}")]
    MissingPort(String),
    #[error("invalid port in {0:?}")]
    InvalidPort(String),
    #[error("invalid host in {0:?}")]
    InvalidHost(String),
    #[error("unix socket path must be absolute, got {0:?}")]
    RelativeSocketPath(String),
    #[error("unsupported address {0:?}")]
    Unsupported(String),
}

/// A configured, not yet bound, listener address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    /// TCP address. `host == None` means all interfaces.
    Tcp { host: Option<String>, port: u16 },
    /// Local (unix domain) socket.
    Unix(PathBuf),
}

impl ListenAddress {
    /// TCP address on all interfaces.
    pub fn any(port: u16) -> Self {
        ListenAddress::Tcp { host: None, port }
    }

    /// Socket addresses to try when binding, in order.
    ///
    /// A wildcard host tries the IPv6 any-address first, which accepts IPv4
    /// too on dual-stack hosts, then falls back to IPv4 only.
    pub fn bind_targets(&self) -> Vec<String> {
        match self {
            ListenAddress::Tcp { host: None, port } => {
                vec![format!("[::]:{}", port), format!("0.0.0.0:{}", port)]
            }
            ListenAddress::Tcp {
                host: Some(host),
                port,
            } if host.contains(':') => vec![format!("[{}]:{}", host, port)],
            ListenAddress::Tcp {
                host: Some(host),
                port,
            } => vec![format!("{}:{}", host, port)],
            ListenAddress::Unix(_) => Vec::new(),
        }
    }

    /// Whether two TCP addresses would compete for the same socket.
    pub fn conflicts_with(&self, other: &ListenAddress) -> bool {
        match (self, other) {
            (
                ListenAddress::Tcp { host: h1, port: p1 },
                ListenAddress::Tcp { host: h2, port: p2 },
            ) => {
                *p1 != 0
                    && p1 == p2
                    && (h1.is_none() || h2.is_none() || h1 == h2)
            }
            (ListenAddress::Unix(a), ListenAddress::Unix(b)) => a == b,
            _ => false,
        }
    }
}

impl FromStr for ListenAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(path) = s.strip_prefix("unix://") {
            let path = Path::new(path);
            if !path.is_absolute() {
                return Err(AddressError::RelativeSocketPath(s.to_string()));
            }
            return Ok(ListenAddress::Unix(path.to_path_buf()));
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            return parse_url(s);
        }

        if s.contains("://") {
            return Err(AddressError::Unsupported(s.to_string()));
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;

        let host = if host.is_empty() {
            None
        } else if let Some(v6) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            v6.parse::<Ipv6Addr>()
                .map_err(|_| AddressError::InvalidHost(s.to_string()))?;
            Some(v6.to_string())
        } else if is_valid_host(host) {
            Some(host.to_string())
        } else {
            return Err(AddressError::InvalidHost(s.to_string()));
        };

        Ok(ListenAddress::Tcp { host, port })
    }
}

fn parse_url(s: &str) -> Result<ListenAddress, AddressError> {
    let url = Url::parse(s).map_err(|_| AddressError::InvalidHost(s.to_string()))?;
    if !matches!(url.path(), "" | "/") || url.query().is_some() {
        return Err(AddressError::Unsupported(s.to_string()));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AddressError::InvalidHost(s.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url
        .port_or_known_default()
        .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
    Ok(ListenAddress::Tcp {
        host: Some(host.to_string()),
        port,
    })
}

fn is_valid_host(host: &str) -> bool {
    if host.parse::<Ipv4Addr>().is_ok() {
        return true;
    }
    host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Tcp { host: None, port } => write!(f, ":{}", port),
            ListenAddress::Tcp {
                host: Some(host),
                port,
            } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            ListenAddress::Tcp {
                host: Some(host),
                port,
            } => write!(f, "{}:{}", host, port),
            ListenAddress::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Serialize for ListenAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The address a listener actually ended up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundAddress {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl BoundAddress {
    pub fn port(&self) -> Option<u16> {
        match self {
            BoundAddress::Tcp(addr) => Some(addr.port()),
            BoundAddress::Unix(_) => None,
        }
    }
}

impl fmt::Display for BoundAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundAddress::Tcp(addr) => write!(f, "{}", addr),
            BoundAddress::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Serialize for BoundAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_style_wildcard() {
        assert_eq!(":15010".parse(), Ok(ListenAddress::any(15010)));
    }

    #[test]
    fn wildcard_prefers_dual_stack() {
        assert_eq!(
            ListenAddress::any(15010).bind_targets(),
            vec!["[::]:15010", "0.0.0.0:15010"]
        );
        let local: ListenAddress = "127.0.0.1:15010".parse().unwrap();
        assert_eq!(local.bind_targets(), vec!["127.0.0.1:15010"]);
        assert!(ListenAddress::Unix("/tmp/x.sock".into()).bind_targets().is_empty());
    }

    #[test]
    fn parses_host_and_ipv6() {
        assert_eq!(
            "localhost:8080".parse(),
            Ok(ListenAddress::Tcp {
                host: Some("localhost".into()),
                port: 8080
            })
        );
        let v6: ListenAddress = "[::1]:9093".parse().unwrap();
        assert_eq!(v6.bind_targets(), vec!["[::1]:9093"]);
        assert_eq!(v6.to_string(), "[::1]:9093");
    }

    #[test]
    fn parses_http_and_unix_forms() {
        assert_eq!(
            "http://sockethost".parse(),
            Ok(ListenAddress::Tcp {
                host: Some("sockethost".into()),
                port: 80
            })
        );
        assert_eq!(
            "unix:///var/run/pilot/webhook.sock".parse(),
            Ok(ListenAddress::Unix("/var/run/pilot/webhook.sock".into()))
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!("".parse::<ListenAddress>(), Err(AddressError::Empty));
        assert!(matches!(
            "localhost".parse::<ListenAddress>(),
            Err(AddressError::MissingPort(_))
        ));
        assert!(matches!(
            ":99999".parse::<ListenAddress>(),
            Err(AddressError::InvalidPort(_))
        ));
        assert!(matches!(
            "bad host:80".parse::<ListenAddress>(),
            Err(AddressError::InvalidHost(_))
        ));
        assert!(matches!(
            "unix://relative.sock".parse::<ListenAddress>(),
            Err(AddressError::RelativeSocketPath(_))
        ));
        assert!(matches!(
            "tcp://host:1".parse::<ListenAddress>(),
            Err(AddressError::Unsupported(_))
        ));
    }

    #[test]
    fn conflicts_only_on_explicit_shared_ports() {
        let any = ListenAddress::any(8080);
        let local: ListenAddress = "127.0.0.1:8080".parse().unwrap();
        let other: ListenAddress = "127.0.0.2:8080".parse().unwrap();
        assert!(any.conflicts_with(&local));
        assert!(!local.conflicts_with(&other));
        assert!(!ListenAddress::any(0).conflicts_with(&ListenAddress::any(0)));
    }
}

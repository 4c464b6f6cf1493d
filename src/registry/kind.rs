//! Supported registry backends.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// A platform service registry the discovery service can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RegistryKind {
    Kubernetes,
    Consul,
    Eureka,
    CloudFoundry,
    Mock,
}

impl RegistryKind {
    /// Every supported kind, in help-text order.
    pub const ALL: [RegistryKind; 5] = [
        RegistryKind::Kubernetes,
        RegistryKind::Consul,
        RegistryKind::Eureka,
        RegistryKind::CloudFoundry,
        RegistryKind::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Kubernetes => "Kubernetes",
            RegistryKind::Consul => "Consul",
            RegistryKind::Eureka => "Eureka",
            RegistryKind::CloudFoundry => "CloudFoundry",
            RegistryKind::Mock => "Mock",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a registry name that matches no known kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRegistry(pub String);

impl fmt::Display for UnknownRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown registry kind {:?}", self.0)
    }
}

impl std::error::Error for UnknownRegistry {}

impl FromStr for RegistryKind {
    type Err = UnknownRegistry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        RegistryKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownRegistry(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("kubernetes".parse(), Ok(RegistryKind::Kubernetes));
        assert_eq!(" CloudFoundry ".parse(), Ok(RegistryKind::CloudFoundry));
        assert_eq!("MOCK".parse(), Ok(RegistryKind::Mock));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "Zookeeper".parse::<RegistryKind>().unwrap_err();
        assert_eq!(err, UnknownRegistry("Zookeeper".into()));
    }

    #[test]
    fn display_round_trips() {
        for kind in RegistryKind::ALL {
            assert_eq!(kind.to_string().parse(), Ok(kind));
        }
    }
}

//! Error taxonomy for the discovery process.
//!
//! # Categories
//! - `ConfigError`: bad or inconsistent options, found before any resource is acquired
//! - `StartupError`: construction or bind failure; partial resources are released first
//! - `ShutdownError`: best-effort teardown problems, logged but never fatal

use std::path::PathBuf;

use thiserror::Error;

use crate::config::validation::ValidationError;
use crate::lifecycle::state::LifecycleState;
use crate::mesh::MeshError;
use crate::net::ListenerName;
use crate::registry::RegistryKind;

/// Invalid user-supplied configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<ValidationError>),
}

impl ConfigError {
    /// All validation problems found in one pass.
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ConfigError::Invalid(errors) => errors,
        }
    }
}

/// Failure while constructing or starting the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load mesh config {path:?}: {source}")]
    MeshConfig {
        path: PathBuf,
        #[source]
        source: MeshError,
    },

    #[error("failed to create {kind} registry: {reason}")]
    Registry { kind: RegistryKind, reason: String },

    #[error("failed to create config controller: {0}")]
    Controller(String),

    #[error("failed to load TLS material from {dir:?}: {source}")]
    Tls {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {listener} listener on {address}: {source}")]
    Bind {
        listener: ListenerName,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server cannot start from state {0:?}")]
    InvalidState(LifecycleState),
}

/// Problems encountered while tearing the server down.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("shutdown incomplete: {}", .0.join(", "))]
    Incomplete(Vec<String>),
}

/// Top-level error surfaced by the `discovery` command.
#[derive(Debug, Error)]
pub enum PilotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create discovery service: {0}")]
    Construct(#[source] StartupError),

    #[error("failed to start discovery service: {0}")]
    Start(#[source] StartupError),

    #[error("discovery service failed: {0}")]
    Fatal(String),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("failed to configure logging: {0}")]
    Logging(String),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_lists_every_problem() {
        let err = ConfigError::Invalid(vec![
            ValidationError::new("registries", "must not be empty"),
            ValidationError::new("resync", "must be greater than zero"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("registries: must not be empty"));
        assert!(msg.contains("resync: must be greater than zero"));
        assert_eq!(err.errors().len(), 2);
    }
}

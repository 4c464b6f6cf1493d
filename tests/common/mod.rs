//! Shared utilities for lifecycle integration tests.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pilot_discovery::config::{parse, RegistryOptions};
use pilot_discovery::error::StartupError;
use pilot_discovery::net::BoundAddress;
use pilot_discovery::registry::{RegistryFactory, RegistryKind, ServiceRegistry};
use pilot_discovery::{RuntimeConfiguration, Shutdown};
use serde_json::json;
use tempfile::TempDir;

/// Scratch directory holding a mesh config file.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mesh.toml"), "proxy_listen_port = 15001\n").unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn mesh_config(&self) -> PathBuf {
        self.dir.path().join("mesh.toml")
    }

    /// Arguments that keep every listener on an ephemeral loopback port.
    /// Each `(flag, value)` override replaces the default for that flag.
    pub fn args(&self, overrides: &[(&str, &str)]) -> Vec<String> {
        self.args_without(&[], overrides)
    }

    /// Like `args`, with the flags in `omit` left out entirely.
    pub fn args_without(&self, omit: &[&str], overrides: &[(&str, &str)]) -> Vec<String> {
        let mesh = self.mesh_config().display().to_string();
        let certs = self.dir.path().join("certs").display().to_string();
        let mut flags: Vec<(String, String)> = [
            ("--registries", "Mock"),
            ("--namespace", "pilot-test"),
            ("--port", "0"),
            ("--grpcAddr", "127.0.0.1:0"),
            ("--secureGrpcAddr", "127.0.0.1:0"),
            ("--monitoringPort", "0"),
            ("--shutdownTimeout", "2s"),
            ("--meshConfig", mesh.as_str()),
            ("--certDir", certs.as_str()),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        for (flag, value) in overrides {
            match flags.iter_mut().find(|(k, _)| k == flag) {
                Some(entry) => entry.1 = value.to_string(),
                None => flags.push((flag.to_string(), value.to_string())),
            }
        }

        flags.retain(|(flag, _)| !omit.contains(&flag.as_str()));

        let mut args = vec!["discovery".to_string()];
        for (flag, value) in flags {
            args.push(format!("{}={}", flag, value));
        }
        args
    }

    pub fn config(&self, overrides: &[(&str, &str)]) -> RuntimeConfiguration {
        parse(self.args(overrides)).unwrap()
    }

    /// Copy the test certificate and key into the cert dir used by `args`.
    pub fn install_certificates(&self) {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/certs");
        let certs = self.dir.path().join("certs");
        std::fs::create_dir_all(&certs).unwrap();
        for file in ["cert-chain.pem", "key.pem"] {
            std::fs::copy(fixtures.join(file), certs.join(file)).unwrap();
        }
    }
}

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Loopback address for a listener bound on a wildcard or loopback host.
pub fn loopback(bound: &BoundAddress) -> SocketAddr {
    let port = bound.port().unwrap();
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Ordered record of what scripted registries did.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Registry factory whose adapters fail on demand.
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    /// This kind refuses to start.
    pub fail_start: Option<RegistryKind>,
    /// This kind starts, then reports a fatal error after the delay.
    pub fail_after_start: Option<(RegistryKind, Duration)>,
    pub journal: Journal,
}

impl RegistryFactory for ScriptedFactory {
    fn build(
        &self,
        kind: RegistryKind,
        _options: &RegistryOptions,
        _config: &RuntimeConfiguration,
    ) -> Result<Box<dyn ServiceRegistry>, StartupError> {
        Ok(Box::new(ScriptedRegistry {
            kind,
            fail_start: self.fail_start == Some(kind),
            fail_after: self
                .fail_after_start
                .filter(|(failing, _)| *failing == kind)
                .map(|(_, delay)| delay),
            journal: self.journal.clone(),
        }))
    }
}

struct ScriptedRegistry {
    kind: RegistryKind,
    fail_start: bool,
    fail_after: Option<Duration>,
    journal: Journal,
}

impl ServiceRegistry for ScriptedRegistry {
    fn kind(&self) -> RegistryKind {
        self.kind
    }

    fn start(&self, shutdown: &Shutdown) -> Result<(), StartupError> {
        if self.fail_start {
            return Err(StartupError::Registry {
                kind: self.kind,
                reason: "registry unreachable".to_string(),
            });
        }
        self.journal.record(format!("start {}", self.kind));

        if let Some(delay) = self.fail_after {
            let shutdown = shutdown.clone();
            let kind = self.kind;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                shutdown.fail(format!("{} registry lost its connection", kind));
            });
        }
        Ok(())
    }

    fn stop(&self) {
        self.journal.record(format!("stop {}", self.kind));
    }

    fn describe(&self) -> serde_json::Value {
        json!({ "kind": self.kind })
    }
}

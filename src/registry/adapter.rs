//! Registry adapters.
//!
//! The discovery logic of each platform lives behind `ServiceRegistry`; this
//! crate only owns when adapters are built, started and stopped.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;

use crate::config::schema::{RegistryOptions, RuntimeConfiguration};
use crate::error::StartupError;
use crate::lifecycle::shutdown::Shutdown;
use crate::registry::RegistryKind;

/// A running connection to one platform service registry.
pub trait ServiceRegistry: Send + Sync {
    fn kind(&self) -> RegistryKind;

    /// Begin discovery. An adapter that hits an unrecoverable error later on
    /// calls `shutdown.fail` so the whole process exits with that error.
    fn start(&self, shutdown: &Shutdown) -> Result<(), StartupError>;

    /// Release resources. Must tolerate repeated calls.
    fn stop(&self);

    /// Summary for the debug endpoints.
    fn describe(&self) -> serde_json::Value;
}

/// Builds adapters from configuration.
pub trait RegistryFactory: Send + Sync {
    fn build(
        &self,
        kind: RegistryKind,
        options: &RegistryOptions,
        config: &RuntimeConfiguration,
    ) -> Result<Box<dyn ServiceRegistry>, StartupError>;
}

/// Factory for the built-in platform adapters.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRegistryFactory;

impl RegistryFactory for DefaultRegistryFactory {
    fn build(
        &self,
        kind: RegistryKind,
        options: &RegistryOptions,
        _config: &RuntimeConfiguration,
    ) -> Result<Box<dyn ServiceRegistry>, StartupError> {
        let fail = |reason: String| StartupError::Registry { kind, reason };

        let endpoint = match options {
            RegistryOptions::Kubernetes(k8s) => match &k8s.kubeconfig {
                Some(path) => {
                    require_file(path).map_err(fail)?;
                    format!("kubeconfig:{}", path.display())
                }
                None => "in-cluster".to_string(),
            },
            RegistryOptions::Polling(polling) => {
                let url = polling
                    .server_url
                    .as_ref()
                    .ok_or_else(|| fail("server URL is required".to_string()))?;
                format!("{} every {:?}", url, polling.interval)
            }
            RegistryOptions::CloudFoundry(cf) => {
                let path = cf
                    .config_file
                    .as_ref()
                    .ok_or_else(|| fail("config file is required (--cfConfig)".to_string()))?;
                require_file(path).map_err(fail)?;
                format!("config:{}", path.display())
            }
            RegistryOptions::Mock => "mock".to_string(),
        };

        tracing::debug!(registry = %kind, endpoint = %endpoint, "Registry adapter created");
        Ok(Box::new(PlatformRegistry {
            kind,
            endpoint,
            running: AtomicBool::new(false),
        }))
    }
}

fn require_file(path: &Path) -> Result<(), String> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(format!("{} is not a file", path.display())),
        Err(e) => Err(format!("{}: {}", path.display(), e)),
    }
}

/// Built-in adapter tracking one platform endpoint.
#[derive(Debug)]
struct PlatformRegistry {
    kind: RegistryKind,
    endpoint: String,
    running: AtomicBool,
}

impl ServiceRegistry for PlatformRegistry {
    fn kind(&self) -> RegistryKind {
        self.kind
    }

    fn start(&self, _shutdown: &Shutdown) -> Result<(), StartupError> {
        if !self.running.swap(true, Ordering::SeqCst) {
            tracing::info!(registry = %self.kind, endpoint = %self.endpoint, "Registry started");
        }
        Ok(())
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!(registry = %self.kind, "Registry stopped");
        }
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "kind": self.kind,
            "endpoint": self.endpoint,
            "running": self.running.load(Ordering::SeqCst),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CloudFoundryOptions, PollingOptions};
    use std::time::Duration;

    fn config() -> RuntimeConfiguration {
        crate::config::parse(["discovery", "--registries", "Mock"]).unwrap()
    }

    #[test]
    fn polling_registry_requires_url() {
        let options = RegistryOptions::Polling(PollingOptions {
            server_url: None,
            interval: Duration::from_secs(2),
        });
        let err = DefaultRegistryFactory
            .build(RegistryKind::Consul, &options, &config())
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Registry { kind: RegistryKind::Consul, .. }));
    }

    #[test]
    fn cloud_foundry_requires_readable_config() {
        let options = RegistryOptions::CloudFoundry(CloudFoundryOptions {
            config_file: Some("/nonexistent/cf.yaml".into()),
        });
        assert!(DefaultRegistryFactory
            .build(RegistryKind::CloudFoundry, &options, &config())
            .is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        let options = RegistryOptions::CloudFoundry(CloudFoundryOptions {
            config_file: Some(file.path().to_path_buf()),
        });
        assert!(DefaultRegistryFactory
            .build(RegistryKind::CloudFoundry, &options, &config())
            .is_ok());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let registry = DefaultRegistryFactory
            .build(RegistryKind::Mock, &RegistryOptions::Mock, &config())
            .unwrap();
        let shutdown = Shutdown::new();

        registry.start(&shutdown).unwrap();
        registry.start(&shutdown).unwrap();
        assert_eq!(registry.describe()["running"], true);

        registry.stop();
        registry.stop();
        assert_eq!(registry.describe()["running"], false);
        assert!(!shutdown.is_triggered());
    }
}

//! Runtime configuration schema.
//!
//! Every type here is produced by `loader.rs` from command-line options and is
//! read-only afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::net::{ListenAddress, ListenerName};
use crate::registry::RegistryKind;

pub const DEFAULT_MESH_CONFIG: &str = "/etc/istio/config/mesh";
pub const DEFAULT_NAMESPACE: &str = "istio-system";
pub const DEFAULT_DOMAIN_SUFFIX: &str = "cluster.local";
pub const DEFAULT_CERT_DIR: &str = "/etc/certs";

/// Validated configuration for one discovery process.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfiguration {
    /// Registries to read from, ordered and distinct.
    pub registries: Vec<RegistryKind>,

    /// Namespace the controller resides in.
    pub namespace: String,

    /// Where Istio config resources come from.
    pub config_source: ConfigSource,

    /// Mesh configuration file. Read at construction time.
    pub mesh_config_path: PathBuf,

    /// Backend settings, present only for selected registries.
    pub per_registry: BTreeMap<RegistryKind, RegistryOptions>,

    /// Listener addresses; `None` disables a listener.
    pub listeners: ListenerAddresses,

    /// TLS material for the secure gRPC listener.
    pub tls: TlsConfig,

    pub features: FeatureToggles,

    /// Deadline for listener tasks to drain on stop.
    pub shutdown_timeout: Duration,

    pub logging: LoggingOptions,
}

impl RuntimeConfiguration {
    /// Options for a selected registry.
    pub fn registry_options(&self, kind: RegistryKind) -> Option<&RegistryOptions> {
        self.per_registry.get(&kind)
    }
}

/// Source of config resources. The two modes are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Cluster CRD client.
    Crd(CrdOptions),
    /// Watch a directory of config files.
    FileDir(PathBuf),
}

/// CRD client settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrdOptions {
    pub kubeconfig: Option<PathBuf>,
    pub resync_period: Duration,
    pub domain_suffix: String,
    /// `None` watches all namespaces.
    pub watched_namespace: Option<String>,
}

/// Backend-specific registry settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryOptions {
    Kubernetes(KubernetesOptions),
    Polling(PollingOptions),
    CloudFoundry(CloudFoundryOptions),
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KubernetesOptions {
    pub kubeconfig: Option<PathBuf>,
    pub cluster_registries_configmap: Option<String>,
    pub cluster_registries_namespace: String,
}

/// Settings for registries discovered by polling a server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollingOptions {
    pub server_url: Option<Url>,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudFoundryOptions {
    pub config_file: Option<PathBuf>,
}

/// Named listener addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListenerAddresses {
    pub discovery: Option<ListenAddress>,
    pub grpc: Option<ListenAddress>,
    pub secure_grpc: Option<ListenAddress>,
    pub monitoring: Option<ListenAddress>,
    pub webhook: Option<ListenAddress>,
}

impl ListenerAddresses {
    /// Configured listeners in bind order.
    pub fn iter(&self) -> impl Iterator<Item = (ListenerName, &ListenAddress)> {
        [
            (ListenerName::Discovery, self.discovery.as_ref()),
            (ListenerName::Grpc, self.grpc.as_ref()),
            (ListenerName::SecureGrpc, self.secure_grpc.as_ref()),
            (ListenerName::Monitoring, self.monitoring.as_ref()),
            (ListenerName::Webhook, self.webhook.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, addr)| addr.map(|a| (name, a)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsConfig {
    pub cert_dir: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
        }
    }
}

/// Switches applied regardless of registry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureToggles {
    /// Expose debug endpoints on the discovery listener.
    pub profiling: bool,
    /// Allow clients to cache discovery responses.
    pub response_caching: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            profiling: true,
            response_caching: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingOptions {
    /// `tracing` filter directive, e.g. `info` or `pilot_discovery=debug`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

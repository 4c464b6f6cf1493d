//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::schema::{
    DEFAULT_CERT_DIR, DEFAULT_DOMAIN_SUFFIX, DEFAULT_MESH_CONFIG, DEFAULT_NAMESPACE,
};

#[derive(Parser, Debug)]
#[command(name = "pilot-discovery")]
#[command(about = "Istio Pilot")]
#[command(
    long_about = "Istio Pilot provides fleet-wide traffic management capabilities in the Istio Service Mesh."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start Istio proxy discovery service
    Discovery(DiscoveryArgs),
    /// Print the version
    Version,
}

/// Raw options of the `discovery` command.
///
/// Durations and addresses stay as strings so that every problem can be
/// reported together by the loader.
#[derive(Args, Debug, Clone)]
pub struct DiscoveryArgs {
    /// Comma separated list of platform service registries to read from
    /// (choose one or more from {Kubernetes, Consul, Eureka, CloudFoundry, Mock})
    #[arg(long, value_delimiter = ',', default_value = "Kubernetes")]
    pub registries: Vec<String>,

    /// Cloud Foundry config file
    #[arg(long = "cfConfig", default_value = "")]
    pub cf_config: String,

    /// ConfigMap map for clusters config store
    #[arg(long = "clusterRegistriesConfigMap", default_value = "")]
    pub cluster_registries_configmap: String,

    /// Namespace for ConfigMap which stores clusters configs
    #[arg(long = "clusterRegistriesNamespace", default_value = DEFAULT_NAMESPACE)]
    pub cluster_registries_namespace: String,

    /// Use a Kubernetes configuration file instead of in-cluster configuration
    #[arg(long, default_value = "")]
    pub kubeconfig: String,

    /// File name for Istio mesh configuration
    #[arg(long = "meshConfig", default_value = DEFAULT_MESH_CONFIG)]
    pub mesh_config: PathBuf,

    /// Select a namespace where the controller resides. If not set, uses
    /// ${POD_NAMESPACE} environment variable
    #[arg(short = 'n', long, env = "POD_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Directory to watch for updates to config yaml files. If specified, the
    /// files will be used as the source of config, rather than a CRD client
    #[arg(long = "configDir", default_value = "")]
    pub config_dir: String,

    /// Restrict the applications namespace the controller manages; if not set,
    /// controller watches all namespaces
    #[arg(short = 'a', long = "appNamespace", default_value = "")]
    pub app_namespace: String,

    /// Controller resync interval
    #[arg(long, default_value = "60s")]
    pub resync: String,

    /// DNS domain suffix
    #[arg(long, default_value = DEFAULT_DOMAIN_SUFFIX)]
    pub domain: String,

    /// URL for the Consul server
    #[arg(long = "consulserverURL", default_value = "")]
    pub consul_server_url: String,

    /// Interval for polling the Consul service registry
    #[arg(long = "consulserverInterval", default_value = "2s")]
    pub consul_server_interval: String,

    /// URL for the Eureka server
    #[arg(long = "eurekaserverURL", default_value = "")]
    pub eureka_server_url: String,

    /// Interval for polling the Eureka service registry
    #[arg(long = "eurekaserverInterval", default_value = "2s")]
    pub eureka_server_interval: String,

    /// Discovery service port (negative disables)
    #[arg(long, default_value_t = 8080, allow_negative_numbers = true)]
    pub port: i32,

    /// Discovery service grpc address
    #[arg(long = "grpcAddr", default_value = ":15010")]
    pub grpc_addr: String,

    /// Discovery service grpc address, with https
    #[arg(long = "secureGrpcAddr", default_value = ":15012")]
    pub secure_grpc_addr: String,

    /// HTTP port to use for the exposing pilot self-monitoring information
    /// (negative disables)
    #[arg(long = "monitoringPort", default_value_t = 9093, allow_negative_numbers = true)]
    pub monitoring_port: i32,

    /// Enable debug endpoints via web interface host:port/debug
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub profile: bool,

    /// Enable caching discovery service responses
    #[arg(long = "discovery_cache", default_value_t = true, action = clap::ArgAction::Set)]
    pub discovery_cache: bool,

    /// Webhook API endpoint (supports http://sockethost, and
    /// unix:///absolute/path/to/socket)
    #[arg(long = "webhookEndpoint", default_value = "")]
    pub webhook_endpoint: String,

    /// Directory holding cert-chain.pem and key.pem for the secure grpc listener
    #[arg(long = "certDir", default_value = DEFAULT_CERT_DIR)]
    pub cert_dir: PathBuf,

    /// Time allowed for listeners to drain on shutdown
    #[arg(long = "shutdownTimeout", default_value = "10s")]
    pub shutdown_timeout: String,

    /// Minimum log level (a tracing filter directive)
    #[arg(long = "log_output_level", default_value = "info")]
    pub log_output_level: String,

    /// Emit logs as JSON
    #[arg(long = "log_as_json")]
    pub log_as_json: bool,
}

/// Standalone parser for the options of the `discovery` command.
#[derive(Parser, Debug)]
#[command(name = "discovery")]
pub struct DiscoveryCommand {
    #[command(flatten)]
    pub args: DiscoveryArgs,
}

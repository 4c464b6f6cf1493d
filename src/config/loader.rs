//! Assemble a `RuntimeConfiguration` from command-line options.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::config::cli::{DiscoveryArgs, DiscoveryCommand};
use crate::config::schema::{
    CloudFoundryOptions, ConfigSource, CrdOptions, FeatureToggles, KubernetesOptions,
    ListenerAddresses, LoggingOptions, PollingOptions, RegistryOptions, RuntimeConfiguration,
    TlsConfig, DEFAULT_NAMESPACE,
};
use crate::config::validation::{parse_duration, validate_config, ValidationError};
use crate::error::ConfigError;
use crate::net::ListenAddress;
use crate::registry::{self, RegistryKind};

const DEFAULT_RESYNC: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Parse raw `discovery` arguments (first item is the command name).
pub fn parse<I, T>(raw: I) -> Result<RuntimeConfiguration, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cmd = DiscoveryCommand::try_parse_from(raw).map_err(|e| {
        ConfigError::Invalid(vec![ValidationError::new(
            "arguments",
            e.render().to_string().trim().to_string(),
        )])
    })?;
    RuntimeConfiguration::from_args(cmd.args)
}

impl RuntimeConfiguration {
    /// Apply defaults and validate. All problems are reported together.
    pub fn from_args(args: DiscoveryArgs) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();

        let registries = match registry::resolve(&args.registries) {
            Ok(kinds) => kinds,
            Err(e) => {
                errors.extend_from_slice(e.errors());
                Vec::new()
            }
        };

        let namespace = non_empty(&args.namespace).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let config_source = match non_empty(&args.config_dir) {
            Some(dir) => ConfigSource::FileDir(PathBuf::from(dir)),
            None => ConfigSource::Crd(CrdOptions {
                kubeconfig: non_empty(&args.kubeconfig).map(PathBuf::from),
                resync_period: duration("resync", &args.resync, DEFAULT_RESYNC, &mut errors),
                domain_suffix: args.domain.trim().to_string(),
                watched_namespace: non_empty(&args.app_namespace),
            }),
        };

        let mut per_registry = BTreeMap::new();
        for kind in &registries {
            let options = match kind {
                RegistryKind::Kubernetes => RegistryOptions::Kubernetes(KubernetesOptions {
                    kubeconfig: non_empty(&args.kubeconfig).map(PathBuf::from),
                    cluster_registries_configmap: non_empty(&args.cluster_registries_configmap),
                    cluster_registries_namespace: non_empty(&args.cluster_registries_namespace)
                        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
                }),
                RegistryKind::Consul => RegistryOptions::Polling(PollingOptions {
                    server_url: server_url("consulserverURL", &args.consul_server_url, &mut errors),
                    interval: duration(
                        "consulserverInterval",
                        &args.consul_server_interval,
                        DEFAULT_POLL_INTERVAL,
                        &mut errors,
                    ),
                }),
                RegistryKind::Eureka => RegistryOptions::Polling(PollingOptions {
                    server_url: server_url("eurekaserverURL", &args.eureka_server_url, &mut errors),
                    interval: duration(
                        "eurekaserverInterval",
                        &args.eureka_server_interval,
                        DEFAULT_POLL_INTERVAL,
                        &mut errors,
                    ),
                }),
                RegistryKind::CloudFoundry => RegistryOptions::CloudFoundry(CloudFoundryOptions {
                    config_file: non_empty(&args.cf_config).map(PathBuf::from),
                }),
                RegistryKind::Mock => RegistryOptions::Mock,
            };
            per_registry.insert(*kind, options);
        }

        let listeners = ListenerAddresses {
            discovery: port_address("port", args.port, &mut errors),
            grpc: address("grpcAddr", &args.grpc_addr, &mut errors),
            secure_grpc: address("secureGrpcAddr", &args.secure_grpc_addr, &mut errors),
            monitoring: port_address("monitoringPort", args.monitoring_port, &mut errors),
            webhook: address("webhookEndpoint", &args.webhook_endpoint, &mut errors),
        };

        let shutdown_timeout = duration(
            "shutdownTimeout",
            &args.shutdown_timeout,
            DEFAULT_SHUTDOWN_TIMEOUT,
            &mut errors,
        );

        let config = RuntimeConfiguration {
            registries,
            namespace,
            config_source,
            mesh_config_path: args.mesh_config,
            per_registry,
            listeners,
            tls: TlsConfig {
                cert_dir: args.cert_dir,
            },
            features: FeatureToggles {
                profiling: args.profile,
                response_caching: args.discovery_cache,
            },
            shutdown_timeout,
            logging: LoggingOptions {
                level: args.log_output_level.trim().to_string(),
                json: args.log_as_json,
            },
        };

        // Fields that already failed to parse carry placeholders; don't report them twice.
        if let Err(semantic) = validate_config(&config) {
            let reported: Vec<String> = errors.iter().map(|e| e.field.clone()).collect();
            errors.extend(semantic.into_iter().filter(|e| !reported.contains(&e.field)));
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn duration(
    field: &str,
    value: &str,
    fallback: Duration,
    errors: &mut Vec<ValidationError>,
) -> Duration {
    match parse_duration(value) {
        Ok(d) if d.is_zero() => {
            errors.push(ValidationError::new(field, "must be greater than zero"));
            fallback
        }
        Ok(d) => d,
        Err(e) => {
            errors.push(ValidationError::new(field, e));
            fallback
        }
    }
}

fn server_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) -> Option<Url> {
    let value = non_empty(value)?;
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Some(url),
        Ok(_) => {
            errors.push(ValidationError::new(field, format!("{:?} must be an http(s) URL", value)));
            None
        }
        Err(e) => {
            errors.push(ValidationError::new(field, format!("{:?}: {}", value, e)));
            None
        }
    }
}

fn address(field: &str, value: &str, errors: &mut Vec<ValidationError>) -> Option<ListenAddress> {
    let value = non_empty(value)?;
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::new(field, e.to_string()));
            None
        }
    }
}

fn port_address(field: &str, port: i32, errors: &mut Vec<ValidationError>) -> Option<ListenAddress> {
    if port < 0 {
        return None;
    }
    match u16::try_from(port) {
        Ok(port) => Some(ListenAddress::any(port)),
        Err(_) => {
            errors.push(ValidationError::new(field, format!("{} is out of range", port)));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(extra: &[&str]) -> RuntimeConfiguration {
        let mut raw = vec!["discovery", "--namespace", "istio-system"];
        raw.extend_from_slice(extra);
        parse(raw).unwrap()
    }

    fn fields(err: ConfigError) -> Vec<String> {
        err.errors().iter().map(|e| e.field.clone()).collect()
    }

    #[test]
    fn defaults_match_command_documentation() {
        let config = parse_ok(&[]);
        assert_eq!(config.registries, vec![RegistryKind::Kubernetes]);
        assert_eq!(config.mesh_config_path, PathBuf::from("/etc/istio/config/mesh"));
        assert_eq!(config.listeners.discovery, Some(ListenAddress::any(8080)));
        assert_eq!(config.listeners.grpc, Some(ListenAddress::any(15010)));
        assert_eq!(config.listeners.secure_grpc, Some(ListenAddress::any(15012)));
        assert_eq!(config.listeners.monitoring, Some(ListenAddress::any(9093)));
        assert_eq!(config.listeners.webhook, None);
        assert!(config.features.profiling);
        assert!(config.features.response_caching);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));

        let ConfigSource::Crd(crd) = &config.config_source else {
            panic!("expected CRD source");
        };
        assert_eq!(crd.resync_period, Duration::from_secs(60));
        assert_eq!(crd.domain_suffix, "cluster.local");
        assert_eq!(crd.watched_namespace, None);
    }

    #[test]
    fn options_only_for_selected_registries() {
        let config = parse_ok(&[
            "--registries",
            "Consul,Mock",
            "--consulserverURL",
            "http://127.0.0.1:8500",
            "--eurekaserverURL",
            "http://eureka:8761",
        ]);
        assert_eq!(config.per_registry.len(), 2);
        assert!(config.registry_options(RegistryKind::Eureka).is_none());
        let Some(RegistryOptions::Polling(consul)) = config.registry_options(RegistryKind::Consul) else {
            panic!("expected polling options");
        };
        assert_eq!(consul.server_url.as_ref().unwrap().as_str(), "http://127.0.0.1:8500/");
        assert_eq!(consul.interval, Duration::from_secs(2));
    }

    #[test]
    fn config_dir_selects_file_source() {
        let config = parse_ok(&["--configDir", "/etc/pilot/config", "--resync", "bogus"]);
        assert_eq!(
            config.config_source,
            ConfigSource::FileDir(PathBuf::from("/etc/pilot/config"))
        );
    }

    #[test]
    fn empty_or_negative_disables_listeners() {
        let config = parse_ok(&["--grpcAddr", "", "--secureGrpcAddr", "", "--monitoringPort", "-1"]);
        assert_eq!(config.listeners.grpc, None);
        assert_eq!(config.listeners.secure_grpc, None);
        assert_eq!(config.listeners.monitoring, None);
        assert_eq!(config.listeners.iter().count(), 1);
    }

    #[test]
    fn collects_every_problem() {
        let err = parse([
            "discovery",
            "--registries",
            "Unknown",
            "--resync",
            "0s",
            "--grpcAddr",
            "nohost",
            "--port",
            "70000",
            "--shutdownTimeout",
            "10",
        ])
        .unwrap_err();
        let fields = fields(err);
        assert!(fields.contains(&"registries".to_string()));
        assert!(fields.contains(&"resync".to_string()));
        assert!(fields.contains(&"grpcAddr".to_string()));
        assert!(fields.contains(&"port".to_string()));
        assert!(fields.contains(&"shutdownTimeout".to_string()));
        // registries reported once, not again by the semantic pass
        assert_eq!(fields.iter().filter(|f| *f == "registries").count(), 1);
    }

    #[test]
    fn rejects_conflicting_listener_ports() {
        let err = parse(["discovery", "--port", "15010"]).unwrap_err();
        assert_eq!(fields(err), vec!["listeners".to_string()]);
    }

    #[test]
    fn rejects_non_http_registry_url() {
        let err = parse([
            "discovery",
            "--registries",
            "Eureka",
            "--eurekaserverURL",
            "ftp://eureka",
        ])
        .unwrap_err();
        assert_eq!(fields(err), vec!["eurekaserverURL".to_string()]);
    }

    #[test]
    fn unknown_flag_is_invalid_config() {
        let err = parse(["discovery", "--no-such-flag"]).unwrap_err();
        assert_eq!(fields(err), vec!["arguments".to_string()]);
    }

    #[test]
    fn invalid_log_level_is_reported() {
        let err = parse(["discovery", "--log_output_level", "pilot=verbose"]).unwrap_err();
        assert_eq!(fields(err), vec!["log_output_level".to_string()]);
    }
}

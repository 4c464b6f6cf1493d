//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of the assembled `RuntimeConfiguration`
//! - Value ranges (durations > 0, ports in range)
//! - Conflicting listener addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RuntimeConfiguration → Result<(), Vec<ValidationError>>

use std::fmt;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::config::schema::{ConfigSource, RegistryOptions, RuntimeConfiguration};
use crate::net::ListenAddress;

/// One problem with one option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check the cross-field invariants of an assembled configuration.
pub fn validate_config(config: &RuntimeConfiguration) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.registries.is_empty() {
        errors.push(ValidationError::new("registries", "at least one registry must be selected"));
    }
    for (i, kind) in config.registries.iter().enumerate() {
        if config.registries[..i].contains(kind) {
            errors.push(ValidationError::new("registries", format!("{} listed twice", kind)));
        }
    }
    for kind in config.per_registry.keys() {
        if !config.registries.contains(kind) {
            errors.push(ValidationError::new(
                "registries",
                format!("options given for unselected registry {}", kind),
            ));
        }
    }
    for kind in &config.registries {
        if let Some(RegistryOptions::Polling(polling)) = config.per_registry.get(kind) {
            if polling.interval.is_zero() {
                errors.push(ValidationError::new(
                    format!("{}serverInterval", kind.as_str().to_lowercase()),
                    "must be greater than zero",
                ));
            }
        }
    }

    if config.namespace.trim().is_empty() {
        errors.push(ValidationError::new("namespace", "must not be empty"));
    }

    match &config.config_source {
        ConfigSource::Crd(crd) => {
            if crd.resync_period.is_zero() {
                errors.push(ValidationError::new("resync", "must be greater than zero"));
            }
            if !is_valid_domain(&crd.domain_suffix) {
                errors.push(ValidationError::new(
                    "domain",
                    format!("{:?} is not a valid DNS suffix", crd.domain_suffix),
                ));
            }
        }
        ConfigSource::FileDir(dir) => {
            if dir.as_os_str().is_empty() {
                errors.push(ValidationError::new("configDir", "must not be empty"));
            }
        }
    }

    let listeners: Vec<_> = config.listeners.iter().collect();
    for (i, (name, addr)) in listeners.iter().enumerate() {
        for (other_name, other) in &listeners[..i] {
            if addr.conflicts_with(other) {
                errors.push(ValidationError::new(
                    "listeners",
                    format!("{} and {} both use {}", other_name, name, addr),
                ));
            }
        }
    }

    if let Some(ListenAddress::Unix(_)) = &config.listeners.secure_grpc {
        errors.push(ValidationError::new(
            "secureGrpcAddr",
            "TLS is not supported on unix sockets",
        ));
    }

    if config.shutdown_timeout.is_zero() {
        errors.push(ValidationError::new("shutdownTimeout", "must be greater than zero"));
    }

    if EnvFilter::try_new(&config.logging.level).is_err() {
        errors.push(ValidationError::new(
            "log_output_level",
            format!("{:?} is not a valid filter", config.logging.level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Parse a Go-style duration such as `500ms`, `2s`, `1m30s` or `1h`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if digits == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", input))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        total = total.saturating_add(part);
        rest = &rest[unit_len..];
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_durations() {
        assert_eq!(parse_duration("60s"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn domain_suffix_rules() {
        assert!(is_valid_domain("cluster.local"));
        assert!(is_valid_domain("svc"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("bad..domain"));
        assert!(!is_valid_domain("-edge.local"));
    }
}

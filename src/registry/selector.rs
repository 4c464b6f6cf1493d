//! Registry selection: turn the requested names into an ordered, distinct list.

use crate::config::validation::ValidationError;
use crate::error::ConfigError;
use crate::registry::RegistryKind;

/// Resolve configured registry names.
///
/// Order follows user input and duplicates keep their first occurrence.
/// Blank entries (e.g. from a trailing comma) are ignored. Every unknown
/// name is reported at once.
pub fn resolve<S: AsRef<str>>(configured: &[S]) -> Result<Vec<RegistryKind>, ConfigError> {
    let mut kinds: Vec<RegistryKind> = Vec::with_capacity(configured.len());
    let mut errors = Vec::new();

    for name in configured.iter().map(AsRef::as_ref) {
        if name.trim().is_empty() {
            continue;
        }
        match name.parse::<RegistryKind>() {
            Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new("registries", e.to_string())),
        }
    }

    if errors.is_empty() && kinds.is_empty() {
        errors.push(ValidationError::new(
            "registries",
            "at least one registry must be selected",
        ));
    }

    if errors.is_empty() {
        Ok(kinds)
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegistryKind::*;

    #[test]
    fn preserves_order_and_collapses_duplicates() {
        assert_eq!(
            resolve(&["Consul", "Kubernetes", "consul", "Mock"]).unwrap(),
            vec![Consul, Kubernetes, Mock]
        );
    }

    #[test]
    fn duplicates_do_not_change_result() {
        let with_dup = resolve(&["Consul", "Eureka", "Consul"]).unwrap();
        let without = resolve(&["Consul", "Eureka"]).unwrap();
        assert_eq!(with_dup, without);
    }

    #[test]
    fn reports_all_unknown_names() {
        let err = resolve(&["Unknown", "Kubernetes", "Nomad"]).unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("Unknown"));
        assert!(errors[1].to_string().contains("Nomad"));
    }

    #[test]
    fn rejects_empty_selection() {
        let empty: [&str; 0] = [];
        assert!(resolve(&empty).is_err());
        assert!(resolve(&["", " "]).is_err());
    }
}

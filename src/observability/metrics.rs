//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pilot_lifecycle_transitions_total` (counter): server state changes, by state
//! - `pilot_listeners_bound` (gauge): listeners currently serving
//! - `pilot_registries` (gauge): registries started
//! - `pilot_config_file_events_total` (counter): changes seen in the config directory
//! - `pilot_mesh_reloads_total` (counter): mesh config reloads, by result
//! - `pilot_webhook_notifications_total` (counter): webhook calls received
//!
//! # Design Decisions
//! - One Prometheus recorder per process, installed on first use
//! - Updates go through the `metrics` facade and are cheap when nothing scrapes

use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::lifecycle::state::LifecycleState;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Handle used by the monitoring listener to render `/metrics`.
///
/// Installs the global recorder the first time it is called. If another
/// recorder was installed first, the returned handle renders an empty set.
pub fn prometheus_handle() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A metrics recorder is already installed; /metrics will be empty");
            }
            handle
        })
        .clone()
}

pub fn record_transition(state: LifecycleState) {
    metrics::counter!("pilot_lifecycle_transitions_total", "state" => state.as_str()).increment(1);
}

pub fn set_bound_listeners(count: usize) {
    metrics::gauge!("pilot_listeners_bound").set(count as f64);
}

pub fn set_registries(count: usize) {
    metrics::gauge!("pilot_registries").set(count as f64);
}

pub fn record_config_file_event() {
    metrics::counter!("pilot_config_file_events_total").increment(1);
}

pub fn record_mesh_reload(success: bool) {
    let result = if success { "success" } else { "error" };
    metrics::counter!("pilot_mesh_reloads_total", "result" => result).increment(1);
}

pub fn record_webhook_notification() {
    metrics::counter!("pilot_webhook_notifications_total").increment(1);
}

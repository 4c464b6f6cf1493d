//! Request handlers for the discovery, gRPC, monitoring and webhook listeners.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::RuntimeConfiguration;
use crate::controller::ConfigController;
use crate::lifecycle::shutdown::Shutdown;
use crate::mesh::MeshHolder;
use crate::observability::metrics;
use crate::registry::{RegistryKind, ServiceRegistry};

/// State shared by the discovery and webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub instance_id: Uuid,
    pub config: Arc<RuntimeConfiguration>,
    pub registries: Arc<Vec<Box<dyn ServiceRegistry>>>,
    pub controller: Arc<ConfigController>,
    pub mesh: Arc<MeshHolder>,
    pub shutdown: Shutdown,
}

#[derive(Serialize)]
pub struct ReadyStatus {
    pub instance: Uuid,
    pub version: &'static str,
    pub status: &'static str,
}

pub async fn get_ready(State(state): State<AppState>) -> Response {
    let (code, status) = if state.shutdown.is_triggered() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    };
    let body = ReadyStatus {
        instance: state.instance_id,
        version: env!("CARGO_PKG_VERSION"),
        status,
    };
    (code, Json(body)).into_response()
}

pub async fn get_registries(State(state): State<AppState>) -> Json<Vec<RegistryKind>> {
    Json(state.registries.iter().map(|r| r.kind()).collect())
}

pub async fn get_configz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "config": *state.config,
        "mesh": *state.mesh.current(),
    }))
}

pub async fn get_registryz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registries: Vec<_> = state.registries.iter().map(|r| r.describe()).collect();
    Json(json!({
        "registries": registries,
        "controller": state.controller.describe(),
    }))
}

/// The xDS service itself is not served here.
pub async fn grpc_unimplemented() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/grpc"),
            (header::HeaderName::from_static("grpc-status"), "12"),
            (
                header::HeaderName::from_static("grpc-message"),
                "discovery service not available on this listener",
            ),
        ],
    )
}

pub async fn get_metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}

pub async fn get_healthz() -> &'static str {
    "ok"
}

pub async fn post_webhook(body: axum::body::Bytes) -> Json<serde_json::Value> {
    metrics::record_webhook_notification();
    tracing::debug!(bytes = body.len(), "Webhook notification received");
    Json(json!({ "accepted": true }))
}

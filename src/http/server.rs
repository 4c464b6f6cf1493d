//! HTTP server setup.
//!
//! # Responsibilities
//! - Build one Axum Router per listener facet
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve a bound socket until the shutdown signal fires

use std::io;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::handlers::{self, AppState};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::Socket;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Discovery API router.
pub fn discovery_router(state: AppState) -> Router {
    let features = state.config.features;

    let mut router = Router::new()
        .route("/ready", get(handlers::get_ready))
        .route("/v1/registries", get(handlers::get_registries));

    if features.profiling {
        router = router
            .route("/debug/configz", get(handlers::get_configz))
            .route("/debug/registryz", get(handlers::get_registryz));
    }

    let mut router = with_common_layers(router.with_state(state));
    if !features.response_caching {
        router = router.layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));
    }
    router
}

/// Router for the plain and secure gRPC listeners.
pub fn grpc_router() -> Router {
    with_common_layers(Router::new().fallback(handlers::grpc_unimplemented))
}

/// Self-monitoring router.
pub fn monitoring_router(handle: PrometheusHandle) -> Router {
    let router = Router::new()
        .route("/metrics", get(handlers::get_metrics))
        .with_state(handle)
        .route("/healthz", get(handlers::get_healthz));
    with_common_layers(router)
}

pub fn webhook_router() -> Router {
    with_common_layers(Router::new().route("/webhook", post(handlers::post_webhook)))
}

#[allow(deprecated)]
fn with_common_layers(router: Router) -> Router {
    // Outermost first: the request id must exist before the trace span opens.
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
    )
}

/// Serve plain HTTP (h1 and h2c) until `signal` fires, then drain.
pub async fn serve(socket: Socket, router: Router, signal: ShutdownSignal) -> io::Result<()> {
    match socket {
        Socket::Tcp(listener) => {
            axum::serve(listener, router)
                .with_graceful_shutdown(signal.fired())
                .await
        }
        #[cfg(unix)]
        Socket::Unix(listener) => {
            axum::serve(listener, router)
                .with_graceful_shutdown(signal.fired())
                .await
        }
    }
}

/// Serve HTTPS on an already bound TCP listener until `signal` fires.
pub async fn serve_tls(
    listener: TcpListener,
    tls: RustlsConfig,
    router: Router,
    signal: ShutdownSignal,
    drain: Duration,
) -> io::Result<()> {
    let handle = axum_server::Handle::new();
    let server = axum_server::from_tcp_rustls(listener.into_std()?, tls)
        .handle(handle.clone())
        .serve(router.into_make_service());
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result,
        _ = signal.fired() => {
            handle.graceful_shutdown(Some(drain));
            server.await
        }
    }
}

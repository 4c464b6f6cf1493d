//! The running discovery server.
//!
//! `DiscoveryServer` is the single handle for "the server of this process":
//! it owns the runtime dependencies, the bound listeners and their serving
//! tasks, and the lifecycle state machine. Start and stop are serialized by
//! an async mutex; stop may be called any number of times.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use notify::RecommendedWatcher;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::RuntimeConfiguration;
use crate::error::{ShutdownError, StartupError};
use crate::http::{server as http, AppState};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::startup::{build_dependencies, Dependencies};
use crate::lifecycle::state::{LifecycleState, StateMachine};
use crate::net::tls::{find_tls_material, load_tls_config};
use crate::net::{BoundAddress, BoundListener, ListenerName, Socket, SocketFile};
use crate::observability::metrics;
use crate::registry::{DefaultRegistryFactory, RegistryFactory, ServiceRegistry};

/// Addresses actually bound by `start`, by listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoundAddresses(BTreeMap<ListenerName, BoundAddress>);

impl BoundAddresses {
    pub fn get(&self, name: ListenerName) -> Option<&BoundAddress> {
        self.0.get(&name)
    }

    pub fn contains(&self, name: ListenerName) -> bool {
        self.0.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ListenerName, &BoundAddress)> {
        self.0.iter().map(|(name, addr)| (*name, addr))
    }
}

/// A listener with its serving task.
struct RunningListener {
    name: ListenerName,
    task: JoinHandle<()>,
    _socket_file: Option<SocketFile>,
}

struct Inner {
    state: StateMachine,
    listeners: Vec<RunningListener>,
    mesh_watcher: Option<RecommendedWatcher>,
}

/// Handle to the discovery server of this process.
pub struct DiscoveryServer {
    instance_id: Uuid,
    config: Arc<RuntimeConfiguration>,
    deps: Dependencies,
    metrics: PrometheusHandle,
    shutdown: OnceLock<Shutdown>,
    inner: Mutex<Inner>,
}

impl DiscoveryServer {
    /// Construct the server with the built-in registry adapters.
    pub fn new(config: RuntimeConfiguration) -> Result<Self, StartupError> {
        Self::with_factory(config, &DefaultRegistryFactory)
    }

    /// Construct the server. Nothing is bound or started yet.
    pub fn with_factory(
        config: RuntimeConfiguration,
        factory: &dyn RegistryFactory,
    ) -> Result<Self, StartupError> {
        let prometheus = metrics::prometheus_handle();
        let deps = build_dependencies(&config, factory).inspect_err(|_| {
            metrics::record_transition(LifecycleState::Failed);
        })?;
        let instance_id = Uuid::new_v4();

        tracing::info!(
            instance = %instance_id,
            registries = ?config.registries,
            "Discovery server created"
        );

        Ok(Self {
            instance_id,
            config: Arc::new(config),
            deps,
            metrics: prometheus,
            shutdown: OnceLock::new(),
            inner: Mutex::new(Inner {
                state: StateMachine::new(),
                listeners: Vec::new(),
                mesh_watcher: None,
            }),
        })
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub async fn state(&self) -> LifecycleState {
        self.inner.lock().await.state.state()
    }

    /// Bind every configured listener and start serving.
    ///
    /// All-or-nothing: if any listener fails to bind, every listener bound
    /// so far is closed before this returns and the server is `Failed`.
    pub async fn start(&self, shutdown: &Shutdown) -> Result<BoundAddresses, StartupError> {
        let mut inner = self.inner.lock().await;
        inner
            .state
            .transition(LifecycleState::Starting)
            .map_err(|e| StartupError::InvalidState(e.from))?;
        let _ = self.shutdown.set(shutdown.clone());

        match self.bring_up(shutdown).await {
            Ok((listeners, mesh_watcher, bound)) => {
                inner.listeners = listeners;
                inner.mesh_watcher = mesh_watcher;
                let _ = inner.state.transition(LifecycleState::Running);
                tracing::info!(instance = %self.instance_id, listeners = bound.len(), "Discovery server running");
                Ok(bound)
            }
            Err(e) => {
                let _ = inner.state.transition(LifecycleState::Failed);
                tracing::error!(error = %e, "Discovery server failed to start");
                Err(e)
            }
        }
    }

    async fn bring_up(
        &self,
        shutdown: &Shutdown,
    ) -> Result<(Vec<RunningListener>, Option<RecommendedWatcher>, BoundAddresses), StartupError> {
        let tls = self.secure_listener_tls().await?;

        // Bind first; nothing serves until every listener is bound.
        let mut bound = Vec::new();
        for (name, address) in self.config.listeners.iter() {
            if name == ListenerName::SecureGrpc && tls.is_none() {
                continue;
            }
            bound.push(BoundListener::bind(name, address).await?);
        }

        let mut started: Vec<&dyn ServiceRegistry> = Vec::new();
        for registry in self.deps.registries.iter() {
            if let Err(e) = registry.start(shutdown) {
                started.iter().rev().for_each(|r| r.stop());
                return Err(e);
            }
            started.push(&**registry);
        }
        if let Err(e) = self.deps.controller.start() {
            started.iter().rev().for_each(|r| r.stop());
            return Err(e);
        }

        let mesh_watcher = match self.deps.mesh.watch() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Mesh config hot reload disabled");
                None
            }
        };

        let addresses = BoundAddresses(
            bound
                .iter()
                .map(|l| (l.name(), l.local_addr().clone()))
                .collect(),
        );
        let listeners = bound
            .into_iter()
            .map(|listener| self.spawn_listener(listener, tls.clone(), shutdown))
            .collect::<Vec<_>>();

        metrics::set_bound_listeners(listeners.len());
        metrics::set_registries(self.deps.registries.len());
        Ok((listeners, mesh_watcher, addresses))
    }

    /// TLS material for the secure listener, if it is configured and present.
    async fn secure_listener_tls(&self) -> Result<Option<RustlsConfig>, StartupError> {
        if self.config.listeners.secure_grpc.is_none() {
            return Ok(None);
        }
        let dir = &self.config.tls.cert_dir;
        match find_tls_material(dir) {
            Some((cert, key)) => load_tls_config(&cert, &key)
                .await
                .map(Some)
                .map_err(|source| StartupError::Tls {
                    dir: dir.clone(),
                    source,
                }),
            None => {
                tracing::info!(cert_dir = ?dir, "No TLS material found; secure grpc listener disabled");
                Ok(None)
            }
        }
    }

    fn router_for(&self, name: ListenerName) -> Router {
        match name {
            ListenerName::Discovery => http::discovery_router(AppState {
                instance_id: self.instance_id,
                config: Arc::clone(&self.config),
                registries: Arc::clone(&self.deps.registries),
                controller: Arc::clone(&self.deps.controller),
                mesh: Arc::clone(&self.deps.mesh),
                shutdown: self.shutdown.get().cloned().unwrap_or_default(),
            }),
            ListenerName::Grpc | ListenerName::SecureGrpc => http::grpc_router(),
            ListenerName::Monitoring => http::monitoring_router(self.metrics.clone()),
            ListenerName::Webhook => http::webhook_router(),
        }
    }

    fn spawn_listener(
        &self,
        listener: BoundListener,
        tls: Option<RustlsConfig>,
        shutdown: &Shutdown,
    ) -> RunningListener {
        let name = listener.name();
        let address = listener.local_addr().clone();
        let router = self.router_for(name);
        let (socket, socket_file) = listener.into_parts();
        let tls = tls.filter(|_| name == ListenerName::SecureGrpc);
        let signal = shutdown.subscribe();
        let fatal = shutdown.clone();
        let drain = self.config.shutdown_timeout;

        let task = tokio::spawn(async move {
            let result = match (tls, socket) {
                (Some(tls), Socket::Tcp(tcp)) => http::serve_tls(tcp, tls, router, signal, drain).await,
                (None, socket) => http::serve(socket, router, signal).await,
                #[cfg(unix)]
                (Some(_), Socket::Unix(_)) => Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "TLS is not supported on unix sockets",
                )),
            };

            match result {
                Ok(()) => tracing::debug!(listener = %name, address = %address, "Listener stopped"),
                Err(e) => {
                    tracing::error!(listener = %name, address = %address, error = %e, "Listener failed");
                    if fatal.fail(format!("{} listener on {} failed: {}", name, address, e)) {
                        tracing::warn!(listener = %name, "Shutting down after listener failure");
                    }
                }
            }
        });

        RunningListener {
            name,
            task,
            _socket_file: socket_file,
        }
    }

    /// Suspend until the shutdown signal given to `start` fires.
    ///
    /// Returns immediately if the server was never started.
    pub async fn wait(&self) {
        match self.shutdown.get() {
            Some(shutdown) => shutdown.wait().await,
            None => tracing::warn!("wait called on a server that was never started"),
        }
    }

    /// Close every listener and release registry and controller resources.
    ///
    /// Idempotent: calls after the first, or on a server that never reached
    /// `Running`, return `Ok(())` without doing anything.
    pub async fn stop(&self) -> Result<(), ShutdownError> {
        let mut inner = self.inner.lock().await;
        let state = inner.state.state();
        if state != LifecycleState::Running {
            tracing::debug!(state = state.as_str(), "Stop ignored");
            return Ok(());
        }
        let _ = inner.state.transition(LifecycleState::Stopping);

        if let Some(shutdown) = self.shutdown.get() {
            shutdown.trigger();
        }

        let timeout = self.config.shutdown_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut failures = Vec::new();

        for RunningListener { name, mut task, _socket_file } in inner.listeners.drain(..) {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(format!("{} listener task: {}", name, e)),
                Err(_) => {
                    task.abort();
                    failures.push(format!("{} listener did not drain within {:?}", name, timeout));
                }
            }
        }

        inner.mesh_watcher = None;
        self.deps.controller.stop();
        self.deps.registries.iter().rev().for_each(|r| r.stop());

        metrics::set_bound_listeners(0);
        metrics::set_registries(0);
        let _ = inner.state.transition(LifecycleState::Stopped);

        if failures.is_empty() {
            tracing::info!(instance = %self.instance_id, "Discovery server stopped");
            Ok(())
        } else {
            Err(ShutdownError::Incomplete(failures))
        }
    }
}

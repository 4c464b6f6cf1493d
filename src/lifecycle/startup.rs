//! Startup orchestration.
//!
//! # Responsibilities
//! - Build runtime dependencies from a validated configuration
//! - Drive the process: construct, start, wait for termination, stop
//!
//! # Design Decisions
//! - Fail fast: any construction or bind error is fatal, no retries
//! - Dependencies build in order: mesh config, registries, config controller
//! - Listeners start last (traffic only when ready)

use std::future::Future;
use std::io;
use std::sync::Arc;

use crate::config::RuntimeConfiguration;
use crate::controller::ConfigController;
use crate::error::{PilotError, StartupError};
use crate::lifecycle::server::DiscoveryServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{OsSignals, SignalCoordinator, Termination};
use crate::mesh::MeshHolder;
use crate::registry::{DefaultRegistryFactory, RegistryFactory, ServiceRegistry};

/// Everything the server needs besides its listeners.
pub struct Dependencies {
    pub mesh: Arc<MeshHolder>,
    pub registries: Arc<Vec<Box<dyn ServiceRegistry>>>,
    pub controller: Arc<ConfigController>,
}

/// Build dependencies. On error nothing has been started, so dropping what
/// was built so far releases it.
pub fn build_dependencies(
    config: &RuntimeConfiguration,
    factory: &dyn RegistryFactory,
) -> Result<Dependencies, StartupError> {
    let mesh = MeshHolder::load(&config.mesh_config_path).map_err(|source| {
        StartupError::MeshConfig {
            path: config.mesh_config_path.clone(),
            source,
        }
    })?;

    let mut registries = Vec::with_capacity(config.registries.len());
    for kind in &config.registries {
        let options = config
            .registry_options(*kind)
            .ok_or_else(|| StartupError::Registry {
                kind: *kind,
                reason: "no options configured".to_string(),
            })?;
        registries.push(factory.build(*kind, options, config)?);
    }

    let controller = ConfigController::build(&config.config_source, &config.namespace)?;

    Ok(Dependencies {
        mesh: Arc::new(mesh),
        registries: Arc::new(registries),
        controller: Arc::new(controller),
    })
}

/// Run the discovery service until SIGINT/SIGTERM or a fatal error.
pub async fn run(config: RuntimeConfiguration) -> Result<(), PilotError> {
    // Handlers go in before anything binds.
    let signals = OsSignals::install().map_err(PilotError::Signal)?;
    run_until(config, &DefaultRegistryFactory, signals.recv()).await
}

/// Run the discovery service until `termination` resolves or a subsystem
/// fails. A subsystem failure is returned as `PilotError::Fatal` after the
/// server has been stopped.
pub async fn run_until<F>(
    config: RuntimeConfiguration,
    factory: &dyn RegistryFactory,
    termination: F,
) -> Result<(), PilotError>
where
    F: Future<Output = io::Result<Termination>>,
{
    let shutdown = Shutdown::new();

    let server = DiscoveryServer::with_factory(config, factory).map_err(PilotError::Construct)?;
    let bound = server.start(&shutdown).await.map_err(PilotError::Start)?;
    for (name, address) in bound.iter() {
        tracing::info!(listener = %name, address = %address, "Serving");
    }

    let coordinator = SignalCoordinator::new(shutdown.clone());
    let signals = async {
        let result = coordinator.wait_with(termination).await;
        if result.is_err() {
            // Unblock the wait below; the error is reported after stop.
            shutdown.trigger();
        }
        result
    };
    let (termination, ()) = tokio::join!(signals, server.wait());

    if let Err(e) = server.stop().await {
        tracing::warn!(error = %e, "Shutdown did not complete cleanly");
    }

    let termination = termination.map_err(PilotError::Signal)?;
    if let Some(reason) = shutdown.failure() {
        return Err(PilotError::Fatal(reason));
    }
    tracing::info!(cause = ?termination, "Shutdown complete");
    Ok(())
}

//! Mesh configuration.
//!
//! # Data Flow
//! ```text
//! --meshConfig file (TOML)
//!     → load_mesh_config (read, deserialize, validate)
//!     → MeshHolder (ArcSwap, read lock-free by subsystems)
//!
//! On file change:
//!     FileWatcher → load_mesh_config → swap, or keep current on error
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use notify::RecommendedWatcher;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::watcher::FileWatcher;
use crate::observability::metrics;

/// Error loading a mesh config file.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Mesh-wide settings shared by all proxies.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Port the sidecar captures inbound and outbound traffic on.
    pub proxy_listen_port: u16,

    /// Upstream connection timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Ingress class handled by the mesh ingress controller.
    pub ingress_class: String,

    pub ingress_controller_mode: IngressControllerMode,

    pub enable_tracing: bool,

    /// Where proxies write access logs; empty disables.
    pub access_log_file: String,

    pub mixer_check_server: String,
    pub mixer_report_server: String,
    pub disable_policy_checks: bool,

    /// Route discovery refresh delay in milliseconds.
    pub rds_refresh_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngressControllerMode {
    Off,
    Default,
    Strict,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            proxy_listen_port: 15001,
            connect_timeout_ms: 1_000,
            ingress_class: "istio".to_string(),
            ingress_controller_mode: IngressControllerMode::Strict,
            enable_tracing: true,
            access_log_file: "/dev/stdout".to_string(),
            mixer_check_server: String::new(),
            mixer_report_server: String::new(),
            disable_policy_checks: false,
            rds_refresh_delay_ms: 1_000,
        }
    }
}

impl MeshConfig {
    fn validate(&self) -> Result<(), MeshError> {
        if self.proxy_listen_port == 0 {
            return Err(MeshError::Invalid("proxy_listen_port must be set".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(MeshError::Invalid("connect_timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Load and validate mesh configuration from a TOML file.
pub fn load_mesh_config(path: &Path) -> Result<MeshConfig, MeshError> {
    let content = std::fs::read_to_string(path)?;
    let config: MeshConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Current mesh configuration, swapped atomically on reload.
#[derive(Debug)]
pub struct MeshHolder {
    path: PathBuf,
    current: ArcSwap<MeshConfig>,
}

impl MeshHolder {
    /// Load the initial configuration. Fails if the file is unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, MeshError> {
        let config = load_mesh_config(path)?;
        tracing::info!(path = ?path, "Mesh configuration loaded");
        Ok(Self {
            path: path.to_path_buf(),
            current: ArcSwap::from_pointee(config),
        })
    }

    pub fn current(&self) -> Arc<MeshConfig> {
        self.current.load_full()
    }

    /// Re-read the file. On error the current configuration is kept.
    pub fn reload(&self) -> Result<(), MeshError> {
        match load_mesh_config(&self.path) {
            Ok(config) => {
                if *self.current.load_full() != config {
                    self.current.store(Arc::new(config));
                    metrics::record_mesh_reload(true);
                    tracing::info!(path = ?self.path, "Mesh configuration reloaded");
                }
                Ok(())
            }
            Err(e) => {
                metrics::record_mesh_reload(false);
                tracing::error!(
                    path = ?self.path,
                    error = %e,
                    "Failed to reload mesh configuration. Keeping current configuration."
                );
                Err(e)
            }
        }
    }

    /// Reload whenever the file changes.
    pub fn watch(self: &Arc<Self>) -> Result<RecommendedWatcher, notify::Error> {
        let holder = Arc::clone(self);
        FileWatcher::file(&self.path).run(move |_| {
            let _ = holder.reload();
        })
    }
}

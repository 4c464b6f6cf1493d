//! Config resource controllers.
//!
//! Either a CRD client (cluster mode) or a watcher over a directory of config
//! files. Reconciliation itself happens elsewhere; this module owns setup,
//! start and stop.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use notify::RecommendedWatcher;
use serde_json::json;

use crate::config::schema::{ConfigSource, CrdOptions};
use crate::config::watcher::FileWatcher;
use crate::error::StartupError;
use crate::observability::metrics;

/// Controller for the configured config source.
#[derive(Debug)]
pub enum ConfigController {
    Crd(CrdController),
    FileDir(FileDirController),
}

impl ConfigController {
    /// Build the controller. Checks the filesystem, so this belongs to construction.
    pub fn build(source: &ConfigSource, namespace: &str) -> Result<Self, StartupError> {
        match source {
            ConfigSource::Crd(options) => CrdController::new(options, namespace).map(Self::Crd),
            ConfigSource::FileDir(dir) => FileDirController::new(dir).map(Self::FileDir),
        }
    }

    pub fn start(&self) -> Result<(), StartupError> {
        match self {
            ConfigController::Crd(crd) => {
                crd.start();
                Ok(())
            }
            ConfigController::FileDir(files) => files.start(),
        }
    }

    /// Stop watching. Safe to call more than once.
    pub fn stop(&self) {
        match self {
            ConfigController::Crd(crd) => crd.stop(),
            ConfigController::FileDir(files) => files.stop(),
        }
    }

    pub fn describe(&self) -> serde_json::Value {
        match self {
            ConfigController::Crd(crd) => json!({
                "source": "crd",
                "namespace": crd.namespace,
                "options": crd.options,
            }),
            ConfigController::FileDir(files) => json!({
                "source": "file_dir",
                "dir": files.dir,
                "files": files.initial_files,
            }),
        }
    }
}

/// Cluster CRD client settings.
#[derive(Debug)]
pub struct CrdController {
    namespace: String,
    options: CrdOptions,
    running: Mutex<bool>,
}

impl CrdController {
    fn new(options: &CrdOptions, namespace: &str) -> Result<Self, StartupError> {
        if let Some(path) = &options.kubeconfig {
            if !path.is_file() {
                return Err(StartupError::Controller(format!(
                    "kubeconfig {} is not readable",
                    path.display()
                )));
            }
        }
        Ok(Self {
            namespace: namespace.to_string(),
            options: options.clone(),
            running: Mutex::new(false),
        })
    }

    fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !*running {
            *running = true;
            tracing::info!(
                namespace = %self.namespace,
                resync = ?self.options.resync_period,
                domain = %self.options.domain_suffix,
                watched_namespace = self.options.watched_namespace.as_deref().unwrap_or("*"),
                "CRD config controller started"
            );
        }
    }

    fn stop(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if std::mem::take(&mut *running) {
            tracing::info!("CRD config controller stopped");
        }
    }
}

/// Watches a directory of config files.
pub struct FileDirController {
    dir: PathBuf,
    initial_files: usize,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileDirController {
    fn new(dir: &Path) -> Result<Self, StartupError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            StartupError::Controller(format!("config directory {}: {}", dir.display(), e))
        })?;
        let initial_files = entries
            .filter_map(Result::ok)
            .filter(|entry| is_config_file(&entry.path()))
            .count();

        tracing::info!(dir = ?dir, files = initial_files, "Using config directory");
        Ok(Self {
            dir: dir.to_path_buf(),
            initial_files,
            watcher: Mutex::new(None),
        })
    }

    fn start(&self) -> Result<(), StartupError> {
        let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(());
        }
        let watcher = FileWatcher::dir(&self.dir)
            .run(|paths| {
                for path in paths.iter().filter(|p| is_config_file(p)) {
                    metrics::record_config_file_event();
                    tracing::debug!(path = ?path, "Config file changed");
                }
            })
            .map_err(|e| StartupError::Controller(format!("watch {}: {}", self.dir.display(), e)))?;
        *slot = Some(watcher);
        Ok(())
    }

    fn stop(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if watcher.is_some() {
            tracing::info!(dir = ?self.dir, "Config directory watcher stopped");
        }
    }
}

impl std::fmt::Debug for FileDirController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDirController")
            .field("dir", &self.dir)
            .field("initial_files", &self.initial_files)
            .finish_non_exhaustive()
    }
}

fn is_config_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

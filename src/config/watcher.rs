//! Filesystem watching for hot reload.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

/// Name of the symlink a Kubernetes ConfigMap mount swaps on update.
const CONFIGMAP_DATA_LINK: &str = "..data";

/// Watches a file or directory and invokes a callback on changes.
///
/// The callback runs on the watcher's own thread. Dropping the returned
/// `RecommendedWatcher` stops watching.
pub struct FileWatcher {
    path: PathBuf,
    recursive: bool,
    file_name: Option<OsString>,
}

impl FileWatcher {
    /// Watch a single file.
    ///
    /// The parent directory is watched instead of the file, so the watch
    /// survives editors and ConfigMap mounts that replace the file by rename
    /// or symlink swap.
    pub fn file(path: &Path) -> Self {
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            path: parent,
            recursive: false,
            file_name: path.file_name().map(OsStr::to_os_string),
        }
    }

    /// Watch a directory tree.
    pub fn dir(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            recursive: true,
            file_name: None,
        }
    }

    /// Start watching. `on_change` receives the changed paths.
    pub fn run<F>(self, mut on_change: F) -> Result<RecommendedWatcher, notify::Error>
    where
        F: FnMut(&[PathBuf]) + Send + 'static,
    {
        let file_name = self.file_name.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify()
                        || event.kind.is_create()
                        || event.kind.is_remove();
                    if relevant && touches(&event.paths, file_name.as_deref()) {
                        on_change(&event.paths);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&self.path, mode)?;

        tracing::info!(path = ?self.path, file = ?self.file_name, "File watcher started");
        Ok(watcher)
    }
}

fn touches(paths: &[PathBuf], file_name: Option<&OsStr>) -> bool {
    let Some(wanted) = file_name else {
        return true;
    };
    paths.iter().any(|path| {
        path.file_name()
            .is_some_and(|name| name == wanted || name == CONFIGMAP_DATA_LINK)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_watch_targets_parent_directory() {
        let watcher = FileWatcher::file(Path::new("/etc/istio/config/mesh"));
        assert_eq!(watcher.path, PathBuf::from("/etc/istio/config"));
        assert_eq!(watcher.file_name.as_deref(), Some(OsStr::new("mesh")));

        let relative = FileWatcher::file(Path::new("mesh.toml"));
        assert_eq!(relative.path, PathBuf::from("."));
    }

    #[test]
    fn only_the_watched_file_is_relevant() {
        let mesh = Some(OsStr::new("mesh"));
        assert!(touches(&[PathBuf::from("/cfg/mesh")], mesh));
        assert!(touches(&[PathBuf::from("/cfg/..data")], mesh));
        assert!(!touches(&[PathBuf::from("/cfg/other.yaml")], mesh));
        assert!(touches(&[PathBuf::from("/cfg/other.yaml")], None));
    }
}

//! Hot reload of the configuration file.
//!
//! # Responsibilities
//! - Notice writes to the config file, including editor-style atomic saves
//! - Turn each burst of file events into one load-and-validate
//! - Hand validated configs to the reloader; drop invalid ones with a log
//!
//! # Design Decisions
//! - The parent directory is watched, so a file replaced by rename is still
//!   seen; events for other files in it are ignored
//! - notify's callback thread only nudges a Tokio task; parsing happens there
//! - The watcher stops once nobody receives its updates

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::EdgeConfig;

/// Quiet period after the last file event before the file is read.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches one config file and emits each valid new version.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<EdgeConfig>,
}

/// Keeps a running watcher alive; dropping it stops the watch.
pub struct WatchGuard {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<EdgeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                debounce: DEFAULT_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called inside a Tokio runtime.
    pub fn run(self) -> Result<WatchGuard, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::path_not_found().add_path(self.path.clone()))?;
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (nudge_tx, nudge_rx) = mpsc::unbounded_channel::<()>();
        let watched = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if relevant && nudge_tx.send(()).is_err() {
                        tracing::debug!(path = ?watched, "Config reload task gone, ignoring file event");
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        let task = tokio::spawn(self.reload_on_change(nudge_rx));

        Ok(WatchGuard {
            _watcher: watcher,
            task,
        })
    }

    async fn reload_on_change(self, mut nudges: mpsc::UnboundedReceiver<()>) {
        while nudges.recv().await.is_some() {
            tokio::time::sleep(self.debounce).await;
            while nudges.try_recv().is_ok() {}

            tracing::info!(path = ?self.path, "Config file changed, reloading");
            let config = match load_config(&self.path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(
                        path = ?self.path,
                        error = %e,
                        "Rejected config change, keeping current configuration"
                    );
                    continue;
                }
            };

            if self.update_tx.send(config).is_err() {
                tracing::warn!(path = ?self.path, "Config update receiver gone, stopping watcher");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn watch(path: &Path) -> (WatchGuard, mpsc::UnboundedReceiver<EdgeConfig>) {
        let (watcher, updates) = ConfigWatcher::new(path);
        let guard = watcher
            .with_debounce(Duration::from_millis(50))
            .run()
            .unwrap();
        (guard, updates)
    }

    #[tokio::test]
    async fn test_valid_write_produces_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge-router.toml");
        std::fs::write(&path, "").unwrap();
        let (_guard, mut updates) = watch(&path);

        std::fs::write(
            &path,
            "[listener]\nbind_address = \"127.0.0.1:9999\"\n",
        )
        .unwrap();

        let config = timeout(Duration::from_secs(10), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
    }

    #[tokio::test]
    async fn test_invalid_write_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge-router.toml");
        std::fs::write(&path, "").unwrap();
        let (_guard, mut updates) = watch(&path);

        std::fs::write(&path, "[listener]\nbind_address = \"nowhere\"\n").unwrap();
        std::fs::write(dir.path().join("unrelated.toml"), "not = [toml").unwrap();

        assert!(timeout(Duration::from_secs(1), updates.recv()).await.is_err());
    }

    #[test]
    fn test_path_without_file_name_is_rejected() {
        let (watcher, _updates) = ConfigWatcher::new(Path::new("/"));
        assert!(watcher.run().is_err());
    }
}

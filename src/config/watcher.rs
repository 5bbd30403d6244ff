//! Configuration file watcher for hot reload.
//!
//! The notify callback only enqueues a trigger; loading happens on a dedicated
//! reload task. The trigger channel has room for exactly one pending reload, so a
//! burst of events while a load is running collapses into a single follow-up load.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::reloader::ConfigReloader;

/// Cloneable handle that requests a reload.
#[derive(Debug, Clone)]
pub struct ReloadTrigger {
    tx: mpsc::Sender<()>,
}

impl ReloadTrigger {
    /// Request a reload. Returns `false` when one is already pending (coalesced)
    /// or the reload task has stopped.
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Create the trigger handle and the receiver consumed by [`spawn_reload_task`].
pub fn reload_channel() -> (ReloadTrigger, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (ReloadTrigger { tx }, rx)
}

/// Run reloads one after another until shutdown or until every trigger is gone.
pub fn spawn_reload_task(
    reloader: Arc<ConfigReloader>,
    mut triggers: mpsc::Receiver<()>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                trigger = triggers.recv() => match trigger {
                    Some(()) => reloader.reload_or_keep().await,
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Reload task stopped");
    })
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    watch_dir: PathBuf,
    target: PathBuf,
    trigger: ReloadTrigger,
}

impl ConfigWatcher {
    /// Watch `path` and send reload requests through `trigger`.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors which save by replacing the file keep being observed.
    pub fn new(path: &Path, trigger: ReloadTrigger) -> Self {
        let (watch_dir, target) = resolve_target(path);
        Self {
            watch_dir,
            target,
            trigger,
        }
    }

    /// Start watching on notify's background thread. Dropping the returned
    /// watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let target = self.target.clone();
        let trigger = self.trigger.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_relevant(&event, &target) {
                        if trigger.request() {
                            tracing::info!(path = %target.display(), "Config file change detected, reloading...");
                        } else {
                            tracing::debug!("Reload already pending, coalescing change event");
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.watch_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.target.display(), "Monitoring configuration file");
        Ok(watcher)
    }
}

/// Modify or create events naming exactly the configuration file.
pub fn is_relevant(event: &Event, target: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p == target)
}

/// Split `path` into a canonical parent directory and the file path inside it.
fn resolve_target(path: &Path) -> (PathBuf, PathBuf) {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let parent = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let watch_dir = parent.canonicalize().unwrap_or(parent);

    let target = match absolute.file_name() {
        Some(name) => watch_dir.join(name),
        None => absolute.clone(),
    };
    (watch_dir, target)
}

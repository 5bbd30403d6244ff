//! Single-flight configuration reload.
//!
//! Every reload path (file watcher, SIGHUP) funnels through
//! [`ConfigReloader::reload`], which holds an async mutex for the duration of the
//! load so that at most one load runs at a time. A failed load never touches the
//! published table.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::loader::{load_config, ConfigError};
use crate::config::store::RuleStore;
use crate::observability::metrics;

pub struct ConfigReloader {
    path: PathBuf,
    store: Arc<RuleStore>,
    bound_port: u16,
    gate: Mutex<()>,
}

impl ConfigReloader {
    /// `bound_port` is the port the listener already holds; a document asking
    /// for another port only produces a warning.
    pub fn new(path: impl Into<PathBuf>, store: Arc<RuleStore>, bound_port: u16) -> Self {
        Self {
            path: path.into(),
            store,
            bound_port,
            gate: Mutex::new(()),
        }
    }

    /// Load the document and publish its rules. Returns the number of active rules.
    pub async fn reload(&self) -> Result<usize, ConfigError> {
        let _guard = self.gate.lock().await;

        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || load_config(&path))
            .await
            .map_err(|e| ConfigError::Read {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })?;

        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                metrics::record_reload("failure");
                return Err(e);
            }
        };

        if loaded.port != self.bound_port {
            tracing::warn!(
                bound_port = self.bound_port,
                requested_port = loaded.port,
                "Port changed in configuration; restart required for it to take effect"
            );
        }

        let rules = loaded.table.len();
        self.store.publish(loaded.table);
        metrics::record_reload("success");
        metrics::set_active_rules(rules);

        tracing::info!(path = %self.path.display(), rules, "Settings loaded");
        Ok(rules)
    }

    /// Reload from a background trigger; failures are logged and the previous
    /// rules stay active.
    pub async fn reload_or_keep(&self) {
        match self.reload().await {
            Ok(_) => {}
            Err(e @ ConfigError::InvalidPort(_)) => {
                tracing::warn!(error = %e, "Ignoring configuration change; previous rules remain active");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload configuration; previous rules remain active");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Rule, RuleTable};
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn publishes_new_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        write(&path, r#"{"endpoints":[{"method":"GET","path":"/a"},{"method":"GET","path":"/b"}]}"#);

        let store = Arc::new(RuleStore::default());
        let reloader = ConfigReloader::new(&path, Arc::clone(&store), 8080);

        assert_eq!(reloader.reload().await.unwrap(), 2);
        assert_eq!(store.snapshot().matching("GET", "/b").len(), 1);
    }

    #[tokio::test]
    async fn keeps_last_known_good_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        write(&path, "{ not json");

        let store = Arc::new(RuleStore::new(RuleTable::new(vec![Rule::new("GET", "/old")])));
        let reloader = ConfigReloader::new(&path, Arc::clone(&store), 8080);

        assert!(matches!(reloader.reload().await, Err(ConfigError::Parse(_))));
        reloader.reload_or_keep().await;
        assert_eq!(store.snapshot().matching("GET", "/old").len(), 1);

        write(&path, r#"{"port":"nope","endpoints":[]}"#);
        assert!(matches!(reloader.reload().await, Err(ConfigError::InvalidPort(_))));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn port_change_still_applies_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        write(&path, r#"{"port":9999,"endpoints":[{"method":"GET","path":"/new"}]}"#);

        let store = Arc::new(RuleStore::default());
        let reloader = ConfigReloader::new(&path, Arc::clone(&store), 8080);

        reloader.reload().await.unwrap();
        assert_eq!(store.snapshot().matching("GET", "/new").len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reloads_produce_equivalent_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let doc = r#"{"endpoints":[{"method":"GET","path":"/a","response_code":201},{"method":"GET","path":"/a","response_code":202}]}"#;
        write(&path, doc);

        let store = Arc::new(RuleStore::default());
        let reloader = Arc::new(ConfigReloader::new(&path, Arc::clone(&store), 8080));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let reloader = Arc::clone(&reloader);
            tasks.push(tokio::spawn(async move { reloader.reload().await.unwrap() }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), 2);
        }

        let expected = crate::config::loader::parse_config(doc).unwrap().table;
        assert_eq!(*store.snapshot(), expected);
    }
}

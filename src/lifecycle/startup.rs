//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize all subsystems in dependency order
//! - Start background tasks (config watcher, reload task, metrics)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use notify::RecommendedWatcher;
use tokio::sync::{broadcast, mpsc};

use crate::config::watcher::{reload_channel, spawn_reload_task};
use crate::config::{
    load_config, ConfigError, ConfigReloader, ConfigWatcher, ListenerConfig, ReloadTrigger,
    RuleStore, ServerSettings,
};
use crate::http::{RequestDispatcher, StubServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::{RandomSelector, RuleSelector};

/// Error type for startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to watch configuration file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
}

/// A fully initialized server that has bound its port but not yet started
/// serving.
pub struct App {
    listener: Listener,
    server: StubServer,
    reloader: Arc<ConfigReloader>,
    trigger: ReloadTrigger,
    reload_rx: mpsc::Receiver<()>,
    watcher: RecommendedWatcher,
    shutdown: Shutdown,
    server_shutdown: broadcast::Receiver<()>,
    reload_shutdown: broadcast::Receiver<()>,
}

impl App {
    /// Load the configuration, publish its rules and bind the listener.
    ///
    /// The file watcher starts before the first load, so an edit made at any
    /// point after `build` begins is queued for the reload task.
    pub async fn build(settings: ServerSettings) -> Result<Self, StartupError> {
        let (trigger, reload_rx) = reload_channel();
        let watcher = ConfigWatcher::new(&settings.config_path, trigger.clone()).run()?;

        let loaded = load_config(&settings.config_path)?;
        let rules = loaded.table.len();
        tracing::info!(
            path = %settings.config_path.display(),
            port = loaded.port,
            rules,
            "Configuration loaded"
        );

        let store = Arc::new(RuleStore::new(loaded.table));
        metrics::set_active_rules(rules);

        let selector: Arc<dyn RuleSelector> = match settings.seed {
            Some(seed) => Arc::new(RandomSelector::seeded(seed)),
            None => Arc::new(RandomSelector::from_entropy()),
        };
        let dispatcher =
            RequestDispatcher::new(Arc::clone(&store), selector, settings.max_body_bytes);

        let reloader = Arc::new(ConfigReloader::new(
            settings.config_path.clone(),
            store,
            loaded.port,
        ));

        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();
        let reload_shutdown = shutdown.subscribe();

        let listener = Listener::bind(&ListenerConfig::new(&settings, loaded.port)).await?;
        let server = StubServer::new(dispatcher, settings.shutdown_grace);

        Ok(Self {
            listener,
            server,
            reloader,
            trigger,
            reload_rx,
            watcher,
            shutdown,
            server_shutdown,
            reload_shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops the server once [`App::serve`] is running.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn reload_trigger(&self) -> ReloadTrigger {
        self.trigger.clone()
    }

    /// Run the reload task and serve until shutdown.
    pub async fn serve(self) -> Result<(), StartupError> {
        let reload_task = spawn_reload_task(self.reloader, self.reload_rx, self.reload_shutdown);

        let result = self.server.run(self.listener, self.server_shutdown).await;

        drop(self.watcher);
        self.shutdown.trigger();
        if let Err(e) = reload_task.await {
            tracing::warn!(error = %e, "Reload task ended abnormally");
        }

        result.map_err(StartupError::from)
    }
}

/// Run the server with signal handling until SIGINT or SIGTERM.
pub async fn run(settings: ServerSettings) -> Result<(), StartupError> {
    if let Some(addr) = settings.metrics_address {
        metrics::init_metrics(addr);
    }

    let app = App::build(settings).await?;
    let _signals = spawn_signal_handler(app.shutdown_handle(), app.reload_trigger())?;

    app.serve().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP requests a config reload through the same channel as the file watcher

use tokio::task::JoinHandle;

use crate::config::ReloadTrigger;
use crate::lifecycle::shutdown::Shutdown;

/// Listen for process signals until a termination signal arrives, then
/// trigger `shutdown`.
#[cfg(unix)]
pub fn spawn_signal_handler(
    shutdown: Shutdown,
    reload: ReloadTrigger,
) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        let name = loop {
            tokio::select! {
                _ = terminate.recv() => break "SIGTERM",
                _ = interrupt.recv() => break "SIGINT",
                _ = hangup.recv() => {
                    if reload.request() {
                        tracing::info!("SIGHUP received, reloading configuration");
                    } else {
                        tracing::debug!("SIGHUP received, reload already pending");
                    }
                }
            }
        };
        tracing::info!(signal = name, "Shutdown signal received");
        shutdown.trigger();
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_handler(
    shutdown: Shutdown,
    _reload: ReloadTrigger,
) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!(signal = "ctrl-c", "Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for ctrl-c"),
        }
        shutdown.trigger();
    }))
}

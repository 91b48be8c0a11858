//! OS signal handling.
//!
//! # Responsibilities
//! - SIGINT / SIGTERM: trigger graceful shutdown
//! - SIGHUP: re-fetch the control documents under the current config
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP never touches the config file; the file watcher owns that

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;
use crate::routing::SharedRouter;

/// Resolve on Ctrl-C, or SIGTERM on unix.
pub async fn terminate() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = sigterm => tracing::info!("Received SIGTERM"),
    }
}

/// Trigger `shutdown` on the first termination signal.
pub fn spawn_shutdown_listener(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        terminate().await;
        shutdown.trigger();
    })
}

/// Refresh the routing rules on every SIGHUP until shutdown.
#[cfg(unix)]
pub fn spawn_reload_listener(router: SharedRouter, shutdown: &Shutdown) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGHUP");
                return;
            }
        };

        loop {
            tokio::select! {
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!("Received SIGHUP, refreshing routing rules");
                    router.refresh().await;
                }
                _ = stop.recv() => break,
            }
        }
    })
}

#[cfg(not(unix))]
pub fn spawn_reload_listener(_router: SharedRouter, _shutdown: &Shutdown) -> JoinHandle<()> {
    tokio::spawn(async {})
}

//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the object store and function invoker from config
//! - Fetch the control documents and install the first routing snapshot
//! - Apply config-file updates by rebuilding the snapshot off the request path
//!
//! # Design Decisions
//! - Fail fast: a bad config or unusable collaborator at startup is fatal
//! - Missing or malformed control documents are not fatal; they disable
//!   their feature and are reported
//! - A rejected update keeps the running snapshot

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, EdgeConfig};
use crate::functions::http::InvokerError;
use crate::functions::{FunctionInvoker, HttpFunctionInvoker};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::routing::{EdgeRouter, SharedRouter};
use crate::rules::LoadReport;
use crate::storage::{self, ObjectStore, StorageError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Invoker(#[from] InvokerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The external collaborators a router is built over.
pub fn build_collaborators(
    config: &EdgeConfig,
) -> Result<(Arc<dyn ObjectStore>, Arc<dyn FunctionInvoker>), StartupError> {
    let store = storage::from_config(&config.storage)?;
    let invoker: Arc<dyn FunctionInvoker> = Arc::new(HttpFunctionInvoker::new(&config.functions)?);
    Ok((store, invoker))
}

fn log_report(report: &LoadReport) {
    for (kind, count) in &report.loaded {
        tracing::debug!(document = %kind, rules = count, "Rules active");
    }
    if !report.is_clean() {
        tracing::warn!(
            missing = report.missing.len(),
            failed = report.failures.len(),
            rejected = report.rejected.len(),
            retained = report.retained.len(),
            "Routing rules loaded with degradations"
        );
    }
}

/// Build the first routing snapshot.
pub async fn bootstrap(config: EdgeConfig) -> Result<SharedRouter, StartupError> {
    let (store, invoker) = build_collaborators(&config)?;
    let (router, report) = EdgeRouter::load(Arc::new(config), store, invoker).await;
    log_report(&report);

    tracing::info!(
        auth_rules = router.rules().auth.rules().len(),
        redirect_rules = router.rules().redirects.rules().len(),
        function_rules = router.rules().functions.rules().len(),
        locales = router.rules().locales.len(),
        "Routing snapshot ready"
    );
    Ok(SharedRouter::new(router))
}

/// Rebuild the snapshot under `config`. On error the running one is kept.
pub async fn apply_update(shared: &SharedRouter, config: EdgeConfig) -> Result<LoadReport, StartupError> {
    let current = shared.snapshot();
    if current.config().listener.bind_address != config.listener.bind_address {
        tracing::warn!(
            current = %current.config().listener.bind_address,
            requested = %config.listener.bind_address,
            "Listener address changes need a restart; ignoring"
        );
    }

    let (store, invoker) = build_collaborators(&config)?;
    let (router, report) = EdgeRouter::load_after(&current, Arc::new(config), store, invoker).await;
    shared.replace(router);
    log_report(&report);
    tracing::info!("Configuration applied");
    Ok(report)
}

/// Apply config-file updates until shutdown.
pub fn spawn_config_reloader(
    shared: SharedRouter,
    mut updates: mpsc::UnboundedReceiver<EdgeConfig>,
    mut shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    let Some(config) = update else { break };
                    if let Err(e) = apply_update(&shared, config).await {
                        tracing::error!(error = %e, "Failed to apply configuration, keeping current snapshot");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}

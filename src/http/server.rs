//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, timeout, CORS)
//! - Hand every request to the current routing snapshot
//! - Serve until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::EdgeConfig;
use crate::http::middleware::{cors_layer, options_guard};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::ShutdownSignal;
use crate::routing::SharedRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: SharedRouter,
}

/// HTTP server for the edge router.
pub struct HttpServer {
    router: Router,
    config: Arc<EdgeConfig>,
}

impl HttpServer {
    /// Create a server over a shared routing snapshot.
    pub fn new(shared: SharedRouter) -> Self {
        let config = shared.snapshot().config().clone();
        let router = Self::build_router(&config, AppState { router: shared });
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &EdgeConfig, state: AppState) -> Router {
        let cors = cors_layer(state.router.clone());
        let guard = middleware::from_fn_with_state(state.clone(), options_guard);

        Router::new()
            .route("/", any(edge_handler))
            .route("/{*path}", any(edge_handler))
            .with_state(state)
            .layer(cors)
            .layer(guard)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The fully layered service, for driving in-process.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config the server was built with.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }
}

/// Catch-all handler: every request goes through the routing snapshot.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.router.snapshot().handle(request).await
}

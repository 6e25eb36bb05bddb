//! HTTP server setup and routing
//!
//! Sets up the Axum HTTP server with routes for job submission, status
//! polling, artifact retrieval, and cancellation.

use crate::error::{Error, Result};
use crate::job::JobCoordinator;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
///
/// **Note:** AppContext implements Clone, which gives us `FromRef<AppContext>`
/// for free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub coordinator: Arc<JobCoordinator>,
}

/// Build the application router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Job lifecycle
        .route("/jobs", post(super::handlers::submit_job))
        .route("/jobs/:job_id", get(super::handlers::job_status))
        .route("/jobs/:job_id/cancel", post(super::handlers::cancel_job))
        .route(
            "/jobs/:job_id/artifacts/:name",
            get(super::handlers::job_artifact),
        )
        // Attach application context
        .with_state(ctx)
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP API server until shutdown
pub async fn run(port: u16, ctx: AppContext) -> Result<()> {
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

//! Video Ad Tracker Service
//!
//! Entry point for the click ingestion service. It wires the HTTP surface to
//! the durable queue, starts the worker pool and periodic tasks, and handles
//! graceful shutdown.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use ad_tracker_service::{
    create_routes, graceful_shutdown, initialize_logging, setup_signal_handlers, ServiceConfig,
    ServiceState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging first
    initialize_logging()?;

    info!("Starting Ad Tracker Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServiceConfig::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    // Create service state
    let state = ServiceState::new(config).await?;

    // Root cancellation signal, threaded through every long-lived task
    let shutdown = CancellationToken::new();

    // Setup signal handlers for graceful shutdown
    setup_signal_handlers(shutdown.clone())?;
    info!("Signal handlers configured");

    // Start the worker pool and periodic tasks
    let mut handles = state.spawn_pipeline(&shutdown);

    // Start the HTTP server; it stops accepting new submissions on shutdown
    let routes = create_routes(state.queue.clone(), state.fallback.clone(), state.analytics.clone());
    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(
        ([0, 0, 0, 0], state.config.port),
        {
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        },
    );
    info!("Server listening on {}", addr);
    handles.push(tokio::spawn(server));

    // Wait for shutdown signal
    shutdown.cancelled().await;
    info!("Graceful shutdown initiated...");

    // Wait for workers, periodic tasks and the server behind the barrier
    graceful_shutdown(handles).await;

    // Close external client handles
    state.close().await;

    info!("Server shutdown complete");
    Ok(())
}

//! Signal handling for graceful shutdown

use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outer deadline on the shutdown barrier.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Setup signal handlers that cancel the root shutdown token.
pub fn setup_signal_handlers(shutdown: CancellationToken) -> Result<()> {
    // Handle Ctrl+C (SIGINT)
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C signal: {}", e);
                return;
            }

            info!("Ctrl+C signal received");
            shutdown.cancel();
        });
    }

    // Handle SIGTERM (Unix only)
    #[cfg(unix)]
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            use signal_hook::consts::SIGTERM;
            use std::sync::atomic::{AtomicBool, Ordering};
            use std::sync::Arc;

            let shutdown_flag = Arc::new(AtomicBool::new(false));

            // Register signal handler
            if let Err(e) = signal_hook::flag::register(SIGTERM, shutdown_flag.clone()) {
                error!("Failed to register SIGTERM handler: {}", e);
                return;
            }

            // Poll for signal
            loop {
                if shutdown_flag.load(Ordering::Relaxed) {
                    info!("SIGTERM signal received");
                    shutdown.cancel();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });
    }

    Ok(())
}

/// Graceful shutdown handler: wait for every background task behind a single
/// outer deadline. Workers left running are abandoned; their claimed
/// envelopes stay in the processing list for recovery on the next start.
pub async fn graceful_shutdown(handles: Vec<JoinHandle<()>>) {
    info!("Starting graceful shutdown...");

    let deadline = tokio::time::Instant::now() + SHUTDOWN_TIMEOUT;

    for handle in handles {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match timeout(remaining, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Background task failed during shutdown: {}", e);
            }
            Err(_) => {
                warn!(
                    "Background tasks did not stop within {:?}, forcing shutdown",
                    SHUTDOWN_TIMEOUT
                );
                return;
            }
        }
    }

    info!("Graceful shutdown complete");
}

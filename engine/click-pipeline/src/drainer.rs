//! Periodic replay of the disk fallback log into the primary queue

use std::time::Duration;

use click_queue::{FallbackLog, QueueError, ReliableQueue};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// How often the fallback log is replayed.
pub const DRAIN_INTERVAL: Duration = Duration::from_secs(60);

/// Replays fallback envelopes and shrinks the log afterwards. The file is
/// the sole durable store of admission-time fallbacks, so it is deleted only
/// after a complete drain and otherwise rewritten with the unprocessed tail.
pub struct FallbackDrainer {
    fallback: FallbackLog,
    queue: ReliableQueue,
}

impl FallbackDrainer {
    pub fn new(fallback: FallbackLog, queue: ReliableQueue) -> Self {
        Self { fallback, queue }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let start = tokio::time::Instant::now() + DRAIN_INTERVAL;
        let mut ticker = tokio::time::interval_at(start, DRAIN_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Fallback drain stopped due to shutdown");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_once().await {
                        error!("Fallback drain cycle failed: {}", e);
                    }
                }
            }
        }
    }

    /// One drain cycle. Envelopes whose queue push fails stay in the file
    /// for the next cycle; a crash mid-cycle can duplicate already-pushed
    /// envelopes but cannot lose them.
    pub async fn drain_once(&self) -> Result<(), QueueError> {
        if !self.fallback.exists() {
            return Ok(());
        }

        let entries = self.fallback.read_entries()?;
        let mut unprocessed = Vec::new();

        for entry in entries {
            let payload = serde_json::to_string(&entry)?;
            match self.queue.push_primary(&payload).await {
                Ok(()) => {}
                Err(e) => {
                    error!("Failed to requeue fallback event {}: {}", entry.event.id, e);
                    unprocessed.push(entry);
                }
            }
        }

        if unprocessed.is_empty() {
            self.fallback.remove()?;
            info!("Fallback log fully drained");
        } else {
            info!("Fallback drain left {} envelopes for the next cycle", unprocessed.len());
            self.fallback.rewrite(&unprocessed)?;
        }

        Ok(())
    }
}

//! Periodic snapshot of live counters into the relational store

use std::time::Duration;

use analytics_store::AnalyticsStore;
use event_log::{EventLog, EventLogError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// How often counters are snapshotted into the relational store.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Timeframe used for snapshot rows.
const SNAPSHOT_TIMEFRAME: &str = "1h";

/// Upserts one `ad_analytics` row per ad seen in the event log. Per-ad
/// failures are logged and skipped; they never abort a cycle.
pub struct AnalyticsReconciler {
    analytics: AnalyticsStore,
    event_log: EventLog,
}

impl AnalyticsReconciler {
    pub fn new(analytics: AnalyticsStore, event_log: EventLog) -> Self {
        Self { analytics, event_log }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let start = tokio::time::Instant::now() + RECONCILE_INTERVAL;
        let mut ticker = tokio::time::interval_at(start, RECONCILE_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Analytics reconciliation stopped due to shutdown");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile_once().await {
                        error!("Analytics reconciliation cycle failed: {}", e);
                    }
                }
            }
        }
    }

    /// One reconciliation cycle over every ad with logged clicks.
    pub async fn reconcile_once(&self) -> Result<(), EventLogError> {
        let ad_ids = self.event_log.distinct_ad_ids().await?;

        for ad_id in ad_ids {
            let analytics = match self.analytics.get_analytics(&ad_id, SNAPSHOT_TIMEFRAME).await {
                Ok(analytics) => analytics,
                Err(e) => {
                    error!("Failed to fetch analytics for ad {}: {}", ad_id, e);
                    continue;
                }
            };

            if let Err(e) = self.event_log.upsert_analytics(&ad_id, &analytics).await {
                error!("Failed to sync analytics for ad {}: {}", ad_id, e);
                continue;
            }

            debug!("Synced analytics snapshot for ad {}", ad_id);
        }

        Ok(())
    }
}

//! Service state management and component initialization

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use analytics_store::AnalyticsStore;
use click_pipeline::{AnalyticsReconciler, FallbackDrainer, WorkerPool};
use click_queue::{FallbackLog, ReliableQueue, FALLBACK_PATH};
use event_log::EventLog;

use crate::config::ServiceConfig;

/// Service state containing all initialized components
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    /// Reliable queue over the in-memory store
    pub queue: ReliableQueue,

    /// Disk fallback log for admission-time queue failures
    pub fallback: FallbackLog,

    /// Counter store adapter
    pub analytics: AnalyticsStore,

    /// Relational event log
    pub event_log: EventLog,
}

impl ServiceState {
    /// Connect every external collaborator and build the pipeline components.
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        info!("Initializing service components...");

        let event_log = EventLog::connect_with_retry(&config.database_url)
            .await
            .context("Exceeded max retries: unable to connect to database")?;

        info!("Connecting to Redis at {} (db {})", config.redis.addr, config.redis.db);
        let client =
            redis::Client::open(config.redis.url()).context("Invalid Redis connection settings")?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        let queue = ReliableQueue::new(conn.clone());
        let analytics = AnalyticsStore::new(conn);
        let fallback = FallbackLog::new(FALLBACK_PATH);

        info!("Service components initialized successfully");
        Ok(Self { config, queue, fallback, analytics, event_log })
    }

    /// Spawn the worker pool and both periodic tasks; all run until the
    /// shutdown token is cancelled.
    pub fn spawn_pipeline(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        let pool = WorkerPool::new(
            self.queue.clone(),
            self.event_log.clone(),
            self.analytics.clone(),
            self.config.worker_count,
        );
        let mut handles = pool.spawn(shutdown.clone());
        info!("Started {} queue workers", self.config.worker_count);

        let drainer = FallbackDrainer::new(self.fallback.clone(), self.queue.clone());
        handles.push(drainer.spawn(shutdown.clone()));

        let reconciler = AnalyticsReconciler::new(self.analytics.clone(), self.event_log.clone());
        handles.push(reconciler.spawn(shutdown.clone()));

        handles
    }

    /// Close external client handles after the shutdown barrier. The
    /// database pool has a true close; the Redis connection manager tears
    /// down when its last clone drops, and neither path can fail, so there
    /// is no close error to report.
    pub async fn close(self) {
        self.event_log.close().await;
        info!("Database pool closed");

        drop(self.queue);
        drop(self.analytics);
        info!("Redis connection handles released");
    }
}

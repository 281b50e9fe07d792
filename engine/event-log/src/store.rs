//! Postgres adapter for click events and analytics snapshots

use std::time::Duration;

use analytics_store::AdAnalytics;
use click_queue::ClickEvent;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::Result;

/// Bounded attempts when connecting at startup.
pub const CONNECT_ATTEMPTS: u32 = 10;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Event log backed by a shared connection pool; safe for concurrent use by
/// all workers.
#[derive(Clone)]
pub struct EventLog {
    pool: PgPool,
}

impl EventLog {
    /// Connect and verify the database is reachable.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Connect with bounded retries and linearly increasing backoff; the
    /// final attempt's error is returned so startup can fail hard.
    pub async fn connect_with_retry(url: &str) -> Result<Self> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::connect(url).await {
                Ok(log) => {
                    info!("Connected to database");
                    return Ok(log);
                }
                Err(e) if attempt >= CONNECT_ATTEMPTS => return Err(e),
                Err(e) => {
                    warn!("Attempt {}/{}: database unreachable: {}", attempt, CONNECT_ATTEMPTS, e)
                }
            }
            tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
        }
    }

    /// Insert a click event. Idempotent on `id`: re-delivered envelopes leave
    /// exactly one row behind.
    pub async fn insert_click(&self, event: &ClickEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO click_events (id, ad_id, timestamp, ip_address, video_playback_time)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&event.id)
        .bind(&event.ad_id)
        .bind(event.timestamp)
        .bind(&event.ip_address)
        .bind(event.video_playback_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert the aggregated snapshot row for an ad.
    pub async fn upsert_analytics(&self, ad_id: &str, analytics: &AdAnalytics) -> Result<()> {
        sqlx::query(
            "INSERT INTO ad_analytics (ad_id, total_clicks, unique_clicks, impressions, ctr, updated_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             ON CONFLICT (ad_id) DO UPDATE SET
                 total_clicks = EXCLUDED.total_clicks,
                 unique_clicks = EXCLUDED.unique_clicks,
                 impressions = EXCLUDED.impressions,
                 ctr = EXCLUDED.ctr,
                 updated_at = NOW()",
        )
        .bind(ad_id)
        .bind(analytics.total_clicks)
        .bind(analytics.unique_clicks)
        .bind(analytics.impressions)
        .bind(analytics.ctr)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Every ad id with at least one logged click; drives the reconciler.
    pub async fn distinct_ad_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>("SELECT DISTINCT ad_id FROM click_events")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Close the pool during graceful shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

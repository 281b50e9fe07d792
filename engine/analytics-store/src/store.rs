//! Counter store adapter
//!
//! Key schemas are part of the external contract shared with dashboards and
//! operational tooling; keep them stable.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Aggregated analytics document for a single ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdAnalytics {
    pub total_clicks: i64,
    pub unique_clicks: i64,
    pub hourly_clicks: HashMap<String, i64>,
    pub impressions: i64,
    pub ctr: f64,
}

/// Redis-backed counter store.
#[derive(Clone)]
pub struct AnalyticsStore {
    conn: ConnectionManager,
}

impl AnalyticsStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Increment the total-click counter for an ad.
    pub async fn increment_total(&self, ad_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.incr(total_key(ad_id), 1i64).await?;
        Ok(())
    }

    /// Add a viewer IP to the per-ad unique-cardinality estimator.
    pub async fn add_unique(&self, ad_id: &str, ip: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.pfadd(unique_key(ad_id), ip).await?;
        Ok(())
    }

    /// Increment the per-ad, per-day hash bucket for the event's hour.
    pub async fn increment_hourly(&self, ad_id: &str, t: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = hourly_key(ad_id, t);
        let hour = t.format("%H").to_string();
        let _: () = conn.hincr(key, hour, 1i64).await?;
        Ok(())
    }

    /// Increment the impression counter for an ad.
    pub async fn increment_impression(&self, ad_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.incr(impression_key(ad_id), 1i64).await?;
        Ok(())
    }

    /// Read the impression counter; a missing key reads as zero.
    pub async fn total_impressions(&self, ad_id: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let impressions: Option<i64> = conn.get(impression_key(ad_id)).await?;
        Ok(impressions.unwrap_or(0))
    }

    /// Aggregate the counters for an ad over the given timeframe.
    ///
    /// Hours are summed by hour-of-day across the trailing-day window, so a
    /// one-day window yields today's distribution and longer windows an
    /// hour-of-day histogram. Missing daily hashes contribute nothing.
    pub async fn get_analytics(&self, ad_id: &str, timeframe: &str) -> Result<AdAnalytics> {
        let mut conn = self.conn.clone();

        let total_clicks: Option<i64> = conn.get(total_key(ad_id)).await?;
        let total_clicks = total_clicks.unwrap_or(0);

        let unique_clicks: i64 = conn.pfcount(unique_key(ad_id)).await?;

        let mut hourly_clicks = HashMap::new();
        let now = Utc::now();
        for day_offset in 0..timeframe_days(timeframe) {
            let day = now - Duration::days(day_offset);
            let fields: HashMap<String, String> = conn.hgetall(hourly_key(ad_id, day)).await?;
            merge_hourly(&mut hourly_clicks, &fields);
        }

        let impressions = self.total_impressions(ad_id).await?;
        let ctr = click_through_rate(total_clicks, impressions);

        debug!(
            "Fetched analytics for ad {}: total={} unique={} impressions={} ctr={}",
            ad_id, total_clicks, unique_clicks, impressions, ctr
        );

        Ok(AdAnalytics { total_clicks, unique_clicks, hourly_clicks, impressions, ctr })
    }
}

fn total_key(ad_id: &str) -> String {
    format!("ad:clicks:total:{ad_id}")
}

fn unique_key(ad_id: &str) -> String {
    format!("ads:clicks:unique:{ad_id}")
}

fn hourly_key(ad_id: &str, t: DateTime<Utc>) -> String {
    format!("ad:clicks:hourly:{}:{}", ad_id, t.format("%Y%m%d"))
}

fn impression_key(ad_id: &str) -> String {
    format!("ad:impressions:total:{ad_id}")
}

/// Map a timeframe to its trailing-days window. Unknown timeframes widen to
/// a month.
fn timeframe_days(timeframe: &str) -> i64 {
    match timeframe {
        "1h" | "24h" => 1,
        "7d" => 7,
        _ => 30,
    }
}

/// Fold one day's hour-field hash into the accumulated hour-of-day buckets.
/// Non-numeric field values are ignored.
fn merge_hourly(acc: &mut HashMap<String, i64>, fields: &HashMap<String, String>) {
    for (hour, value) in fields {
        if let Ok(count) = value.parse::<i64>() {
            *acc.entry(hour.clone()).or_insert(0) += count;
        }
    }
}

fn click_through_rate(total_clicks: i64, impressions: i64) -> f64 {
    if impressions > 0 {
        total_clicks as f64 / impressions as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_schemas_match_the_store_contract() {
        let t = Utc.with_ymd_and_hms(2025, 7, 2, 18, 0, 0).unwrap();
        assert_eq!(total_key("ad-1"), "ad:clicks:total:ad-1");
        assert_eq!(unique_key("ad-1"), "ads:clicks:unique:ad-1");
        assert_eq!(hourly_key("ad-1", t), "ad:clicks:hourly:ad-1:20250702");
        assert_eq!(impression_key("ad-1"), "ad:impressions:total:ad-1");
    }

    #[test]
    fn timeframes_map_to_trailing_day_windows() {
        assert_eq!(timeframe_days("1h"), 1);
        assert_eq!(timeframe_days("24h"), 1);
        assert_eq!(timeframe_days("7d"), 7);
        assert_eq!(timeframe_days("30d"), 30);
        assert_eq!(timeframe_days("anything-else"), 30);
    }

    #[test]
    fn hourly_buckets_sum_across_days_by_hour_of_day() {
        let mut acc = HashMap::new();

        let mut today = HashMap::new();
        today.insert("18".to_string(), "5".to_string());
        today.insert("19".to_string(), "1".to_string());
        merge_hourly(&mut acc, &today);

        let mut yesterday = HashMap::new();
        yesterday.insert("18".to_string(), "2".to_string());
        yesterday.insert("bogus".to_string(), "not-a-number".to_string());
        merge_hourly(&mut acc, &yesterday);

        assert_eq!(acc.get("18"), Some(&7));
        assert_eq!(acc.get("19"), Some(&1));
        assert!(!acc.contains_key("bogus"));
    }

    #[test]
    fn missing_days_contribute_nothing() {
        let mut acc = HashMap::new();
        merge_hourly(&mut acc, &HashMap::new());
        assert!(acc.is_empty());
    }

    #[test]
    fn ctr_is_zero_without_impressions() {
        assert_eq!(click_through_rate(10, 20), 0.5);
        assert_eq!(click_through_rate(10, 0), 0.0);
        assert_eq!(click_through_rate(0, 5), 0.0);
    }

    #[test]
    fn analytics_document_serializes_with_camel_case_fields() {
        let analytics = AdAnalytics {
            total_clicks: 10,
            unique_clicks: 3,
            hourly_clicks: HashMap::new(),
            impressions: 20,
            ctr: 0.5,
        };
        let json = serde_json::to_string(&analytics).unwrap();
        assert!(json.contains("\"totalClicks\":10"));
        assert!(json.contains("\"uniqueClicks\":3"));
        assert!(json.contains("\"hourlyClicks\":{}"));
        assert!(json.contains("\"impressions\":20"));
        assert!(json.contains("\"ctr\":0.5"));
    }
}

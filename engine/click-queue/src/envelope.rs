//! Click event and retry envelope types
//!
//! The envelope is the unit of work on the queue: a click event plus the
//! number of delivery attempts spent on it so far.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery attempts after which an envelope is dead-lettered.
pub const MAX_RETRY: u32 = 3;

/// A single click on a video advertisement.
///
/// `id` is assigned at admission and never changes afterwards; the event log
/// deduplicates on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub id: String,
    pub ad_id: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub video_playback_time: f64,
}

impl ClickEvent {
    /// Build an admitted event. A fresh id is always assigned; the timestamp
    /// only when the submitter omitted one.
    pub fn admit(
        ad_id: String,
        ip_address: String,
        timestamp: Option<DateTime<Utc>>,
        video_playback_time: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ad_id,
            timestamp: timestamp.unwrap_or_else(Utc::now),
            ip_address,
            video_playback_time,
        }
    }
}

/// Queue payload wrapping a click event with its retry count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryableClick {
    pub event: ClickEvent,
    pub retry: u32,
}

/// Where an envelope goes after a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Requeue,
    DeadLetter,
}

impl RetryableClick {
    pub fn new(event: ClickEvent) -> Self {
        Self { event, retry: 0 }
    }

    /// Record a failed delivery attempt and report the envelope's next stop.
    pub fn record_failure(&mut self) -> RetryOutcome {
        self.retry += 1;
        if self.retry >= MAX_RETRY {
            RetryOutcome::DeadLetter
        } else {
            RetryOutcome::Requeue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> ClickEvent {
        ClickEvent {
            id: "e7b54f7e-0000-0000-0000-000000000000".to_string(),
            ad_id: "ad-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 2, 18, 30, 0).unwrap(),
            ip_address: "1.1.1.1".to_string(),
            video_playback_time: 10.5,
        }
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let wrapper = RetryableClick::new(sample_event());
        let json = serde_json::to_string(&wrapper).unwrap();
        let decoded: RetryableClick = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, wrapper);
    }

    #[test]
    fn envelope_uses_camel_case_wire_fields() {
        let wrapper = RetryableClick::new(sample_event());
        let json = serde_json::to_string(&wrapper).unwrap();
        assert!(json.contains("\"adId\":\"ad-1\""));
        assert!(json.contains("\"ipAddress\":\"1.1.1.1\""));
        assert!(json.contains("\"videoPlaybackTime\":10.5"));
        assert!(json.contains("\"retry\":0"));
    }

    #[test]
    fn admit_assigns_fresh_id_and_defaults_timestamp() {
        let event = ClickEvent::admit("ad-1".to_string(), "1.1.1.1".to_string(), None, 0.0);
        assert!(!event.id.is_empty());
        assert!(Utc::now().signed_duration_since(event.timestamp).num_seconds() < 5);

        let supplied = Utc.with_ymd_and_hms(2025, 7, 2, 18, 0, 0).unwrap();
        let event =
            ClickEvent::admit("ad-1".to_string(), "1.1.1.1".to_string(), Some(supplied), 0.0);
        assert_eq!(event.timestamp, supplied);
    }

    #[test]
    fn admit_assigns_distinct_ids() {
        let a = ClickEvent::admit("ad".to_string(), "ip".to_string(), None, 0.0);
        let b = ClickEvent::admit("ad".to_string(), "ip".to_string(), None, 0.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn retries_requeue_until_the_cap_then_dead_letter() {
        let mut wrapper = RetryableClick::new(sample_event());

        assert_eq!(wrapper.record_failure(), RetryOutcome::Requeue);
        assert_eq!(wrapper.retry, 1);
        assert_eq!(wrapper.record_failure(), RetryOutcome::Requeue);
        assert_eq!(wrapper.retry, 2);
        assert_eq!(wrapper.record_failure(), RetryOutcome::DeadLetter);
        assert_eq!(wrapper.retry, 3);
    }
}

//! HTTP surface for the click pipeline
//!
//! Admission is best-effort durable: a click submission is answered with
//! 202 whenever either the primary queue or the disk fallback recorded it.
//! Producers are never pushed back on.

use std::collections::HashMap;

use analytics_store::AnalyticsStore;
use chrono::{DateTime, Utc};
use click_queue::{ClickEvent, FallbackLog, ReliableQueue, RetryableClick};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::Filter;

/// Incoming click submission. A supplied `id` is ignored (admission stamps
/// its own); a supplied timestamp is kept.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClickSubmission {
    #[serde(default)]
    ad_id: String,
    #[serde(default)]
    ip_address: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    video_playback_time: f64,
}

#[derive(Debug, Deserialize)]
struct ImpressionRequest {
    ad_id: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

/// Create the HTTP routes
pub fn create_routes(
    queue: ReliableQueue,
    fallback: FallbackLog,
    analytics: AnalyticsStore,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let queue_filter = warp::any().map(move || queue.clone());
    let fallback_filter = warp::any().map(move || fallback.clone());
    let analytics_filter = warp::any().map(move || analytics.clone());

    // Click admission endpoint
    let click = warp::path("ads")
        .and(warp::path("click"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(queue_filter)
        .and(fallback_filter)
        .and_then(handle_click);

    // Impression counting endpoint
    let impression = warp::path("ads")
        .and(warp::path("impression"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(analytics_filter.clone())
        .and_then(handle_impression);

    // Aggregated analytics read endpoint
    let analytics_route = warp::path("ads")
        .and(warp::path("analytics"))
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(analytics_filter)
        .and_then(handle_analytics);

    click.or(impression).or(analytics_route)
}

async fn handle_click(
    submission: ClickSubmission,
    queue: ReliableQueue,
    fallback: FallbackLog,
) -> Result<impl warp::Reply, warp::Rejection> {
    if submission.ad_id.is_empty() || submission.ip_address.is_empty() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&ErrorResponse { error: "Missing adId or ipAddress" }),
            StatusCode::BAD_REQUEST,
        ));
    }

    let event = ClickEvent::admit(
        submission.ad_id,
        submission.ip_address,
        submission.timestamp,
        submission.video_playback_time,
    );
    info!("Received click event {} for ad {} from {}", event.id, event.ad_id, event.ip_address);

    let wrapper = RetryableClick::new(event);
    let payload = match serde_json::to_string(&wrapper) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize click event for ad {}: {}", wrapper.event.ad_id, e);
            return Ok(warp::reply::with_status(
                warp::reply::json(&MessageResponse { message: "Failed to serialize click" }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };

    if let Err(e) = queue.push_primary(&payload).await {
        error!("Failed to push click event to queue for ad {}: {}", wrapper.event.ad_id, e);
        if let Err(e) = fallback.append(&payload) {
            error!("Failed to write click event to fallback log: {}", e);
        }
        return Ok(warp::reply::with_status(
            warp::reply::json(&MessageResponse { message: "Queued via fallback" }),
            StatusCode::ACCEPTED,
        ));
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&MessageResponse { message: "Click event queued" }),
        StatusCode::ACCEPTED,
    ))
}

async fn handle_impression(
    request: ImpressionRequest,
    analytics: AnalyticsStore,
) -> Result<Box<dyn warp::Reply>, warp::Rejection> {
    let ad_id = match request.ad_id.filter(|id| !id.is_empty()) {
        Some(ad_id) => ad_id,
        None => {
            return Ok(Box::new(warp::reply::with_status(
                warp::reply::json(&ErrorResponse { error: "Missing or invalid ad_id" }),
                StatusCode::BAD_REQUEST,
            )));
        }
    };

    match analytics.increment_impression(&ad_id).await {
        Ok(()) => Ok(Box::new(StatusCode::NO_CONTENT)),
        Err(e) => {
            error!("Failed to record impression for ad {}: {}", ad_id, e);
            Ok(Box::new(warp::reply::with_status(
                warp::reply::json(&ErrorResponse { error: "Failed to record impression" }),
                StatusCode::INTERNAL_SERVER_ERROR,
            )))
        }
    }
}

async fn handle_analytics(
    params: HashMap<String, String>,
    analytics: AnalyticsStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (Some(ad_id), Some(timeframe)) = (params.get("adId"), params.get("timeframe")) else {
        warn!("Analytics request missing required query parameters");
        return Ok(warp::reply::with_status(
            warp::reply::json(&ErrorResponse { error: "adId and timeframe are required" }),
            StatusCode::BAD_REQUEST,
        ));
    };

    match analytics.get_analytics(ad_id, timeframe).await {
        Ok(data) => Ok(warp::reply::with_status(warp::reply::json(&data), StatusCode::OK)),
        Err(e) => {
            error!("Failed to fetch analytics for ad {}: {}", ad_id, e);
            Ok(warp::reply::with_status(
                warp::reply::json(&ErrorResponse { error: "Failed to fetch analytics" }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_tolerates_missing_optional_fields() {
        let submission: ClickSubmission =
            serde_json::from_str(r#"{"adId":"ad-1","ipAddress":"1.1.1.1"}"#).unwrap();
        assert_eq!(submission.ad_id, "ad-1");
        assert_eq!(submission.ip_address, "1.1.1.1");
        assert!(submission.timestamp.is_none());
        assert_eq!(submission.video_playback_time, 0.0);
    }

    #[test]
    fn submission_ignores_a_supplied_id() {
        let submission: ClickSubmission = serde_json::from_str(
            r#"{"id":"forged","adId":"ad-1","ipAddress":"1.1.1.1","videoPlaybackTime":10.5}"#,
        )
        .unwrap();
        assert_eq!(submission.video_playback_time, 10.5);
    }

    #[test]
    fn submission_keeps_a_supplied_timestamp() {
        let submission: ClickSubmission = serde_json::from_str(
            r#"{"adId":"ad-1","ipAddress":"1.1.1.1","timestamp":"2025-07-02T18:00:00Z"}"#,
        )
        .unwrap();
        let event = ClickEvent::admit(
            submission.ad_id,
            submission.ip_address,
            submission.timestamp,
            submission.video_playback_time,
        );
        assert_eq!(event.timestamp.to_rfc3339(), "2025-07-02T18:00:00+00:00");
    }
}

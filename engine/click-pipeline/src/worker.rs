//! At-least-once queue consumers
//!
//! Each worker loops health gate -> claim -> decode -> persist -> counters ->
//! ack until shutdown. Requeue-or-dead-letter happens before the original
//! envelope is acked, so a crash in between duplicates work instead of
//! losing it; the idempotent event-log insert absorbs the duplicate.

use std::time::Duration;

use analytics_store::AnalyticsStore;
use click_queue::{QueueError, ReliableQueue, RetryOutcome, RetryableClick};
use event_log::EventLog;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Workers spawned when the configuration does not say otherwise.
pub const DEFAULT_WORKER_COUNT: usize = 4;

const HEALTH_RETRY_SLEEP: Duration = Duration::from_secs(3);
const IDLE_SLEEP: Duration = Duration::from_secs(1);
const FAILURE_SLEEP: Duration = Duration::from_secs(2);

/// Pool of independent queue consumers sharing the queue and both sinks.
#[derive(Clone)]
pub struct WorkerPool {
    queue: ReliableQueue,
    event_log: EventLog,
    analytics: AnalyticsStore,
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(
        queue: ReliableQueue,
        event_log: EventLog,
        analytics: AnalyticsStore,
        worker_count: usize,
    ) -> Self {
        Self { queue, event_log, analytics, worker_count }
    }

    /// Spawn the configured number of workers; each runs until the shutdown
    /// token is cancelled.
    pub fn spawn(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..self.worker_count)
            .map(|worker_id| {
                let pool = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { pool.run_worker(worker_id, shutdown).await })
            })
            .collect()
    }

    async fn run_worker(&self, worker_id: usize, shutdown: CancellationToken) {
        info!("[worker {}] started", worker_id);

        loop {
            if shutdown.is_cancelled() {
                info!("[worker {}] shutdown signal received, exiting", worker_id);
                return;
            }

            if let Err(e) = self.queue.ping().await {
                warn!("[worker {}] store not reachable: {}", worker_id, e);
                sleep_or_shutdown(&shutdown, HEALTH_RETRY_SLEEP).await;
                continue;
            }

            let payload = match self.queue.claim().await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    sleep_or_shutdown(&shutdown, IDLE_SLEEP).await;
                    continue;
                }
                Err(e) => {
                    if !matches!(e, QueueError::ClaimDeadline(_)) {
                        error!("[worker {}] claim failed: {}", worker_id, e);
                    }
                    sleep_or_shutdown(&shutdown, IDLE_SLEEP).await;
                    continue;
                }
            };

            // The claimed envelope is processed to completion even when
            // shutdown arrives mid-flight.
            let mut wrapper: RetryableClick = match serde_json::from_str(&payload) {
                Ok(wrapper) => wrapper,
                Err(e) => {
                    // Permanently malformed: it cannot be rehydrated, so it
                    // is acked away rather than dead-lettered.
                    error!("[worker {}] envelope decode failed: {}. Discarding.", worker_id, e);
                    if let Err(e) = self.queue.ack(&payload).await {
                        error!("[worker {}] ack of malformed envelope failed: {}", worker_id, e);
                    }
                    continue;
                }
            };

            if let Err(e) = self.event_log.insert_click(&wrapper.event).await {
                error!(
                    "[worker {}] insert failed for ad {}: {}",
                    worker_id, wrapper.event.ad_id, e
                );
                self.retry_or_dead_letter(worker_id, &payload, &mut wrapper).await;
                sleep_or_shutdown(&shutdown, FAILURE_SLEEP).await;
                continue;
            }

            self.apply_counters(worker_id, &wrapper).await;

            if let Err(e) = self.queue.ack(&payload).await {
                error!("[worker {}] ack failed: {}", worker_id, e);
            }
        }
    }

    /// Requeue the envelope with its bumped retry count, or dead-letter it at
    /// the cap, then ack the original. Push-then-remove ordering: the worst
    /// case across a crash is duplication, never loss.
    async fn retry_or_dead_letter(
        &self,
        worker_id: usize,
        original_payload: &str,
        wrapper: &mut RetryableClick,
    ) {
        match plan_retry_hand_off(wrapper) {
            Ok(FailureHandOff::Requeue(updated)) => {
                if let Err(e) = self.queue.push_primary(&updated).await {
                    error!("[worker {}] failed to requeue retry envelope: {}", worker_id, e);
                }
            }
            Ok(FailureHandOff::DeadLetter(updated)) => {
                warn!(
                    "[worker {}] retries exhausted for event {}, dead-lettering",
                    worker_id, wrapper.event.id
                );
                if let Err(e) = self.queue.push_dlq(&updated).await {
                    error!("[worker {}] failed to dead-letter envelope: {}", worker_id, e);
                }
            }
            Err(e) => {
                error!("[worker {}] failed to re-serialize retry envelope: {}", worker_id, e);
            }
        }

        // The ack argument is the claimed byte sequence itself; the hand-off
        // payload above is a fresh serialization and would match nothing in
        // the processing list.
        if let Err(e) = self.queue.ack(original_payload).await {
            error!("[worker {}] ack after persist failure failed: {}", worker_id, e);
        }
    }

    /// Best-effort counter side-effects; failures never block acking the
    /// event, missed increments are accepted loss.
    async fn apply_counters(&self, worker_id: usize, wrapper: &RetryableClick) {
        let event = &wrapper.event;

        if let Err(e) = self.analytics.increment_total(&event.ad_id).await {
            warn!("[worker {}] total-click increment failed: {}", worker_id, e);
        }
        if let Err(e) = self.analytics.add_unique(&event.ad_id, &event.ip_address).await {
            warn!("[worker {}] unique-click add failed: {}", worker_id, e);
        }
        if let Err(e) = self.analytics.increment_hourly(&event.ad_id, event.timestamp).await {
            warn!("[worker {}] hourly increment failed: {}", worker_id, e);
        }
    }
}

/// Queue hand-off planned for a claimed envelope that failed to persist.
/// The carried string is a fresh serialization with the bumped retry count;
/// the claimed payload is left untouched for the subsequent ack.
#[derive(Debug, PartialEq)]
enum FailureHandOff {
    Requeue(String),
    DeadLetter(String),
}

fn plan_retry_hand_off(wrapper: &mut RetryableClick) -> serde_json::Result<FailureHandOff> {
    match wrapper.record_failure() {
        RetryOutcome::Requeue => Ok(FailureHandOff::Requeue(serde_json::to_string(wrapper)?)),
        RetryOutcome::DeadLetter => Ok(FailureHandOff::DeadLetter(serde_json::to_string(wrapper)?)),
    }
}

/// Sleep, waking early when shutdown fires; the loop head notices the
/// cancelled token on the next pass.
async fn sleep_or_shutdown(shutdown: &CancellationToken, duration: Duration) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::time::sleep(duration) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Formatting a producer might emit: spaced separators and a field order
    // serde would never reproduce.
    fn claimed_payload() -> String {
        concat!(
            "{ \"retry\": 0, \"event\": { \"videoPlaybackTime\": 10.5, ",
            "\"ipAddress\": \"1.1.1.1\", \"timestamp\": \"2025-07-02T18:00:00Z\", ",
            "\"adId\": \"ad-1\", \"id\": \"click-1\" } }"
        )
        .to_string()
    }

    #[test]
    fn retry_hand_off_reserializes_and_leaves_the_claimed_bytes_for_ack() {
        let claimed = claimed_payload();
        let mut wrapper: RetryableClick = serde_json::from_str(&claimed).unwrap();

        let FailureHandOff::Requeue(updated) = plan_retry_hand_off(&mut wrapper).unwrap() else {
            panic!("first failure must requeue");
        };

        // The requeued payload carries the bumped count and is not the
        // claimed byte sequence; removing it from the processing list would
        // match nothing, so the ack must use the claimed bytes.
        assert_ne!(updated, claimed);
        assert!(updated.contains("\"retry\":1"));
        let reparsed: RetryableClick = serde_json::from_str(&updated).unwrap();
        assert_eq!(reparsed.event, wrapper.event);
    }

    #[test]
    fn retry_hand_off_dead_letters_at_the_cap() {
        let mut wrapper: RetryableClick = serde_json::from_str(&claimed_payload()).unwrap();
        wrapper.retry = 2;

        match plan_retry_hand_off(&mut wrapper).unwrap() {
            FailureHandOff::DeadLetter(updated) => {
                assert!(updated.contains("\"retry\":3"));
            }
            FailureHandOff::Requeue(_) => panic!("cap reached, must dead-letter"),
        }
    }
}

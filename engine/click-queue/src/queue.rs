//! Reliable queue over three Redis lists
//!
//! Producers push onto the head of the primary list; workers claim with an
//! atomic RPOPLPUSH from its tail onto the processing list. An envelope
//! leaves the processing list only through its terminal action, so a crash
//! between claim and ack leaves it visible there for recovery.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::time::timeout;

use crate::error::{QueueError, Result};

/// Admitted envelopes awaiting processing.
pub const PRIMARY_LIST: &str = "click_queue";
/// In-flight envelopes currently owned by some worker.
pub const PROCESSING_LIST: &str = "click_processing";
/// Terminal store for envelopes that exhausted their retries.
pub const DEAD_LIST: &str = "click_dead";

/// Deadline on the atomic claim call.
pub const CLAIM_DEADLINE: Duration = Duration::from_secs(5);
/// Deadline on the health probe.
pub const PING_DEADLINE: Duration = Duration::from_secs(3);

/// The primary/processing/dead-letter list abstraction.
#[derive(Clone)]
pub struct ReliableQueue {
    conn: ConnectionManager,
}

impl ReliableQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Push a serialized envelope onto the head of the primary list.
    pub async fn push_primary(&self, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(PRIMARY_LIST, payload).await?;
        Ok(())
    }

    /// Atomically move the tail of the primary list onto the head of the
    /// processing list and return it. `None` when the primary list is empty.
    pub async fn claim(&self) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        match timeout(CLAIM_DEADLINE, async {
            let moved: Option<String> = conn.rpoplpush(PRIMARY_LIST, PROCESSING_LIST).await?;
            Ok::<_, redis::RedisError>(moved)
        })
        .await
        {
            Ok(moved) => Ok(moved?),
            Err(_) => Err(QueueError::ClaimDeadline(CLAIM_DEADLINE)),
        }
    }

    /// Remove every occurrence of the given payload from the processing list.
    ///
    /// The argument must be the exact byte sequence returned by `claim`;
    /// a re-serialized envelope would not match.
    pub async fn ack(&self, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.lrem(PROCESSING_LIST, 0, payload).await?;
        Ok(())
    }

    /// Append an exhausted envelope to the dead-letter list.
    pub async fn push_dlq(&self, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(DEAD_LIST, payload).await?;
        Ok(())
    }

    /// Probe the store, bounded by [`PING_DEADLINE`].
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        match timeout(PING_DEADLINE, redis::cmd("PING").query_async::<String>(&mut conn)).await {
            Ok(pong) => {
                pong?;
                Ok(())
            }
            Err(_) => Err(QueueError::ProbeDeadline(PING_DEADLINE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_names_match_the_store_contract() {
        assert_eq!(PRIMARY_LIST, "click_queue");
        assert_eq!(PROCESSING_LIST, "click_processing");
        assert_eq!(DEAD_LIST, "click_dead");
    }
}

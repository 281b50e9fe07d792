//! Durable click queue: the Redis-backed reliable queue, the retry envelope
//! it carries, and the disk fallback log used when the queue is unreachable
//! at admission time.

pub mod envelope;
pub mod error;
pub mod fallback;
pub mod queue;

pub use envelope::{ClickEvent, RetryOutcome, RetryableClick, MAX_RETRY};
pub use error::{QueueError, Result};
pub use fallback::{FallbackLog, FALLBACK_PATH};
pub use queue::{ReliableQueue, CLAIM_DEADLINE, DEAD_LIST, PRIMARY_LIST, PROCESSING_LIST};

//! Error types for the queue layer

use std::time::Duration;

use thiserror::Error;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors that can occur in the queue layer
#[derive(Error, Debug)]
pub enum QueueError {
    /// Redis errors (connection, command failures)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Envelope serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Fallback log I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The atomic claim did not complete within its deadline
    #[error("Claim deadline of {0:?} elapsed")]
    ClaimDeadline(Duration),

    /// The health probe did not complete within its deadline
    #[error("Health probe deadline of {0:?} elapsed")]
    ProbeDeadline(Duration),
}

//! Error types for the analytics counter store

use thiserror::Error;

/// Result type alias for counter-store operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Errors that can occur against the counter store
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Redis errors (connection, command failures)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

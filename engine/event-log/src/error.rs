//! Error types for the event log

use thiserror::Error;

/// Result type alias for event-log operations
pub type Result<T> = std::result::Result<T, EventLogError>;

/// Errors that can occur against the relational store
#[derive(Error, Debug)]
pub enum EventLogError {
    /// Database errors (connection, query failures)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

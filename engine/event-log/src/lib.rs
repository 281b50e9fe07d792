//! Transactional click-event log over Postgres
//!
//! Idempotent click-event inserts keyed on the admission-time id, plus the
//! aggregated per-ad snapshot rows the reconciler maintains.

pub mod error;
pub mod store;

pub use error::{EventLogError, Result};
pub use store::EventLog;

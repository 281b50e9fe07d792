//! Real-time ad analytics counters over Redis
//!
//! Thin adapter exposing the counter operations the click pipeline uses:
//! total clicks, unique-viewer cardinality, hourly distributions,
//! impressions, and the aggregated analytics document derived from them.

pub mod error;
pub mod store;

pub use error::{AnalyticsError, Result};
pub use store::{AdAnalytics, AnalyticsStore};

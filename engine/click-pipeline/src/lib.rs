//! Asynchronous click-processing pipeline
//!
//! The consumers of the durable queue: the at-least-once worker pool writing
//! into both sinks, the periodic drainer replaying the disk fallback log, and
//! the periodic reconciler snapshotting counters into the relational store.

pub mod drainer;
pub mod reconciler;
pub mod worker;

pub use drainer::{FallbackDrainer, DRAIN_INTERVAL};
pub use reconciler::{AnalyticsReconciler, RECONCILE_INTERVAL};
pub use worker::{WorkerPool, DEFAULT_WORKER_COUNT};

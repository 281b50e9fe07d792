//! Ad Tracker Service Library
//!
//! This library provides the service shell around the durable click
//! ingestion pipeline: configuration management, logging, the HTTP surface,
//! signal handling and graceful shutdown.

pub mod config;
pub mod logging;
pub mod routes;
pub mod service;
pub mod signals;

pub use config::ServiceConfig;
pub use logging::initialize_logging;
pub use routes::create_routes;
pub use service::ServiceState;
pub use signals::{graceful_shutdown, setup_signal_handlers, SHUTDOWN_TIMEOUT};

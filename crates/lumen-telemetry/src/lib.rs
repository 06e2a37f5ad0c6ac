//! Logging infrastructure for the Lumen device agent.
//!
//! Structured `tracing` logging with JSON output for production and a
//! pretty format for development.
//!
//! # Usage
//!
//! ```ignore
//! use lumen_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::new().with_log_level("info");
//! init_logging(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::{events, init_logging};

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

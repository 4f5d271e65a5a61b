//! # Ariadne Telemetry
//!
//! Structured logging for the Ariadne request pipeline.
//!
//! - [`init_logging`] installs a JSON, pretty or compact `tracing` subscriber
//! - [`fields`] names the structured fields every stage logs with

#![doc(html_root_url = "https://docs.rs/ariadne-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

//! # Merino Telemetry
//!
//! Logging setup for Merino applications. The framework crates only emit
//! `tracing` events; call [`init_logging`] once at startup to see them.
//!
//! | Target         | Level   | Events                                      |
//! |----------------|---------|---------------------------------------------|
//! | `merino`       | `info`  | application start, route counts             |
//! | `merino`       | `debug` | per-route normalization, binding failures   |
//! | `merino_bind`  | `trace` | resolved binder per parameter               |

#![doc(html_root_url = "https://docs.rs/merino-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

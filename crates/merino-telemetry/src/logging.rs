//! Structured logging for Merino.
//!
//! Normalization and request binding emit `tracing` events; this module
//! installs a `tracing-subscriber` pipeline that writes them as JSON lines
//! (production) or human-readable text (development).
//!
//! # Example
//!
//! ```rust,no_run
//! use merino_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(routes = 3, "application started");
//! # Ok::<(), merino_telemetry::TelemetryError>(())
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, human-readable output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `merino=debug,merino_bind=trace`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Whether to emit span open/close events.
    pub span_events: bool,

    /// Whether to include file and line.
    pub file_line_info: bool,

    /// Whether to include the event target.
    pub include_target: bool,

    /// Whether to colour output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            span_events: false,
            file_line_info: false,
            include_target: true,
            ansi: false,
        }
    }
}

impl LogConfig {
    /// Debug-level, human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            span_events: true,
            file_line_info: true,
            ansi: true,
            ..Self::default()
        }
    }

    /// Info-level JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

/// Builds an [`EnvFilter`] from a directive string.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the directive does not parse.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Installs the global logging subscriber.
///
/// Does nothing when `config.enabled` is false.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already
/// installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_file(config.file_line_info)
                .with_line_number(config.file_line_info)
                .with_target(config.include_target)
                .with_ansi(false)
                .with_filter(filter);
            tracing_subscriber::registry()
                .with(layer)
                .try_init()
                .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
        }
        LogFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_file(config.file_line_info)
                .with_line_number(config.file_line_info)
                .with_target(config.include_target)
                .with_ansi(config.ansi)
                .with_filter(filter);
            tracing_subscriber::registry()
                .with(layer)
                .try_init()
                .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");

        let dev = LogConfig::development();
        assert_eq!(dev.format, LogFormat::Pretty);
        assert_eq!(dev.level, "debug");
        assert!(dev.file_line_info);

        assert_eq!(LogConfig::production(), LogConfig::default());
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_json::from_str(r#""pretty""#).unwrap();
        assert_eq!(format, LogFormat::Pretty);
        assert_eq!(serde_json::to_string(&LogFormat::Json).unwrap(), r#""json""#);
    }

    #[test]
    fn test_env_filter() {
        assert!(create_env_filter("merino=debug,merino_bind=trace").is_ok());
        assert!(matches!(
            create_env_filter("merino=notalevel"),
            Err(TelemetryError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_disabled_logging_is_noop() {
        let config = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}

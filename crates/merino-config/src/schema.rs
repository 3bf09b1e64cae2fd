//! Configuration sections.

use std::collections::BTreeMap;

use merino_telemetry::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};

/// Default request body limit: 16 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Request handling settings.
///
/// ```
/// use merino_config::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert!(config.default_headers.is_empty());
/// assert!(!config.show_error_details);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Headers added to every response that does not already set them.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,

    /// Whether error responses include details.
    #[serde(default)]
    pub show_error_details: bool,
}

/// Parameter binding settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    /// Largest request body a binder will read, in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
        }
    }
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Colour output.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include source file and line.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Converts to the telemetry crate's logging setup.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            file_line_info: self.include_location,
            ansi: self.ansi_enabled,
            ..LogConfig::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_default() {
        assert_eq!(BindingConfig::default().max_body_size, 16 * 1024 * 1024);
    }

    #[test]
    fn test_logging_to_log_config() {
        let logging = LoggingConfig {
            level: "merino=debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            ..LoggingConfig::default()
        };
        let log = logging.to_log_config();
        assert_eq!(log.level, "merino=debug");
        assert_eq!(log.format, LogFormat::Pretty);
        assert!(log.file_line_info);
        assert!(log.enabled);
    }

    #[test]
    fn test_server_headers_deserialize() {
        let server: ServerConfig = toml::from_str(
            r#"
            show_error_details = true

            [default_headers]
            x-frame-options = "DENY"
            "#,
        )
        .unwrap();
        assert!(server.show_error_details);
        assert_eq!(server.default_headers["x-frame-options"], "DENY");
    }
}

//! The root [`MerinoConfig`] and its builder.

use http::header::{HeaderName, HeaderValue};
use merino_telemetry::LogFormat;
use serde::{Deserialize, Serialize};

use crate::{BindingConfig, ConfigError, LoggingConfig, ServerConfig};

/// Complete Merino application configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and environment
/// variables over the defaults.
///
/// # Example
///
/// ```
/// use merino_config::MerinoConfig;
///
/// let config = MerinoConfig::default();
/// assert_eq!(config.binding.max_body_size, 16 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct MerinoConfig {
    /// Request handling.
    #[serde(default)]
    pub server: ServerConfig,

    /// Parameter binding.
    #[serde(default)]
    pub binding: BindingConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MerinoConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> MerinoConfigBuilder {
        MerinoConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a default header is not a
    /// valid header, the body limit is zero, or the log filter does not
    /// parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in &self.server.default_headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::invalid(&format!("server.default_headers.{name}"), "invalid header name"));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::invalid(&format!("server.default_headers.{name}"), "invalid header value"));
            }
        }

        if self.binding.max_body_size == 0 {
            return Err(ConfigError::invalid("binding.max_body_size", "must be greater than zero"));
        }

        if let Err(err) = merino_telemetry::create_env_filter(&self.logging.level) {
            return Err(ConfigError::invalid("logging.level", err.to_string()));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs and detailed error responses.
    ///
    /// ```
    /// use merino_config::MerinoConfig;
    ///
    /// let config = MerinoConfig::development();
    /// assert!(config.server.show_error_details);
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.show_error_details = true;
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.ansi_enabled = true;
        config.logging.include_location = true;
        config
    }

    /// Production preset: JSON logs, terse errors and hardening headers.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.server.show_error_details = false;
        config
            .server
            .default_headers
            .insert("x-content-type-options".to_string(), "nosniff".to_string());
        config
            .server
            .default_headers
            .insert("x-frame-options".to_string(), "DENY".to_string());
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.ansi_enabled = false;
        config
    }
}

/// Builder for [`MerinoConfig`].
#[derive(Debug, Default)]
pub struct MerinoConfigBuilder {
    server: Option<ServerConfig>,
    binding: Option<BindingConfig>,
    logging: Option<LoggingConfig>,
}

impl MerinoConfigBuilder {
    /// Creates a builder with every section unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server section.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Sets the binding section.
    #[must_use]
    pub fn binding(mut self, binding: BindingConfig) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Sets the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds the configuration; unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> MerinoConfig {
        MerinoConfig {
            server: self.server.unwrap_or_default(),
            binding: self.binding.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        }
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn build_validated(self) -> Result<MerinoConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

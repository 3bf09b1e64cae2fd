//! Layered configuration loading.
//!
//! Layers apply in order, later ones overriding earlier ones:
//!
//! 1. Built-in defaults (or a preset)
//! 2. A TOML or JSON file
//! 3. Environment variables `PREFIX__SECTION__KEY`
//!
//! Sections and fields missing from a file keep their default values.

use std::fs;
use std::path::Path;

use merino_telemetry::LogFormat;

use crate::{ConfigError, MerinoConfig};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use merino_config::ConfigLoader;
///
/// # fn main() -> Result<(), merino_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("merino.toml")?
///     .with_env_prefix("MERINO")
///     .load()?;
/// # let _ = config;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: MerinoConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = MerinoConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = MerinoConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, malformed, or
    /// contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::missing(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = parse(&content, &format)?;
        Ok(self)
    }

    /// Loads a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration text in the given format (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse.
    ///
    /// ```
    /// use merino_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nshow_error_details = true\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert!(config.server.show_error_details);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Enables environment overrides with the given prefix.
    ///
    /// `MERINO__BINDING__MAX_BODY_SIZE=1024` sets `binding.max_body_size`.
    /// Header names under `SERVER__DEFAULT_HEADERS__` are lowercased with
    /// `_` read as `-`; an empty value removes the header. A variable under
    /// the prefix that names no setting fails [`ConfigLoader::load`].
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if an override does not parse or validation fails.
    pub fn load(mut self) -> Result<MerinoConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_vars(std::env::vars(), &prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> MerinoConfig {
        self.config
    }

    fn apply_env_vars<I>(&mut self, vars: I, prefix: &str) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(path) = key.strip_prefix(marker.as_str()) {
                self.apply_env_var(&key, path, &value)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, path: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = path.split("__").collect();
        let expect_bool = || ConfigError::env(key, "expected boolean");

        match parts.as_slice() {
            ["SERVER", "SHOW_ERROR_DETAILS"] => {
                self.config.server.show_error_details = parse_bool(value).ok_or_else(expect_bool)?;
            }
            ["SERVER", "DEFAULT_HEADERS", name] => {
                let name = name.to_lowercase().replace('_', "-");
                if value.is_empty() {
                    self.config.server.default_headers.remove(&name);
                } else {
                    self.config.server.default_headers.insert(name, value.to_string());
                }
            }
            ["BINDING", "MAX_BODY_SIZE"] => {
                self.config.binding.max_body_size = value
                    .parse()
                    .map_err(|_| ConfigError::env(key, "expected integer"))?;
            }
            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_bool(value).ok_or_else(expect_bool)?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(ConfigError::env(key, "expected 'json' or 'pretty'")),
                };
            }
            ["LOGGING", "ANSI_ENABLED"] => {
                self.config.logging.ansi_enabled = parse_bool(value).ok_or_else(expect_bool)?;
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                self.config.logging.include_location = parse_bool(value).ok_or_else(expect_bool)?;
            }
            _ => return Err(ConfigError::UnknownEnv { var: key.to_string() }),
        }
        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<MerinoConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::Format {
            format: other.to_string(),
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, MerinoConfig::default());
    }

    #[test]
    fn test_loader_presets() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_loader_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [binding]
            max_body_size = 2048

            [server.default_headers]
            x-frame-options = "DENY"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.binding.max_body_size, 2048);
        assert_eq!(config.server.default_headers["x-frame-options"], "DENY");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_loader_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"server": {{"show_error_details": true}}}}"#).unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert!(config.server.show_error_details);
    }

    #[test]
    fn test_loader_rejects_unknown_field_in_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nport = 8080").unwrap();

        let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_loader_missing_and_optional_files() {
        let err = ConfigLoader::new().with_file("/nonexistent/merino.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));

        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/merino.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, MerinoConfig::default());
    }

    #[test]
    fn test_unsupported_format() {
        let err = ConfigLoader::new().with_string("a: 1", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Format { .. }));
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut loader = ConfigLoader::new()
            .with_string("[binding]\nmax_body_size = 2048\n", "toml")
            .unwrap();
        loader
            .apply_env_vars(
                vars(&[
                    ("MERINO__BINDING__MAX_BODY_SIZE", "4096"),
                    ("MERINO__SERVER__SHOW_ERROR_DETAILS", "yes"),
                    ("MERINO__SERVER__DEFAULT_HEADERS__X_FRAME_OPTIONS", "SAMEORIGIN"),
                    ("MERINO__LOGGING__FORMAT", "pretty"),
                    ("OTHER__BINDING__MAX_BODY_SIZE", "1"),
                ]),
                "MERINO",
            )
            .unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.binding.max_body_size, 4096);
        assert!(config.server.show_error_details);
        assert_eq!(config.server.default_headers["x-frame-options"], "SAMEORIGIN");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_parse_errors() {
        let mut loader = ConfigLoader::new();
        let err = loader
            .apply_env_vars(vars(&[("MERINO__BINDING__MAX_BODY_SIZE", "lots")]), "MERINO")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));

        let err = loader
            .apply_env_vars(vars(&[("MERINO__LOGGING__ENABLED", "maybe")]), "MERINO")
            .unwrap_err();
        assert!(err.to_string().contains("expected boolean"));

        let err = loader
            .apply_env_vars(vars(&[("MERINO__SERVER__PORT", "8080")]), "MERINO")
            .unwrap_err();
        assert_eq!(err.key(), Some("MERINO__SERVER__PORT"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool(""), None);
    }
}

//! Errors raised while building a [`MerinoConfig`](crate::MerinoConfig).

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a configuration could not be loaded.
///
/// File contents that do not match the schema, unknown keys included, are
/// reported as [`ConfigError::Toml`] or [`ConfigError::Json`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file passed to [`ConfigLoader::with_file`](crate::ConfigLoader::with_file) does not exist.
    #[error("no configuration file at {}", path.display())]
    Missing {
        /// The path that was tried.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },

    /// TOML that does not match the schema.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON that does not match the schema.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A file extension or format name other than `toml` and `json`.
    #[error("unsupported configuration format '{format}' (expected toml or json)")]
    Format {
        /// What was given.
        format: String,
    },

    /// A value that parsed but is not usable.
    #[error("{field}: {reason}")]
    Invalid {
        /// Dotted path of the field, e.g. `binding.max_body_size`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An environment override with a malformed value.
    #[error("environment variable {var}: {reason}")]
    Env {
        /// The variable name.
        var: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An environment variable under the prefix that names no setting.
    #[error("environment variable {var} does not name a setting")]
    UnknownEnv {
        /// The variable name.
        var: String,
    },
}

impl ConfigError {
    pub(crate) fn missing(path: &Path) -> Self {
        Self::Missing { path: path.to_path_buf() }
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env(var: &str, reason: &str) -> Self {
        Self::Env {
            var: var.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The field or variable the error is about, when there is one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            Self::Env { var, .. } | Self::UnknownEnv { var } => Some(var),
            _ => None,
        }
    }
}

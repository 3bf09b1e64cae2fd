//! Typed configuration for Merino.
//!
//! - TOML and JSON files
//! - Environment overrides `MERINO__SECTION__KEY`
//! - Strict parsing: unknown fields are errors
//! - Layering: defaults → file → environment
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! show_error_details = false
//!
//! [server.default_headers]
//! x-content-type-options = "nosniff"
//!
//! [binding]
//! max_body_size = 16777216
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/merino-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{MerinoConfig, MerinoConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{BindingConfig, LoggingConfig, ServerConfig, DEFAULT_MAX_BODY_SIZE};

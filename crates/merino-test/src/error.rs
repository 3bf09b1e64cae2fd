//! Test error types.

use thiserror::Error;

/// Errors raised by the test client.
#[derive(Debug, Error)]
pub enum TestError {
    /// The application failed to start.
    #[error("application failed to start: {0}")]
    Startup(#[from] merino::StartupError),

    /// The request could not be built.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// The response body could not be read.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form encoding failed.
    #[error("form encoding error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
}

impl From<http::Error> for TestError {
    fn from(e: http::Error) -> Self {
        Self::RequestBuild(e.to_string())
    }
}

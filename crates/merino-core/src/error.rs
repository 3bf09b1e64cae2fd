//! Error types for Merino.
//!
//! [`MerinoError`] is the request-time error of the framework. Every failure
//! that happens while serving a request (a missing parameter, a body that does
//! not parse, a handler returning an error) ends up as a `MerinoError` and is
//! converted into a JSON error envelope.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`MerinoError`].
pub type MerinoResult<T> = Result<T, MerinoError>;

/// Request-time error.
///
/// # Example
///
/// ```
/// use merino_core::MerinoError;
/// use http::StatusCode;
///
/// let error = MerinoError::bad_request("Missing query parameter 'q'").with_parameter("q");
/// assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
/// assert_eq!(error.parameter(), Some("q"));
/// ```
#[derive(Error, Debug)]
pub enum MerinoError {
    /// The request is malformed or a required value is missing.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// The handler parameter that failed to bind, if any.
        parameter: Option<String>,
    },

    /// The request lacks a required identity.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message.
        message: String,
    },

    /// The identity is not allowed to perform the request.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// No route or resource matches.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The request body exceeds the configured limit.
    #[error("Payload too large: body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The request body has a content type the binder cannot read.
    #[error("Unsupported media type: {message}")]
    UnsupportedMediaType {
        /// Human-readable error message.
        message: String,
    },

    /// The application cannot serve requests yet.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Human-readable error message.
        message: String,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl MerinoError {
    /// Creates a bad-request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            parameter: None,
        }
    }

    /// Creates an unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a payload-too-large error.
    #[must_use]
    pub fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge { limit }
    }

    /// Creates an unsupported-media-type error.
    #[must_use]
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            message: message.into(),
        }
    }

    /// Creates a service-unavailable error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error wrapping an underlying cause.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Attaches the name of the parameter that failed to bind.
    #[must_use]
    pub fn with_parameter(self, name: impl Into<String>) -> Self {
        match self {
            Self::BadRequest { message, .. } => Self::BadRequest {
                message,
                parameter: Some(name.into()),
            },
            other => other,
        }
    }

    /// The parameter that failed to bind, if recorded.
    #[must_use]
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::BadRequest { parameter, .. } => parameter.as_deref(),
            _ => None,
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Builds the error envelope sent to clients.
    ///
    /// Internal error messages are replaced by a generic text unless
    /// `show_details` is set.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>, show_details: bool) -> ErrorEnvelope {
        let message = match self {
            Self::Internal { .. } if !show_details => "Internal server error".to_string(),
            Self::Internal {
                message,
                source: Some(source),
            } => format!("{message}: {source}"),
            other => other.to_string(),
        };
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
                parameter: self.parameter().map(ToString::to_string),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Error envelope for JSON responses.
///
/// ```json
/// {"error": {"code": "BAD_REQUEST", "message": "...", "parameter": "q"}, "request_id": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error details within an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// The parameter that failed to bind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(MerinoError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(MerinoError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(MerinoError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(MerinoError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            MerinoError::payload_too_large(10).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            MerinoError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_with_parameter_only_applies_to_bad_request() {
        let error = MerinoError::bad_request("missing").with_parameter("q");
        assert_eq!(error.parameter(), Some("q"));

        let error = MerinoError::not_found("gone").with_parameter("q");
        assert_eq!(error.parameter(), None);
    }

    #[test]
    fn test_envelope_hides_internal_details() {
        let error = MerinoError::internal_with_source("db failed", anyhow::anyhow!("timeout"));
        let hidden = error.to_envelope(Some("req-1"), false);
        assert_eq!(hidden.error.message, "Internal server error");
        assert_eq!(hidden.request_id.as_deref(), Some("req-1"));

        let shown = error.to_envelope(None, true);
        assert_eq!(shown.error.message, "db failed: timeout");
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = MerinoError::bad_request("bad q")
            .with_parameter("q")
            .to_envelope(None, false);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert_eq!(json["error"]["parameter"], "q");
        assert!(json.get("request_id").is_none());
    }
}

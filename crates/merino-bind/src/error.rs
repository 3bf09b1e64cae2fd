//! Binding errors.
//!
//! Two families of errors live here:
//!
//! - [`NormalizationError`] is raised at startup, while inspecting handler
//!   signatures and choosing binders. It aborts application start.
//! - [`BindError`] is raised while serving a request, when a binder cannot
//!   produce a value. It converts into a client-facing [`MerinoError`].

use std::fmt;

use http::StatusCode;
use merino_core::MerinoError;
use thiserror::Error;

/// Where a binder was reading from when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSource {
    /// Route values.
    Route,
    /// Query string.
    Query,
    /// Request headers.
    Header,
    /// Request cookies.
    Cookie,
    /// Request body.
    Body,
    /// Service container.
    Services,
    /// Caller identity.
    Identity,
    /// Application-defined source.
    Custom,
}

impl fmt::Display for BindSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route => write!(f, "route"),
            Self::Query => write!(f, "query"),
            Self::Header => write!(f, "header"),
            Self::Cookie => write!(f, "cookie"),
            Self::Body => write!(f, "body"),
            Self::Services => write!(f, "services"),
            Self::Identity => write!(f, "identity"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindErrorKind {
    Missing,
    InvalidValue,
    DeserializationFailed,
    PayloadTooLarge(usize),
    UnsupportedMediaType,
    Unauthenticated,
    ServiceUnavailable,
}

/// A request-time binding failure.
///
/// # Example
///
/// ```rust
/// use merino_bind::{BindError, BindSource};
/// use http::StatusCode;
///
/// let err = BindError::missing(BindSource::Query, "q");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// assert_eq!(err.field(), Some("q"));
/// ```
#[derive(Debug, Clone)]
pub struct BindError {
    bind_source: BindSource,
    kind: BindErrorKind,
    field: Option<String>,
    message: String,
}

impl BindError {
    /// A required value is absent.
    #[must_use]
    pub fn missing(source: BindSource, field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            bind_source: source,
            kind: BindErrorKind::Missing,
            message: format!("missing required {source} parameter: {field}"),
            field: Some(field),
        }
    }

    /// A value could not be converted to the declared type.
    #[must_use]
    pub fn invalid_value(source: BindSource, field: impl Into<String>, details: impl Into<String>) -> Self {
        let field = field.into();
        let details = details.into();
        Self {
            bind_source: source,
            kind: BindErrorKind::InvalidValue,
            message: format!("invalid {source} parameter '{field}': {details}"),
            field: Some(field),
        }
    }

    /// The body could not be parsed.
    #[must_use]
    pub fn deserialization_failed(field: impl Into<String>, error: impl Into<String>) -> Self {
        let field = field.into();
        let error = error.into();
        Self {
            bind_source: BindSource::Body,
            kind: BindErrorKind::DeserializationFailed,
            message: format!("failed to parse request body for '{field}': {error}"),
            field: Some(field),
        }
    }

    /// The body is larger than allowed.
    #[must_use]
    pub fn payload_too_large(max_size: usize, actual_size: usize) -> Self {
        Self {
            bind_source: BindSource::Body,
            kind: BindErrorKind::PayloadTooLarge(max_size),
            message: format!("payload too large: max {max_size} bytes, got {actual_size} bytes"),
            field: None,
        }
    }

    /// The body has a content type the binder cannot read.
    #[must_use]
    pub fn unsupported_media_type(expected: &str, actual: Option<&str>) -> Self {
        let actual = actual.unwrap_or("none");
        Self {
            bind_source: BindSource::Body,
            kind: BindErrorKind::UnsupportedMediaType,
            message: format!("unsupported content type: expected '{expected}', got '{actual}'"),
            field: None,
        }
    }

    /// A required identity is absent or anonymous.
    #[must_use]
    pub fn unauthenticated(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            bind_source: BindSource::Identity,
            kind: BindErrorKind::Unauthenticated,
            message: format!("authentication required for parameter '{field}'"),
            field: Some(field),
        }
    }

    /// A service is not registered in the container.
    #[must_use]
    pub fn service_unavailable(field: impl Into<String>, service: &str) -> Self {
        let field = field.into();
        Self {
            bind_source: BindSource::Services,
            kind: BindErrorKind::ServiceUnavailable,
            message: format!("service '{service}' for parameter '{field}' is not registered"),
            field: Some(field),
        }
    }

    /// A failure reported by an application-defined source.
    #[must_use]
    pub fn custom(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            bind_source: BindSource::Custom,
            kind: BindErrorKind::InvalidValue,
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Where the binder was reading from.
    #[must_use]
    pub fn source(&self) -> BindSource {
        self.bind_source
    }

    /// The parameter being bound.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            BindErrorKind::Missing
            | BindErrorKind::InvalidValue
            | BindErrorKind::DeserializationFailed => StatusCode::BAD_REQUEST,
            BindErrorKind::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            BindErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BindErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            BindErrorKind::ServiceUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            BindErrorKind::Missing => "MISSING_PARAMETER",
            BindErrorKind::InvalidValue => "INVALID_PARAMETER",
            BindErrorKind::DeserializationFailed => "DESERIALIZATION_FAILED",
            BindErrorKind::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            BindErrorKind::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            BindErrorKind::Unauthenticated => "UNAUTHENTICATED",
            BindErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BindError {}

impl From<BindError> for MerinoError {
    fn from(err: BindError) -> Self {
        let field = err.field.clone();
        let converted = match err.kind {
            BindErrorKind::Missing
            | BindErrorKind::InvalidValue
            | BindErrorKind::DeserializationFailed => MerinoError::bad_request(err.message),
            BindErrorKind::PayloadTooLarge(limit) => MerinoError::payload_too_large(limit),
            BindErrorKind::UnsupportedMediaType => MerinoError::unsupported_media_type(err.message),
            BindErrorKind::Unauthenticated => MerinoError::unauthorized(err.message),
            BindErrorKind::ServiceUnavailable => MerinoError::internal(err.message),
        };
        match field {
            Some(field) => converted.with_parameter(field),
            None => converted,
        }
    }
}

/// A value could not be converted into the declared Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ConversionError {
    /// The expected type.
    pub expected: String,
    /// What was found instead.
    pub found: String,
}

impl ConversionError {
    /// Creates a conversion error.
    #[must_use]
    pub fn new(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// A handler or middleware cannot be normalized.
///
/// Raised at application start; every variant names the offending callable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// The signature uses variadic or keyword-only parameters.
    #[error("unsupported signature for '{callable}': parameter '{parameter}' is {kind}")]
    UnsupportedSignature {
        /// The callable name.
        callable: String,
        /// The offending parameter.
        parameter: String,
        /// The offending parameter kind.
        kind: String,
    },

    /// The same parameter name appears twice.
    #[error("parameter '{parameter}' is declared more than once in '{callable}'")]
    DuplicateParameter {
        /// The callable name.
        callable: String,
        /// The repeated name.
        parameter: String,
    },

    /// The callable is not asynchronous.
    #[error("'{callable}' must be an async callable")]
    NotAsync {
        /// The callable name.
        callable: String,
    },

    /// A union that is not `Optional[T]`.
    #[error("unsupported union type '{annotation}' for parameter '{parameter}' in '{callable}'")]
    UnsupportedUnion {
        /// The callable name.
        callable: String,
        /// The offending parameter.
        parameter: String,
        /// The declared union.
        annotation: String,
    },

    /// More than one parameter binds the request body.
    #[error(
        "ambiguous signature for '{callable}': parameters '{first}' and '{second}' both read the request body"
    )]
    AmbiguousSignature {
        /// The callable name.
        callable: String,
        /// The first body parameter.
        first: String,
        /// The second body parameter.
        second: String,
    },

    /// A route-sourced parameter names no route segment.
    #[error("parameter '{parameter}' of '{callable}' is bound to the route, but route '{route}' has no such segment")]
    RouteBinderMismatch {
        /// The callable name.
        callable: String,
        /// The offending parameter.
        parameter: String,
        /// The route pattern.
        route: String,
    },

    /// No binder applies to a parameter.
    #[error("no matching binder for parameter '{parameter}' ({annotation}) of '{callable}'")]
    NoMatchingBinder {
        /// The callable name.
        callable: String,
        /// The offending parameter.
        parameter: String,
        /// The declared type.
        annotation: String,
    },

    /// An annotation names a type that is not known.
    #[error("cannot resolve annotation '{annotation}' of parameter '{parameter}' in '{callable}': {reason}")]
    UnresolvedAnnotation {
        /// The callable name.
        callable: String,
        /// The offending parameter.
        parameter: String,
        /// The annotation text.
        annotation: String,
        /// Why resolution failed.
        reason: String,
    },

    /// Parameter names given at registration do not fit the callable.
    #[error("'{callable}' takes {expected} parameters but {declared} names were given")]
    ParameterNames {
        /// The callable name.
        callable: String,
        /// Parameters of the callable.
        expected: usize,
        /// Names supplied.
        declared: usize,
    },

    /// A registration option names something the callable does not have.
    #[error("invalid registration of '{callable}' for parameter '{parameter}': {reason}")]
    InvalidRegistration {
        /// The callable name.
        callable: String,
        /// The parameter named by the option.
        parameter: String,
        /// What is wrong.
        reason: String,
    },

    /// A binder factory refused to build a binder.
    #[error("binder for parameter '{parameter}' of '{callable}' could not be built: {reason}")]
    BinderFactory {
        /// The callable name.
        callable: String,
        /// The offending parameter.
        parameter: String,
        /// The factory's reason.
        reason: String,
    },

    /// A streaming callable does not declare what it yields.
    #[error("streaming handler '{callable}' does not declare the type of its items")]
    StreamItemUndeclared {
        /// The callable name.
        callable: String,
    },

    /// No response encoder is registered for a streaming callable's items.
    #[error("no response type is registered for items of type '{item}' streamed by '{callable}'")]
    StreamItemUnregistered {
        /// The callable name.
        callable: String,
        /// The item type.
        item: String,
    },
}

impl NormalizationError {
    /// The callable the error refers to.
    #[must_use]
    pub fn callable(&self) -> &str {
        match self {
            Self::UnsupportedSignature { callable, .. }
            | Self::DuplicateParameter { callable, .. }
            | Self::NotAsync { callable }
            | Self::UnsupportedUnion { callable, .. }
            | Self::AmbiguousSignature { callable, .. }
            | Self::RouteBinderMismatch { callable, .. }
            | Self::NoMatchingBinder { callable, .. }
            | Self::UnresolvedAnnotation { callable, .. }
            | Self::ParameterNames { callable, .. }
            | Self::InvalidRegistration { callable, .. }
            | Self::BinderFactory { callable, .. }
            | Self::StreamItemUndeclared { callable }
            | Self::StreamItemUnregistered { callable, .. } => callable,
        }
    }
}

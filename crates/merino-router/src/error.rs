//! Route registration errors.

use http::Method;
use thiserror::Error;

/// Errors raised while registering routes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// A catch-all segment appears before the end of the pattern.
    #[error("catch-all must be the last segment in '{pattern}'")]
    WildcardNotLast {
        /// The offending pattern.
        pattern: String,
    },

    /// A parameter segment has no name.
    #[error("empty parameter name in '{pattern}'")]
    EmptyParameter {
        /// The offending pattern.
        pattern: String,
    },

    /// The same parameter name is used twice.
    #[error("parameter '{name}' appears more than once in '{pattern}'")]
    DuplicateParameter {
        /// The offending pattern.
        pattern: String,
        /// The repeated name.
        name: String,
    },

    /// The method and path are already registered.
    #[error("route {method} {pattern} is already registered")]
    Duplicate {
        /// HTTP method of the route.
        method: Method,
        /// The pattern text.
        pattern: String,
    },
}

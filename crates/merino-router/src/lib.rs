//! Radix tree router for Merino.
//!
//! This crate matches request paths against registered route patterns and
//! exposes, for every pattern, the ordered list of its parameter names. The
//! binding engine uses that list to decide which handler parameters come from
//! the route.
//!
//! # Features
//!
//! - **Radix Tree Matching**: lookup proportional to the path length
//! - **Path Parameters**: `/users/{id}` and `/users/:id`
//! - **Catch-alls**: `/files/*path`
//! - **Any Method**: standard and extension methods
//!
//! # Example
//!
//! ```rust
//! use merino_router::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert(Method::GET, "/users", "list_users").unwrap();
//! router.insert(Method::GET, "/users/{id}", "get_user").unwrap();
//! router.insert(Method::GET, "/files/*path", "serve_file").unwrap();
//!
//! let found = router.at(&Method::GET, "/users/123").unwrap();
//! assert_eq!(*found.value, "get_user");
//! assert_eq!(found.params.get("id"), Some("123"));
//! ```

#![doc(html_root_url = "https://docs.rs/merino-router/0.1.0")]

mod error;
mod method_router;
mod node;
mod params;
mod pattern;
mod router;

pub use error::RouteError;
pub use method_router::{MethodRouter, Route};
pub use params::Params;
pub use pattern::{RoutePattern, Segment};
pub use router::Router;

/// A matched route.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a, T> {
    /// The routed value.
    pub value: &'a T,
    /// The pattern of the matched route.
    pub pattern: &'a RoutePattern,
    /// Route values named after the pattern's parameters.
    pub params: Params,
}

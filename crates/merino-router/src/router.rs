//! High-level router API.

use http::Method;

use crate::error::RouteError;
use crate::method_router::MethodRouter;
use crate::node::Node;
use crate::params::Params;
use crate::pattern::RoutePattern;
use crate::RouteMatch;

/// A radix tree router mapping `(method, pattern)` pairs to values.
///
/// # Route Priority
///
/// When several routes could match a path:
///
/// 1. **Static segments** (e.g., `/users/me`)
/// 2. **Parameter segments** (e.g., `/users/{id}`)
/// 3. **Catch-all segments** (e.g., `/files/*path`)
///
/// # Example
///
/// ```rust
/// use merino_router::Router;
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert(Method::GET, "/items/{item_id}", 1).unwrap();
///
/// let found = router.at(&Method::GET, "/items/42").unwrap();
/// assert_eq!(*found.value, 1);
/// assert_eq!(found.params.get("item_id"), Some("42"));
/// assert_eq!(found.pattern.as_str(), "/items/{item_id}");
/// ```
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `value` for `method` on `path`.
    ///
    /// Returns the parsed pattern so callers can inspect its parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the pattern is malformed or the route is
    /// already registered.
    pub fn insert(&mut self, method: Method, path: &str, value: T) -> Result<RoutePattern, RouteError> {
        let pattern = RoutePattern::parse(path)?;
        self.root
            .insert(method.clone(), pattern.clone(), value)
            .map_err(|rejected| RouteError::Duplicate {
                method,
                pattern: rejected.pattern().as_str().to_string(),
            })?;
        self.route_count += 1;
        Ok(pattern)
    }

    /// Matches a method and path.
    ///
    /// Route values are named after the matched route's own pattern.
    #[must_use]
    pub fn at(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        let (methods, mut params) = self.root.match_path(path)?;
        let route = methods.get(method)?;
        params.rename(route.pattern().param_names());
        Some(RouteMatch {
            value: route.value(),
            pattern: route.pattern(),
            params,
        })
    }

    /// Matches a path regardless of method.
    ///
    /// Useful for answering `405 Method Not Allowed`.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        self.root.match_path(path)
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

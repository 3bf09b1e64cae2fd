//! Per-path method dispatch.

use http::Method;
use smallvec::SmallVec;

use crate::pattern::RoutePattern;

/// A registered route: its parsed pattern and the value it maps to.
#[derive(Debug, Clone)]
pub struct Route<T> {
    pattern: RoutePattern,
    value: T,
}

impl<T> Route<T> {
    /// Creates a route.
    #[must_use]
    pub fn new(pattern: RoutePattern, value: T) -> Self {
        Self { pattern, value }
    }

    /// The route pattern.
    #[must_use]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// The routed value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Maps HTTP methods to routes for a single path.
///
/// Any method is accepted, including extension methods, so custom verbs
/// such as the WebSocket upgrade marker route like the standard ones.
///
/// # Example
///
/// ```rust
/// use merino_router::{MethodRouter, RoutePattern};
/// use http::Method;
///
/// let pattern = RoutePattern::parse("/users").unwrap();
/// let mut methods = MethodRouter::new();
/// methods.insert(Method::GET, pattern.clone(), "list").unwrap();
/// methods.insert(Method::POST, pattern, "create").unwrap();
///
/// assert_eq!(methods.get(&Method::GET).map(|r| *r.value()), Some("list"));
/// assert!(methods.get(&Method::DELETE).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<T> {
    entries: SmallVec<[(Method, Route<T>); 2]>,
}

impl<T> Default for MethodRouter<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<T> MethodRouter<T> {
    /// Creates an empty method router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route for `method`.
    ///
    /// # Errors
    ///
    /// Returns the rejected route when the method is already taken.
    pub fn insert(&mut self, method: Method, pattern: RoutePattern, value: T) -> Result<(), Route<T>> {
        let route = Route::new(pattern, value);
        if self.entries.iter().any(|(m, _)| *m == method) {
            return Err(route);
        }
        self.entries.push((method, route));
        Ok(())
    }

    /// Returns the route for `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&Route<T>> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, route)| route)
    }

    /// Methods with a registered route, in registration order.
    pub fn allowed_methods(&self) -> impl Iterator<Item = &Method> {
        self.entries.iter().map(|(m, _)| m)
    }

    /// Returns true if no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> RoutePattern {
        RoutePattern::parse("/users").unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let mut methods = MethodRouter::new();
        methods.insert(Method::GET, pattern(), 1).unwrap();
        methods.insert(Method::PUT, pattern(), 2).unwrap();

        assert_eq!(methods.get(&Method::GET).map(|r| *r.value()), Some(1));
        assert_eq!(methods.get(&Method::PUT).map(|r| *r.value()), Some(2));
        assert!(methods.get(&Method::PATCH).is_none());
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut methods = MethodRouter::new();
        methods.insert(Method::GET, pattern(), 1).unwrap();
        let rejected = methods.insert(Method::GET, pattern(), 2).unwrap_err();
        assert_eq!(*rejected.value(), 2);
    }

    #[test]
    fn test_extension_method() {
        let ws = Method::from_bytes(b"GET_WS").unwrap();
        let mut methods = MethodRouter::new();
        methods.insert(ws.clone(), pattern(), "socket").unwrap();
        assert!(methods.get(&ws).is_some());
        assert!(methods.get(&Method::GET).is_none());
    }

    #[test]
    fn test_allowed_methods_order() {
        let mut methods = MethodRouter::new();
        methods.insert(Method::POST, pattern(), ()).unwrap();
        methods.insert(Method::GET, pattern(), ()).unwrap();
        let allowed: Vec<_> = methods.allowed_methods().cloned().collect();
        assert_eq!(allowed, vec![Method::POST, Method::GET]);
    }
}

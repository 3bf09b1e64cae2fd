//! Route values extracted from a matched path.
//!
//! Values are kept in a small vector; most routes carry one to four
//! parameters and never touch the heap for the container itself.

use smallvec::SmallVec;

const INLINE_PARAMS: usize = 4;

/// Route values captured while matching a request path.
///
/// Stored as ordered `(name, value)` pairs, in the order the segments appear
/// in the route pattern.
///
/// # Example
///
/// ```rust
/// use merino_router::Params;
///
/// let mut params = Params::new();
/// params.push("item_id", "42");
///
/// assert_eq!(params.get("item_id"), Some("42"));
/// assert_eq!(params.get("q"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty set of route values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route value.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value captured for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true when a value was captured for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(n, _)| n == name)
    }

    /// Returns true if no values were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of captured values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over `(name, value)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Drops every value after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.inner.truncate(len);
    }

    /// Replaces positional names with the names declared by a pattern.
    pub(crate) fn rename(&mut self, names: &[String]) {
        for ((name, _), declared) in self.inner.iter_mut().zip(names) {
            if name != declared {
                name.clone_from(declared);
            }
        }
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_push_and_get() {
        let mut params = Params::new();
        params.push("id", "123");
        params.push("name", "alice");

        assert_eq!(params.get("id"), Some("123"));
        assert_eq!(params.get("name"), Some("alice"));
        assert_eq!(params.get("unknown"), None);
        assert!(params.contains("id"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_params_truncate() {
        let mut params = Params::new();
        params.push("a", "1");
        params.push("b", "2");
        params.truncate(1);

        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("a", "1")]);
    }

    #[test]
    fn test_params_rename() {
        let mut params = Params::new();
        params.push("id", "7");
        params.rename(&["user_id".to_string()]);

        assert_eq!(params.get("user_id"), Some("7"));
        assert_eq!(params.get("id"), None);
    }

    #[test]
    fn test_params_from_iter() {
        let params: Params = vec![("x".to_string(), "1".to_string())]
            .into_iter()
            .collect();
        assert_eq!(params.get("x"), Some("1"));
    }
}

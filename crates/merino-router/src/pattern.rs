//! Route pattern parsing.
//!
//! A pattern is a `/`-separated list of segments. A segment is either
//! static text, a named parameter (`{id}` or `:id`), or a trailing catch-all
//! (`*path`).

use std::fmt;

use crate::error::RouteError;

/// A single parsed pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text that must match exactly.
    Static(String),
    /// A named parameter capturing one path segment.
    Param(String),
    /// A catch-all capturing the remainder of the path.
    Wildcard(String),
}

/// A parsed route pattern.
///
/// The pattern owns the ordered list of its parameter names, which is what
/// the binding engine consults when deciding whether a handler parameter is
/// sourced from the route.
///
/// # Example
///
/// ```rust
/// use merino_router::RoutePattern;
///
/// let pattern = RoutePattern::parse("/orgs/{org}/items/:item_id").unwrap();
/// assert_eq!(pattern.param_names(), ["org", "item_id"]);
/// assert!(pattern.has_param("item_id"));
/// assert!(!pattern.has_param("q"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl RoutePattern {
    /// Parses a route pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if a parameter name is empty or repeated, or if
    /// a catch-all is not the last segment.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut param_names: Vec<String> = Vec::new();

        for (index, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('*') {
                if index + 1 != parts.len() {
                    return Err(RouteError::WildcardNotLast {
                        pattern: raw.to_string(),
                    });
                }
                Segment::Wildcard(name.to_string())
            } else {
                Segment::Static((*part).to_string())
            };

            if let Segment::Param(name) | Segment::Wildcard(name) = &segment {
                if name.is_empty() {
                    return Err(RouteError::EmptyParameter {
                        pattern: raw.to_string(),
                    });
                }
                if param_names.contains(name) {
                    return Err(RouteError::DuplicateParameter {
                        pattern: raw.to_string(),
                        name: name.clone(),
                    });
                }
                param_names.push(name.clone());
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            param_names,
        })
    }

    /// The pattern text as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the route parameters, in pattern order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Returns true when `name` is one of the pattern's parameters.
    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.param_names.iter().any(|p| p == name)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static() {
        let pattern = RoutePattern::parse("/users/list").unwrap();
        assert_eq!(
            pattern.segments(),
            [
                Segment::Static("users".to_string()),
                Segment::Static("list".to_string())
            ]
        );
        assert!(pattern.param_names().is_empty());
    }

    #[test]
    fn test_parse_both_param_syntaxes() {
        let pattern = RoutePattern::parse("/a/{x}/b/:y").unwrap();
        assert_eq!(pattern.param_names(), ["x", "y"]);
    }

    #[test]
    fn test_parse_wildcard() {
        let pattern = RoutePattern::parse("/files/*path").unwrap();
        assert_eq!(pattern.segments()[1], Segment::Wildcard("path".to_string()));
        assert!(pattern.has_param("path"));
    }

    #[test]
    fn test_wildcard_must_be_last() {
        let err = RoutePattern::parse("/files/*path/more").unwrap_err();
        assert!(matches!(err, RouteError::WildcardNotLast { .. }));
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let err = RoutePattern::parse("/{id}/x/{id}").unwrap_err();
        assert!(matches!(err, RouteError::DuplicateParameter { name, .. } if name == "id"));
    }

    #[test]
    fn test_empty_parameter_rejected() {
        assert!(RoutePattern::parse("/{}").is_err());
    }

    #[test]
    fn test_display_keeps_raw_text() {
        let pattern = RoutePattern::parse("/items/{item_id}").unwrap();
        assert_eq!(pattern.to_string(), "/items/{item_id}");
    }
}

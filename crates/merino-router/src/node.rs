//! Radix tree node.
//!
//! Static children are kept sorted for binary search. Each node has at most
//! one parameter child and one catch-all child; parameter names are not part
//! of the tree shape, so `/users/{id}` and `/users/{user_id}/posts` share a
//! node and names are restored from the matched route's pattern.

use http::Method;

use crate::method_router::{MethodRouter, Route};
use crate::params::Params;
use crate::pattern::{RoutePattern, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Static,
    Param,
    Wildcard,
}

/// A node in the radix tree.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    segment: String,
    kind: NodeKind,
    methods: MethodRouter<T>,
    static_children: Vec<Node<T>>,
    param_child: Option<Box<Node<T>>>,
    wildcard_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn new(segment: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            segment: segment.into(),
            kind,
            methods: MethodRouter::new(),
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    pub(crate) fn root() -> Self {
        Self::new("", NodeKind::Static)
    }

    /// Inserts a route, returning it back if the method is already taken.
    pub(crate) fn insert(&mut self, method: Method, pattern: RoutePattern, value: T) -> Result<(), Route<T>> {
        let segments = pattern.segments().to_vec();
        self.insert_segments(&segments, method, pattern, value)
    }

    fn insert_segments(
        &mut self,
        segments: &[Segment],
        method: Method,
        pattern: RoutePattern,
        value: T,
    ) -> Result<(), Route<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.methods.insert(method, pattern, value);
        };

        let child = match segment {
            Segment::Static(text) => {
                let index = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(text))
                {
                    Ok(index) => index,
                    Err(index) => {
                        self.static_children
                            .insert(index, Node::new(text.clone(), NodeKind::Static));
                        index
                    }
                };
                &mut self.static_children[index]
            }
            Segment::Param(name) => self
                .param_child
                .get_or_insert_with(|| Box::new(Node::new(name.clone(), NodeKind::Param))),
            Segment::Wildcard(name) => self
                .wildcard_child
                .get_or_insert_with(|| Box::new(Node::new(name.clone(), NodeKind::Wildcard))),
        };
        child.insert_segments(remaining, method, pattern, value)
    }

    /// Matches a request path, returning the method table and raw values.
    pub(crate) fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params)?;
        Some((methods, params))
    }

    fn match_segments<'a>(&'a self, segments: &[&str], params: &mut Params) -> Option<&'a MethodRouter<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return (!self.methods.is_empty()).then_some(&self.methods);
        };

        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.match_segments(remaining, params) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            debug_assert_eq!(child.kind, NodeKind::Param);
            let mark = params.len();
            params.push(child.segment.clone(), *segment);
            if let Some(found) = child.match_segments(remaining, params) {
                return Some(found);
            }
            params.truncate(mark);
        }

        if let Some(child) = &self.wildcard_child {
            if !child.methods.is_empty() {
                params.push(child.segment.clone(), segments.join("/"));
                return Some(&child.methods);
            }
        }

        None
    }

    fn find_static_child(&self, segment: &str) -> Option<&Node<T>> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}

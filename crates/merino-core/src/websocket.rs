//! WebSocket handle passed to WebSocket route handlers.
//!
//! The transport itself lives outside the framework core; this type carries
//! the upgrade request so handlers can read route values, headers and the
//! caller identity.

use http::HeaderMap;
use merino_router::Params;

use crate::request::Request;

/// A WebSocket connection request.
#[derive(Debug, Clone)]
pub struct WebSocket {
    request: Request,
}

impl WebSocket {
    /// Wraps an upgrade request.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    /// The upgrade request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable access to the upgrade request.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Upgrade request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Route values captured by the router.
    #[must_use]
    pub fn route_values(&self) -> &Params {
        self.request.route_values()
    }

    /// Unwraps the upgrade request.
    #[must_use]
    pub fn into_request(self) -> Request {
        self.request
    }
}

impl From<Request> for WebSocket {
    fn from(request: Request) -> Self {
        Self::new(request)
    }
}

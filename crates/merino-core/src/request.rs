//! Incoming request type.
//!
//! A [`Request`] is a buffered HTTP request plus the state the framework
//! attaches while serving it: route values, the caller identity and the
//! connection addresses. It is cheap to clone (the body is reference-counted)
//! so binders and middleware can hold their own copy.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{header, HeaderMap, Method, Uri};
use merino_router::Params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Identity;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log correlation simple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of the remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Peer host.
    pub host: String,
    /// Peer port.
    pub port: u16,
}

/// Address the server accepted the connection on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Local host.
    pub host: String,
    /// Local port.
    pub port: u16,
}

impl From<SocketAddr> for ClientInfo {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl From<SocketAddr> for ServerInfo {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

/// A buffered HTTP request.
///
/// # Example
///
/// ```rust
/// use merino_core::Request;
/// use http::Method;
///
/// let request = Request::builder()
///     .method(Method::POST)
///     .uri("/items?q=hello")
///     .header("content-type", "application/json")
///     .body(r#"{"name":"x"}"#)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.path(), "/items");
/// assert_eq!(request.query(), Some("q=hello"));
/// assert!(request.declares_json());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    route_values: Params,
    identity: Option<Identity>,
    client_addr: Option<SocketAddr>,
    server_addr: Option<SocketAddr>,
}

impl Request {
    /// Creates a request without headers or body.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            id: RequestId::new(),
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            route_values: Params::new(),
            identity: None,
            client_addr: None,
            server_addr: None,
        }
    }

    /// Starts building a request.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// The request identifier.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of a header, if it is valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns true when the content type is JSON (`application/json` or `*+json`).
    #[must_use]
    pub fn declares_json(&self) -> bool {
        self.content_type().is_some_and(|ct| {
            let essence = ct.split(';').next().unwrap_or("").trim();
            essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
        })
    }

    /// Returns true when the content type essence equals `expected`.
    #[must_use]
    pub fn declares_content_type(&self, expected: &str) -> bool {
        self.content_type().is_some_and(|ct| {
            ct.split(';')
                .next()
                .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(expected))
        })
    }

    /// The buffered body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Route values captured by the router.
    #[must_use]
    pub fn route_values(&self) -> &Params {
        &self.route_values
    }

    /// Replaces the route values.
    pub fn set_route_values(&mut self, params: Params) {
        self.route_values = params;
    }

    /// The caller identity, if authentication ran.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Sets the caller identity.
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    /// Remote peer address.
    #[must_use]
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// Sets the remote peer address.
    pub fn set_client_addr(&mut self, addr: Option<SocketAddr>) {
        self.client_addr = addr;
    }

    /// Local server address.
    #[must_use]
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    /// Sets the local server address.
    pub fn set_server_addr(&mut self, addr: Option<SocketAddr>) {
        self.server_addr = addr;
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let mut converted = Self::new(parts.method, parts.uri);
        converted.headers = parts.headers;
        converted.body = body;
        converted
    }
}

/// Builder for [`Request`].
///
/// Invalid URIs or header values are reported by [`RequestBuilder::build`].
#[derive(Debug)]
pub struct RequestBuilder {
    inner: http::request::Builder,
    body: Bytes,
    identity: Option<Identity>,
    client_addr: Option<SocketAddr>,
    server_addr: Option<SocketAddr>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            inner: http::Request::builder(),
            body: Bytes::new(),
            identity: None,
            client_addr: None,
            server_addr: None,
        }
    }
}

impl RequestBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.inner = self.inner.method(method);
        self
    }

    /// Sets the URI.
    #[must_use]
    pub fn uri(mut self, uri: &str) -> Self {
        self.inner = self.inner.uri(uri);
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the caller identity.
    #[must_use]
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the remote peer address.
    #[must_use]
    pub fn client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    /// Sets the local server address.
    #[must_use]
    pub fn server_addr(mut self, addr: SocketAddr) -> Self {
        self.server_addr = Some(addr);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`http::Error`] for an invalid URI, method or header.
    pub fn build(self) -> Result<Request, http::Error> {
        let mut request = Request::from(self.inner.body(self.body)?);
        request.identity = self.identity;
        request.client_addr = self.client_addr;
        request.server_addr = self.server_addr;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let request = Request::builder().uri("/").build().unwrap();
        assert_eq!(request.method(), Method::GET);
        assert!(request.body().is_empty());
        assert!(request.identity().is_none());
        assert!(request.route_values().is_empty());
    }

    #[test]
    fn test_builder_rejects_invalid_header() {
        let result = Request::builder().uri("/").header("bad header", "x").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_declares_json_variants() {
        let json = Request::builder()
            .uri("/")
            .header("content-type", "application/json; charset=utf-8")
            .build()
            .unwrap();
        assert!(json.declares_json());

        let problem = Request::builder()
            .uri("/")
            .header("content-type", "application/problem+json")
            .build()
            .unwrap();
        assert!(problem.declares_json());

        let text = Request::builder()
            .uri("/")
            .header("content-type", "text/plain")
            .build()
            .unwrap();
        assert!(!text.declares_json());
        assert!(text.declares_content_type("TEXT/PLAIN"));
    }

    #[test]
    fn test_route_values_and_identity() {
        let mut request = Request::builder().uri("/items/42").build().unwrap();
        let mut params = Params::new();
        params.push("item_id", "42");
        request.set_route_values(params);
        request.set_identity(Some(Identity::anonymous()));

        assert_eq!(request.route_values().get("item_id"), Some("42"));
        assert!(request.identity().is_some());
    }

    #[test]
    fn test_client_info_from_addr() {
        let addr: SocketAddr = "127.0.0.1:5050".parse().unwrap();
        let info = ClientInfo::from(addr);
        assert_eq!(info.host, "127.0.0.1");
        assert_eq!(info.port, 5050);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = Request::builder().uri("/").build().unwrap();
        let b = a.clone();
        let c = Request::builder().uri("/").build().unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }
}

//! In-memory test client.

use std::sync::Arc;

use http::Method;
use merino::Application;
use merino_core::{Identity, WebSocket};
use serde::Serialize;

use crate::error::TestError;
use crate::request::TestRequestBuilder;
use crate::response::TestResponse;

/// Sends requests straight into an [`Application`], without a network.
///
/// Requests go through routing, the full middleware chain and parameter
/// binding exactly as in production.
///
/// # Example
///
/// ```
/// use merino::{endpoint, Application};
/// use merino_test::TestClient;
///
/// async fn ping() -> &'static str {
///     "pong"
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), merino_test::TestError> {
/// let mut app = Application::new();
/// app.get("/ping", endpoint(ping)).unwrap();
///
/// let client = TestClient::new(app)?;
/// let response = client.get("/ping").send().await?;
/// assert_eq!(response.text()?, "pong");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<Application>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Starts the application and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Startup`] if the application fails to start.
    pub fn new(mut app: Application) -> Result<Self, TestError> {
        app.start()?;
        Ok(Self::from_app(Arc::new(app)))
    }

    /// Wraps an application that is already started.
    #[must_use]
    pub fn from_app(app: Arc<Application>) -> Self {
        Self {
            app,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header to every request.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The application under test.
    #[must_use]
    pub fn app(&self) -> &Application {
        &self.app
    }

    /// A GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// A POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// A PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// A PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// A DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// A request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri), false)
    }

    /// A WebSocket request, routed through the WebSocket routes.
    pub fn websocket(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(Method::GET, uri), true)
    }
}

/// A request builder bound to a [`TestClient`].
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
    websocket: bool,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, mut builder: TestRequestBuilder, websocket: bool) -> Self {
        for (name, value) in &client.default_headers {
            builder = builder.header(name, value);
        }
        Self {
            client,
            builder,
            websocket,
        }
    }

    fn map(mut self, f: impl FnOnce(TestRequestBuilder) -> TestRequestBuilder) -> Self {
        self.builder = f(self.builder);
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|b| b.header(name, value))
    }

    /// Sets a bearer token.
    #[must_use]
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.map(|b| b.bearer_token(token))
    }

    /// Sets a cookie.
    #[must_use]
    pub fn cookie(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|b| b.cookie(name, value))
    }

    /// Sets the raw body.
    #[must_use]
    pub fn body(self, body: impl Into<bytes::Bytes>) -> Self {
        self.map(|b| b.body(body))
    }

    /// Sets the `Content-Type` header.
    #[must_use]
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.map(|b| b.content_type(content_type))
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json<T: Serialize>(self, value: &T) -> Self {
        self.map(|b| b.json(value))
    }

    /// Sets a URL-encoded form body.
    #[must_use]
    pub fn form<T: Serialize>(self, value: &T) -> Self {
        self.map(|b| b.form(value))
    }

    /// Sets a plain-text body.
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.map(|b| b.text(text))
    }

    /// Sets the caller identity.
    #[must_use]
    pub fn identity(self, identity: Identity) -> Self {
        self.map(|b| b.identity(identity))
    }

    /// Sends the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built or the body cannot
    /// be read. Application errors arrive as error responses.
    pub async fn send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        let response = if self.websocket {
            self.client.app.handle_websocket(WebSocket::new(request)).await
        } else {
            self.client.app.handle(request).await
        };
        TestResponse::from_response(response).await
    }
}

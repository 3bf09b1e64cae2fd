//! Test request building.

use bytes::Bytes;
use http::{header, Method};
use merino_core::{Identity, Request};
use serde::Serialize;

use crate::error::TestError;

/// Builds a [`Request`] for the test client.
///
/// Serialization errors are kept until [`TestRequestBuilder::build`].
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    identity: Option<Identity>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder for `method` and `uri`.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
            identity: None,
            error: None,
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers
            .push((name.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Sets the `Content-Type` header.
    #[must_use]
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets a bearer `Authorization` header.
    #[must_use]
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header(header::AUTHORIZATION.as_str(), value)
    }

    /// Sets a `Cookie` header.
    #[must_use]
    pub fn cookie(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let cookie = format!("{}={}", name.as_ref(), value.as_ref());
        self.header(header::COOKIE.as_str(), cookie)
    }

    /// Sets the raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and content type.
    #[must_use]
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = body.into();
                self.content_type("application/json")
            }
            Err(e) => {
                self.error.get_or_insert(TestError::Json(e));
                self
            }
        }
    }

    /// Sets a URL-encoded form body and content type.
    #[must_use]
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(body) => {
                self.body = body.into();
                self.content_type("application/x-www-form-urlencoded")
            }
            Err(e) => {
                self.error.get_or_insert(TestError::Form(e));
                self
            }
        }
    }

    /// Sets a plain-text body and content type.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Bytes::from(text.into());
        self.content_type("text/plain; charset=utf-8")
    }

    /// Sets the caller identity.
    #[must_use]
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns the first serialization error, or an error for an invalid
    /// URI or header.
    pub fn build(self) -> Result<Request, TestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if let Some(identity) = self.identity {
            builder = builder.identity(identity);
        }
        Ok(builder.body(self.body).build()?)
    }
}

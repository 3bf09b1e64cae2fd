//! Default headers middleware.
//!
//! Adds a fixed set of headers to every response. Headers already set by
//! the handler or by downstream middleware are left alone.

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use merino_core::{BoxFuture, HandlerResult, Next, Request};

use crate::middleware::Middleware;

/// An invalid default header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidHeader {
    /// The offending name.
    pub name: String,
}

impl std::fmt::Display for InvalidHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid default header '{}'", self.name)
    }
}

impl std::error::Error for InvalidHeader {}

/// Middleware that adds default headers to responses.
///
/// # Example
///
/// ```
/// use merino_middleware::stages::DefaultHeadersMiddleware;
///
/// let middleware = DefaultHeadersMiddleware::from_pairs([
///     ("x-content-type-options", "nosniff"),
///     ("x-frame-options", "DENY"),
/// ])
/// .unwrap();
/// assert_eq!(middleware.headers().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DefaultHeadersMiddleware {
    headers: HeaderMap,
}

impl DefaultHeadersMiddleware {
    /// Creates the middleware from a header map.
    #[must_use]
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Creates the middleware from name/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHeader`] if a name or value is not a valid header.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, InvalidHeader>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let invalid = || InvalidHeader {
                name: name.as_ref().to_string(),
            };
            let header_name = HeaderName::from_bytes(name.as_ref().as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value.as_ref()).map_err(|_| invalid())?;
            headers.append(header_name, header_value);
        }
        Ok(Self { headers })
    }

    /// The configured headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Middleware for DefaultHeadersMiddleware {
    fn name(&self) -> &str {
        "default_headers"
    }

    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let mut response = next.run(request).await?;
            for (name, value) in &self.headers {
                if !response.headers().contains_key(name) {
                    response.headers_mut().insert(name.clone(), value.clone());
                }
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merino_core::{handler_fn, IntoResponse, Response};
    use std::sync::Arc;

    fn next_with(response: fn() -> Response) -> Next {
        Next::new(Arc::new(handler_fn(move |_req: Request| async move { Ok(response()) })))
    }

    #[tokio::test]
    async fn test_adds_headers() {
        let middleware = DefaultHeadersMiddleware::from_pairs([("x-frame-options", "DENY")]).unwrap();
        let request = Request::builder().uri("/").build().unwrap();
        let response = middleware
            .process(request, next_with(|| "ok".into_response()))
            .await
            .unwrap();
        assert_eq!(response.headers()["x-frame-options"], "DENY");
    }

    #[tokio::test]
    async fn test_keeps_existing_headers() {
        let middleware = DefaultHeadersMiddleware::from_pairs([("cache-control", "no-store")]).unwrap();
        let request = Request::builder().uri("/").build().unwrap();
        let response = middleware
            .process(
                request,
                next_with(|| {
                    let mut response = "ok".into_response();
                    response
                        .headers_mut()
                        .insert("cache-control", HeaderValue::from_static("max-age=60"));
                    response
                }),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["cache-control"], "max-age=60");
    }

    #[test]
    fn test_rejects_invalid_names() {
        let err = DefaultHeadersMiddleware::from_pairs([("bad header", "x")]).unwrap_err();
        assert_eq!(err.name, "bad header");
    }
}

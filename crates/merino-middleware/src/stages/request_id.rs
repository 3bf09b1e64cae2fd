//! Request ID middleware.
//!
//! Every [`Request`] carries a UUID v7 [`RequestId`](merino_core::RequestId)
//! assigned when it was built. This middleware echoes it in the
//! `X-Request-ID` response header so clients can correlate their requests
//! with server logs.

use http::HeaderValue;
use merino_core::{BoxFuture, HandlerResult, Next, Request};

use crate::middleware::Middleware;

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that adds the request ID to responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware;

impl RequestIdMiddleware {
    /// Creates a new request ID middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &str {
        "request_id"
    }

    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let request_id = request.id();
            tracing::debug!(request_id = %request_id, path = request.path(), "handling request");

            let mut response = next.run(request).await?;
            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

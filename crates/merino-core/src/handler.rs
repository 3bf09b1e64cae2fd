//! The canonical request handler shape.
//!
//! Every route handler, once normalized, and every middleware chain is a
//! [`Handler`]: something that takes a [`Request`] and asynchronously
//! produces a [`Response`] or a [`MerinoError`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::MerinoError;
use crate::request::Request;
use crate::response::Response;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of handling a request.
pub type HandlerResult = Result<Response, MerinoError>;

/// A request handler in canonical form.
pub trait Handler: Send + Sync + 'static {
    /// Handles a request.
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult>;
}

/// A handler backed by an async closure.
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.func)(request))
    }
}

/// Creates a canonical handler from an async closure.
///
/// ```rust
/// use merino_core::{handler_fn, Handler, IntoResponse, Request};
///
/// let handler = handler_fn(|request: Request| async move {
///     Ok(format!("path={}", request.path()).into_response())
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { func }
}

/// The rest of a middleware chain.
///
/// Built once per route when the application starts, then cloned into each
/// request. Running it hands the request to the next middleware, or to the
/// route handler at the end of the chain.
#[derive(Clone)]
pub struct Next {
    inner: Arc<dyn Handler>,
}

impl Next {
    /// Wraps the downstream handler.
    #[must_use]
    pub fn new(inner: Arc<dyn Handler>) -> Self {
        Self { inner }
    }

    /// Passes the request downstream.
    pub fn run(&self, request: Request) -> BoxFuture<'static, HandlerResult> {
        self.inner.call(request)
    }

    /// The downstream handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.inner
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

impl Handler for Next {
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult> {
        self.run(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::IntoResponse;
    use http::StatusCode;

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = handler_fn(|request: Request| async move {
            Ok(request.path().to_string().into_response())
        });
        let request = Request::builder().uri("/hello").build().unwrap();
        let response = handler.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_next_delegates() {
        let next = Next::new(Arc::new(handler_fn(|_req: Request| async {
            Err(MerinoError::not_found("nothing"))
        })));
        let request = Request::builder().uri("/").build().unwrap();
        let err = next.run(request).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}

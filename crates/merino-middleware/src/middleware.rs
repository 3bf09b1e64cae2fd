//! Core middleware trait and types.
//!
//! A [`Middleware`] sees every request before the route handler and every
//! response after it. It receives the request and a [`Next`] for the rest of
//! the chain; not calling `next` short-circuits the chain.
//!
//! # Example
//!
//! ```
//! use merino_core::{BoxFuture, HandlerResult, Next, Request};
//! use merino_middleware::Middleware;
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, HandlerResult> {
//!         Box::pin(async move {
//!             let started = std::time::Instant::now();
//!             let response = next.run(request).await;
//!             tracing::debug!(elapsed = ?started.elapsed(), "request finished");
//!             response
//!         })
//!     }
//! }
//! ```

use std::future::Future;

use merino_core::{BoxFuture, HandlerResult, Next, Request};

/// The core middleware trait.
///
/// # Invariants
///
/// - Middleware calls `next.run()` at most once
/// - Middleware does not suppress errors from downstream unless it handles them
pub trait Middleware: Send + Sync + 'static {
    /// Name of this middleware, for logs.
    fn name(&self) -> &str;

    /// Processes the request.
    ///
    /// # Arguments
    ///
    /// * `request` - The incoming request
    /// * `next` - The rest of the chain
    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, HandlerResult>;
}

/// A middleware built from an async function.
///
/// # Example
///
/// ```
/// use merino_core::{Next, Request};
/// use merino_middleware::{FnMiddleware, Middleware};
///
/// let middleware = FnMiddleware::new("passthrough", |request: Request, next: Next| async move {
///     next.run(request).await
/// });
/// assert_eq!(middleware.name(), "passthrough");
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, HandlerResult> {
        Box::pin((self.func)(request, next))
    }
}

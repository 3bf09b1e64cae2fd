//! Middleware chain composition.
//!
//! A chain is composed once per route at application start: the route
//! handler is wrapped by the last middleware, that by the one before it, and
//! so on, so middleware runs in registration order.
//!
//! ```text
//! Request → M1 → M2 → … → Mn → Handler
//!                                 ↓
//! Response ← M1 ← M2 ← … ← Mn ←──┘
//! ```

use std::sync::Arc;

use merino_core::{BoxFuture, Handler, HandlerResult, Next, Request};

use crate::middleware::Middleware;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// One middleware bound to the rest of its chain.
struct Link {
    middleware: BoxedMiddleware,
    next: Next,
}

impl Handler for Link {
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult> {
        let middleware = Arc::clone(&self.middleware);
        let next = self.next.clone();
        Box::pin(async move { middleware.process(request, next).await })
    }
}

/// Wraps `handler` in `middlewares`, the first of which runs first.
///
/// With no middleware the handler is returned unchanged.
#[must_use]
pub fn compose(middlewares: &[BoxedMiddleware], handler: Arc<dyn Handler>) -> Arc<dyn Handler> {
    middlewares.iter().rev().fold(handler, |next, middleware| {
        Arc::new(Link {
            middleware: Arc::clone(middleware),
            next: Next::new(next),
        }) as Arc<dyn Handler>
    })
}

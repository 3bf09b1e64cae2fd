//! # Merino Middleware
//!
//! Middleware for the Merino framework.
//!
//! Middleware is composed into one chain per route when the application
//! starts. Each middleware receives the request and a [`Next`] for the rest
//! of the chain; the last link is the normalized route handler.
//!
//! ```text
//! Request → DefaultHeaders → M1 → … → Mn → Handler
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use merino_core::{handler_fn, Handler, IntoResponse, Next, Request};
//! use merino_middleware::{compose, BoxedMiddleware, FnMiddleware};
//!
//! let logging: BoxedMiddleware = Arc::new(FnMiddleware::new("log", |request: Request, next: Next| async move {
//!     tracing::info!(path = request.path(), "request");
//!     next.run(request).await
//! }));
//! let handler: Arc<dyn Handler> = Arc::new(handler_fn(|_req: Request| async { Ok("hi".into_response()) }));
//! let chain = compose(&[logging], handler);
//! # let _ = chain;
//! ```

#![doc(html_root_url = "https://docs.rs/merino-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod middleware;
pub mod stages;

pub use chain::{compose, BoxedMiddleware};
pub use merino_core::Next;
pub use middleware::{FnMiddleware, Middleware};

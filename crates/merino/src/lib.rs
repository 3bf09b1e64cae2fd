//! # Merino
//!
//! An async web framework core that turns ordinary async functions into
//! request handlers by inspecting their parameters.
//!
//! Each parameter of a handler is matched to a *binder* when the
//! application starts: route segments, query strings, headers, cookies,
//! request bodies, registered services, the caller's identity, or the raw
//! request. Per request the binders run in declaration order and the
//! function is invoked with the results.
//!
//! ## Quick Start
//!
//! ```rust
//! use merino::prelude::*;
//!
//! async fn get_item(item_id: i64, FromQuery(q): FromQuery<Option<String>>) -> Json<serde_json::Value> {
//!     Json(serde_json::json!({ "item_id": item_id, "q": q }))
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = Application::new();
//! app.get("/items/{item_id}", endpoint(get_item).params(["item_id", "q"]))?;
//! app.start()?;
//!
//! let request = Request::builder().uri("/items/42?q=hello").build()?;
//! let response = app.handle(request).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! # Ok(())
//! # }
//! ```
//!
//! ## Resolution order
//!
//! For every parameter the first matching rule wins:
//!
//! 1. Alias by parameter name (`request`, `websocket`, `user`, `identity`)
//! 2. No annotation: route segment, named service, else a query list
//! 3. `Optional[T]` is unwrapped; other unions are rejected
//! 4. Framework types (`Request`, `WebSocket`, `ClientInfo`, `ServerInfo`)
//! 5. Explicit wrappers (`FromQuery`, `FromJson`, `Inject`, custom kinds)
//! 6. A route segment with the parameter's name
//! 7. A registered service type
//! 8. Simple types from the query string
//! 9. `Identity` / `User`
//!
//! Anything else fails start with [`NormalizationError::NoMatchingBinder`].
//!
//! ## Logging
//!
//! The framework emits `tracing` events. [`init_logging`] installs a
//! subscriber, usually from the `logging` section of a [`MerinoConfig`]:
//!
//! ```rust,no_run
//! let config = merino::ConfigLoader::new().with_optional_file("merino.toml")?.load()?;
//! merino::init_logging(&config.logging.to_log_config())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Middleware
//!
//! Middleware callables take the rest of the chain in a parameter named
//! `handler` or `next_handler`. Without one, the framework runs the
//! middleware and then continues the chain itself.
//!
//! ## Streaming
//!
//! [`stream_endpoint`] registers a function returning a `Stream`. Its items
//! are encoded by the [`StreamTypes`] entry for the item type; server-sent
//! events, text, bytes and JSON lines are built in.
//!
//! ## Lifecycle
//!
//! [`Application::launch`] fires `on_start`, starts the application and
//! fires `after_start`; [`Application::stop`] fires `on_stop`. See
//! [`lifecycle`] for the hook contract.

#![doc(html_root_url = "https://docs.rs/merino/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod endpoint;
pub mod lifecycle;
pub mod normalize;
mod stream;

pub use app::{Application, ErrorHandler, StartupError};
pub use endpoint::{
    endpoint, stream_endpoint, DynEndpoint, Endpoint, IntoCallable, IntoEndpoint, IntoStreamCallable, Streaming, Unary,
};
pub use lifecycle::{LifecycleError, LifecycleHook, MiddlewareHook, MiddlewareList};
pub use stream::{StreamEncoder, StreamTypes};
pub use normalize::{
    normalize_handler, normalize_middleware, DirectInput, HandlerShape, MiddlewareShape, NormalizedHandler,
    NormalizedMiddleware,
};

pub use merino_bind::{
    async_trait, BindError, Binder, BinderFactory, BinderRegistry, BinderSpec, BoundKind, Callable, CallableInfo,
    FactoryContext, FormPart, FromBytes, FromCookie, FromFiles, FromForm, FromHeader, FromJson, FromQuery,
    FromRoute, FromText, NormalizationError, Parameter, ParameterSpec, SourceKind, TypeDesc, Value, ValueSource,
};
pub use merino_config::{ConfigLoader, MerinoConfig};
pub use merino_core::di::{Container, Inject};
pub use merino_core::{
    BoxFuture, ClientInfo, Handler, HandlerResult, Identity, IntoResponse, Json, MerinoError, Next, NoContent,
    Request, Response, ServerInfo, ServerSentEvent, User, WebSocket,
};
pub use merino_middleware::{FnMiddleware, Middleware};
pub use merino_router::{RouteError, RoutePattern};
pub use merino_telemetry::{init_logging, LogConfig, LogFormat, TelemetryError};

pub use http::{Method, StatusCode};

/// Re-export of the binding crate.
pub use merino_bind as bind;
/// Re-export of the core crate.
pub use merino_core as core;
/// Re-export of the middleware crate.
pub use merino_middleware as middleware;

/// Common imports.
///
/// ```rust
/// use merino::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{endpoint, stream_endpoint, Application, DynEndpoint, IntoEndpoint, LifecycleError, StartupError};
    pub use merino_bind::{
        FromBytes, FromCookie, FromFiles, FromForm, FromHeader, FromJson, FromQuery, FromRoute, FromText,
        ParameterSpec, Value,
    };
    pub use merino_core::di::{Container, Inject};
    pub use merino_core::{
        Identity, IntoResponse, Json, MerinoError, Next, Request, Response, ServerSentEvent, User, WebSocket,
    };
    pub use merino_middleware::Middleware;

    pub use http::{Method, StatusCode};
}

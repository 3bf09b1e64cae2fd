//! The application: route table, middleware chain and dispatch.
//!
//! Registration only records callables. [`Application::start`] normalizes
//! every pending route, then every middleware, and composes one chain per
//! route; requests are served by the composed chains.
//! [`Application::launch`] wraps `start` with the `on_start` and
//! `after_start` lifecycle events, and [`Application::stop`] fires `on_stop`.
//!
//! # Example
//!
//! ```rust
//! use merino::{endpoint, Application, FromQuery};
//!
//! async fn get_item(item_id: i64, FromQuery(q): FromQuery<Option<String>>) -> String {
//!     format!("{item_id}:{}", q.unwrap_or_default())
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = Application::new();
//! app.get("/items/{item_id}", endpoint(get_item).params(["item_id", "q"]))?;
//! app.start()?;
//! assert!(app.is_started());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::{Method, StatusCode};
use merino_bind::{BinderRegistry, Callable, NormalizationError};
use merino_config::MerinoConfig;
use merino_core::di::Container;
use merino_core::{BoxFuture, Handler, MerinoError, Request, Response, ResponseExt, WebSocket};
use merino_middleware::stages::{DefaultHeadersMiddleware, InvalidHeader};
use merino_middleware::{compose, BoxedMiddleware, Middleware};
use merino_router::{RouteError, RoutePattern, Router};
use thiserror::Error;

use crate::endpoint::IntoEndpoint;
use crate::lifecycle::{Lifecycle, LifecycleError, MiddlewareEntry, MiddlewareList};
use crate::normalize::{normalize_handler, normalize_middleware, NormalizedHandler};
use crate::stream::StreamTypes;

/// Errors that abort [`Application::start`].
#[derive(Debug, Error)]
pub enum StartupError {
    /// A route handler could not be normalized.
    #[error("cannot normalize handler for route '{route}': {source}")]
    Normalization {
        /// Method and pattern of the route.
        route: String,
        /// The underlying failure.
        #[source]
        source: NormalizationError,
    },

    /// A middleware could not be normalized.
    #[error("cannot normalize middleware '{name}': {source}")]
    Middleware {
        /// Name of the middleware callable.
        name: String,
        /// The underlying failure.
        #[source]
        source: NormalizationError,
    },

    /// A route pattern is invalid.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// A configured default header is invalid.
    #[error(transparent)]
    InvalidHeader(#[from] InvalidHeader),

    /// An `on_start` or `after_start` hook failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl StartupError {
    /// The normalization failure behind this error, if any.
    #[must_use]
    pub fn normalization(&self) -> Option<&NormalizationError> {
        match self {
            Self::Normalization { source, .. } | Self::Middleware { source, .. } => Some(source),
            _ => None,
        }
    }
}

enum RouteState {
    Pending(Arc<dyn Callable>),
    Ready {
        normalized: Arc<NormalizedHandler>,
        chained: Arc<dyn Handler>,
    },
}

struct RouteEntry {
    method: Method,
    pattern: RoutePattern,
    websocket: bool,
    state: RouteState,
}

/// Builds the response for an error with a given status code.
pub type ErrorHandler = Arc<dyn Fn(Request, MerinoError) -> BoxFuture<'static, Response> + Send + Sync>;

/// A Merino application.
pub struct Application {
    routes: Vec<RouteEntry>,
    router: Router<usize>,
    ws_router: Router<usize>,
    fallback: Option<RouteEntry>,
    services: Arc<Container>,
    registry: BinderRegistry,
    middlewares: Vec<MiddlewareEntry>,
    default_headers: Option<DefaultHeadersMiddleware>,
    chain: Option<Arc<[BoxedMiddleware]>>,
    streams: StreamTypes,
    lifecycle: Lifecycle,
    error_handlers: HashMap<StatusCode, ErrorHandler>,
    show_error_details: bool,
    started: bool,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    /// Creates an application with the built-in binder registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(BinderRegistry::default())
    }

    /// Creates an application with the given binder registry.
    #[must_use]
    pub fn with_registry(registry: BinderRegistry) -> Self {
        Self {
            routes: Vec::new(),
            router: Router::new(),
            ws_router: Router::new(),
            fallback: None,
            services: Arc::new(Container::new()),
            registry,
            middlewares: Vec::new(),
            default_headers: None,
            chain: None,
            streams: StreamTypes::default(),
            lifecycle: Lifecycle::default(),
            error_handlers: HashMap::new(),
            show_error_details: false,
            started: false,
        }
    }

    /// Applies configuration: default headers, body limit and error details.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::InvalidHeader`] for an invalid default header.
    pub fn with_config(&mut self, config: &MerinoConfig) -> Result<&mut Self, StartupError> {
        if !config.server.default_headers.is_empty() {
            self.default_headers(&config.server.default_headers)?;
        }
        self.registry.set_max_body_size(config.binding.max_body_size);
        self.show_error_details = config.server.show_error_details;
        Ok(self)
    }

    /// Registers a handler for `method` and `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the pattern is invalid or already taken.
    pub fn route(&mut self, method: Method, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        let index = self.routes.len();
        let pattern = self.router.insert(method.clone(), path, index)?;
        self.routes.push(RouteEntry {
            method,
            pattern,
            websocket: false,
            state: RouteState::Pending(handler.into_callable()),
        });
        Ok(self)
    }

    /// Registers a GET handler.
    ///
    /// # Errors
    ///
    /// See [`Application::route`].
    pub fn get(&mut self, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        self.route(Method::GET, path, handler)
    }

    /// Registers a POST handler.
    ///
    /// # Errors
    ///
    /// See [`Application::route`].
    pub fn post(&mut self, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        self.route(Method::POST, path, handler)
    }

    /// Registers a PUT handler.
    ///
    /// # Errors
    ///
    /// See [`Application::route`].
    pub fn put(&mut self, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        self.route(Method::PUT, path, handler)
    }

    /// Registers a PATCH handler.
    ///
    /// # Errors
    ///
    /// See [`Application::route`].
    pub fn patch(&mut self, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        self.route(Method::PATCH, path, handler)
    }

    /// Registers a DELETE handler.
    ///
    /// # Errors
    ///
    /// See [`Application::route`].
    pub fn delete(&mut self, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        self.route(Method::DELETE, path, handler)
    }

    /// Registers a HEAD handler.
    ///
    /// # Errors
    ///
    /// See [`Application::route`].
    pub fn head(&mut self, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        self.route(Method::HEAD, path, handler)
    }

    /// Registers an OPTIONS handler.
    ///
    /// # Errors
    ///
    /// See [`Application::route`].
    pub fn options(&mut self, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        self.route(Method::OPTIONS, path, handler)
    }

    /// Registers a WebSocket handler, served by [`Application::handle_websocket`].
    ///
    /// # Errors
    ///
    /// See [`Application::route`].
    pub fn ws(&mut self, path: &str, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        let index = self.routes.len();
        let pattern = self.ws_router.insert(Method::GET, path, index)?;
        self.routes.push(RouteEntry {
            method: Method::GET,
            pattern,
            websocket: true,
            state: RouteState::Pending(handler.into_callable()),
        });
        Ok(self)
    }

    /// Sets the handler used when no route matches.
    ///
    /// The fallback is normalized against the root pattern, so it has no
    /// route parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the root pattern cannot be built.
    pub fn fallback(&mut self, handler: impl IntoEndpoint) -> Result<&mut Self, RouteError> {
        self.fallback = Some(RouteEntry {
            method: Method::GET,
            pattern: RoutePattern::parse("/")?,
            websocket: false,
            state: RouteState::Pending(handler.into_callable()),
        });
        Ok(self)
    }

    /// Registers a middleware callable, normalized at start.
    ///
    /// Middleware registered after start is ignored.
    pub fn middleware(&mut self, middleware: impl IntoEndpoint) -> &mut Self {
        let callable = middleware.into_callable();
        if self.chain.is_some() {
            tracing::warn!(middleware = %callable.info().name, "middleware registered after start is ignored");
            return self;
        }
        self.middlewares.push(MiddlewareEntry::Pending(callable));
        self
    }

    /// Registers a native middleware.
    ///
    /// Middleware registered after start is ignored.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        if self.chain.is_some() {
            tracing::warn!(middleware = middleware.name(), "middleware registered after start is ignored");
            return self;
        }
        self.middlewares.push(MiddlewareEntry::Native(Arc::new(middleware)));
        self
    }

    /// Adds headers to every response; runs before all other middleware.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHeader`] for an invalid name or value.
    pub fn default_headers<I, K, V>(&mut self, headers: I) -> Result<&mut Self, InvalidHeader>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.default_headers = Some(DefaultHeadersMiddleware::from_pairs(headers)?);
        Ok(self)
    }

    /// Services available to handlers.
    #[must_use]
    pub fn services(&self) -> &Arc<Container> {
        &self.services
    }

    /// Mutable access to the services.
    ///
    /// Routes normalized earlier keep the services they were built with.
    pub fn services_mut(&mut self) -> &mut Container {
        Arc::make_mut(&mut self.services)
    }

    /// The binder registry.
    #[must_use]
    pub fn registry(&self) -> &BinderRegistry {
        &self.registry
    }

    /// Mutable access to the binder registry.
    pub fn registry_mut(&mut self) -> &mut BinderRegistry {
        &mut self.registry
    }

    /// Encoders for the items of streaming handlers.
    #[must_use]
    pub fn streams(&self) -> &StreamTypes {
        &self.streams
    }

    /// Mutable access to the stream encoders.
    pub fn streams_mut(&mut self) -> &mut StreamTypes {
        &mut self.streams
    }

    /// Registers the response builder for errors with `status`.
    ///
    /// Covers routing failures (`404`, `503`) and errors returned by
    /// handlers or middleware. A later registration for the same status
    /// replaces the earlier one.
    pub fn exception_handler<F, Fut>(&mut self, status: StatusCode, handler: F) -> &mut Self
    where
        F: Fn(Request, MerinoError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let handler: ErrorHandler = Arc::new(move |request: Request, err: MerinoError| -> BoxFuture<'static, Response> {
            Box::pin(handler(request, err))
        });
        self.error_handlers.insert(status, handler);
        self
    }

    /// Adds an `on_start` hook, run by [`Application::launch`] before routes
    /// are normalized.
    ///
    /// Services registered here are visible to every route.
    pub fn on_start<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        self.lifecycle.add_on_start(hook);
        self
    }

    /// Adds an `after_start` hook, run by [`Application::launch`] once the
    /// application serves requests.
    pub fn after_start<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        self.lifecycle.add_after_start(hook);
        self
    }

    /// Adds an `on_stop` hook, run by [`Application::stop`].
    pub fn on_stop<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        self.lifecycle.add_on_stop(hook);
        self
    }

    /// Adds a hook that may change the middleware list right before the
    /// chain is composed.
    pub fn on_middlewares_configuration<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut MiddlewareList<'_>) + Send + Sync + 'static,
    {
        self.lifecycle.add_on_middlewares(Arc::new(hook));
        self
    }

    /// Whether [`Application::start`] has completed.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The normalized handler of a route, once started.
    #[must_use]
    pub fn normalized(&self, method: &Method, pattern: &str) -> Option<&Arc<NormalizedHandler>> {
        self.routes
            .iter()
            .find(|entry| &entry.method == method && entry.pattern.as_str() == pattern)
            .and_then(|entry| match &entry.state {
                RouteState::Ready { normalized, .. } => Some(normalized),
                RouteState::Pending(_) => None,
            })
    }

    /// Normalizes pending routes and middleware and composes the chains.
    ///
    /// Calling `start` again only normalizes routes registered since; the
    /// middleware chain is built once.
    ///
    /// # Errors
    ///
    /// Returns the first normalization failure. Nothing is served until
    /// `start` succeeds.
    pub fn start(&mut self) -> Result<(), StartupError> {
        let mut normalized = Vec::new();
        for (index, entry) in self.routes.iter().enumerate() {
            if let RouteState::Pending(callable) = &entry.state {
                normalized.push((index, self.normalize_route(entry, callable)?));
            }
        }
        let fallback = match &self.fallback {
            Some(entry @ RouteEntry {
                state: RouteState::Pending(callable),
                ..
            }) => Some(self.normalize_route(entry, callable)?),
            _ => None,
        };

        let chain = self.middleware_chain()?;
        let count = normalized.len();
        for (index, handler) in normalized {
            let chained = compose(&chain, Arc::clone(&handler) as Arc<dyn Handler>);
            self.routes[index].state = RouteState::Ready {
                normalized: handler,
                chained,
            };
        }
        if let (Some(handler), Some(entry)) = (fallback, self.fallback.as_mut()) {
            let chained = compose(&chain, Arc::clone(&handler) as Arc<dyn Handler>);
            entry.state = RouteState::Ready {
                normalized: handler,
                chained,
            };
        }

        if !self.started {
            tracing::info!(
                routes = self.routes.len(),
                middlewares = chain.len(),
                "application started"
            );
        } else if count > 0 {
            tracing::info!(routes = count, "normalized routes registered after start");
        }
        self.started = true;
        Ok(())
    }

    /// Fires `on_start`, starts the application, then fires `after_start`.
    ///
    /// An application that has already started only normalizes routes
    /// registered since.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Lifecycle`] when a start hook fails, or any
    /// [`Application::start`] failure.
    pub async fn launch(&mut self) -> Result<(), StartupError> {
        if self.started {
            return self.start();
        }
        self.lifecycle.fire_on_start(Arc::make_mut(&mut self.services)).await?;
        self.start()?;
        self.lifecycle
            .fire_after_start(Arc::make_mut(&mut self.services))
            .await?;
        Ok(())
    }

    /// Fires `on_stop`; requests are refused afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Stop`] naming every hook that failed.
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        self.started = false;
        let result = self.lifecycle.fire_on_stop(Arc::make_mut(&mut self.services)).await;
        tracing::info!(ok = result.is_ok(), "application stopped");
        result
    }

    fn normalize_route(&self, entry: &RouteEntry, callable: &Arc<dyn Callable>) -> Result<Arc<NormalizedHandler>, StartupError> {
        normalize_handler(
            Arc::clone(callable),
            &entry.pattern,
            &self.registry,
            &self.services,
            &self.streams,
        )
            .map(Arc::new)
            .map_err(|source| StartupError::Normalization {
                route: format!("{} {}", entry.method, entry.pattern),
                source,
            })
    }

    fn middleware_chain(&mut self) -> Result<Arc<[BoxedMiddleware]>, StartupError> {
        if let Some(chain) = &self.chain {
            return Ok(Arc::clone(chain));
        }
        self.lifecycle.configure_middlewares(&mut self.middlewares);

        let mut chain: Vec<BoxedMiddleware> = Vec::with_capacity(self.middlewares.len() + 1);
        if let Some(headers) = &self.default_headers {
            chain.push(Arc::new(headers.clone()));
        }
        for entry in &self.middlewares {
            match entry {
                MiddlewareEntry::Native(middleware) => chain.push(Arc::clone(middleware)),
                MiddlewareEntry::Pending(callable) => {
                    let normalized = normalize_middleware(Arc::clone(callable), &self.registry, &self.services)
                        .map_err(|source| StartupError::Middleware {
                            name: callable.info().name.clone(),
                            source,
                        })?;
                    chain.push(Arc::new(normalized));
                }
            }
        }

        let chain: Arc<[BoxedMiddleware]> = chain.into();
        self.chain = Some(Arc::clone(&chain));
        Ok(chain)
    }

    /// Serves an HTTP request.
    ///
    /// Errors are converted to JSON error responses; nothing here panics or
    /// leaks into other requests.
    pub async fn handle(&self, request: Request) -> Response {
        self.dispatch(request, false).await
    }

    /// Serves a WebSocket request through the WebSocket routes.
    pub async fn handle_websocket(&self, websocket: WebSocket) -> Response {
        self.dispatch(websocket.into_request(), true).await
    }

    async fn dispatch(&self, mut request: Request, websocket: bool) -> Response {
        let request_id = request.id().to_string();
        if !self.started {
            let err = MerinoError::service_unavailable("application has not started");
            return self.error_response(err, Some(request), &request_id).await;
        }

        let router = if websocket { &self.ws_router } else { &self.router };
        let entry = match router.at(request.method(), request.path()) {
            Some(found) => {
                request.set_route_values(found.params);
                self.routes.get(*found.value)
            }
            None if !websocket => self.fallback.as_ref(),
            None => None,
        };

        let Some(entry) = entry else {
            let err = MerinoError::not_found(format!("no route for {} {}", request.method(), request.path()));
            return self.error_response(err, Some(request), &request_id).await;
        };
        let RouteState::Ready { chained, .. } = &entry.state else {
            let err = MerinoError::service_unavailable(format!("route '{}' is not ready", entry.pattern));
            return self.error_response(err, Some(request), &request_id).await;
        };
        debug_assert_eq!(entry.websocket, websocket);

        let retained = (!self.error_handlers.is_empty()).then(|| request.clone());
        match chained.call(request).await {
            Ok(response) => response,
            Err(err) => {
                if err.status_code().is_server_error() {
                    tracing::warn!(request_id = %request_id, route = %entry.pattern, error = %err, "request failed");
                } else {
                    tracing::debug!(request_id = %request_id, route = %entry.pattern, error = %err, "request rejected");
                }
                self.error_response(err, retained, &request_id).await
            }
        }
    }

    async fn error_response(&self, err: MerinoError, request: Option<Request>, request_id: &str) -> Response {
        if let (Some(handler), Some(request)) = (self.error_handlers.get(&err.status_code()), request) {
            return handler(request, err).await;
        }
        Response::from_error(&err, Some(request_id), self.show_error_details)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("routes", &self.routes.len())
            .field("middlewares", &self.middlewares.len())
            .field("lifecycle", &self.lifecycle)
            .field("streams", &self.streams)
            .field("exception_handlers", &self.error_handlers.len())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

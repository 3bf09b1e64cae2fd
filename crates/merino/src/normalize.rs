//! Handler and middleware normalization.
//!
//! Normalization turns a registered [`Callable`] into the canonical
//! `(request) -> response` shape once, at application start. The result
//! records which of four shapes applies:
//!
//! | Shape    | When                                         | Per request                    |
//! |----------|----------------------------------------------|--------------------------------|
//! | `NoArgs` | the callable takes no parameters             | invoke with nothing            |
//! | `Direct` | one parameter declared `Request`/`WebSocket` | pass the request through       |
//! | `Bound`  | anything else                                | run every binder, then invoke  |
//! | `Stream` | the callable yields a stream                 | bind, then encode the items    |
//!
//! Middleware follows the same idea with a fourth input: the rest of the
//! chain, delivered to a parameter named `handler` or `next_handler` (or
//! declared as [`Next`]).

use std::fmt;
use std::sync::Arc;

use merino_bind::{inspect, Binder, BinderRegistry, Callable, ResolveContext, Signature, Slot, TypeDesc, TypeKey, Value};
use merino_bind::{resolve_slots, NormalizationError, ResolvedSlots, NEXT_HANDLER_NAMES};
use merino_core::di::Container;
use merino_core::{BoxFuture, Handler, HandlerResult, MerinoError, Next, Request, WebSocket};
use merino_middleware::Middleware;
use merino_router::RoutePattern;

use crate::stream::{StreamEncoder, StreamTypes};

/// The input a `Direct` handler receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectInput {
    /// The request itself.
    Request,
    /// The request wrapped as a WebSocket.
    WebSocket,
}

/// How a normalized handler turns a request into arguments.
#[derive(Debug, Clone)]
pub enum HandlerShape {
    /// No parameters; the request is never read.
    NoArgs,
    /// One parameter that receives the request as-is.
    Direct(DirectInput),
    /// One binder per parameter, awaited in declaration order.
    Bound {
        /// The binders, in declaration order.
        binders: Arc<[Binder]>,
        /// Whether a binder reads the request body.
        body_claimed: bool,
    },
    /// Bound like `Bound`; the yielded items are encoded into the response.
    Stream {
        /// The binders, in declaration order.
        binders: Arc<[Binder]>,
        /// Whether a binder reads the request body.
        body_claimed: bool,
        /// The type of each yielded item.
        item: TypeKey,
    },
}

/// A route handler in canonical form.
#[derive(Clone)]
pub struct NormalizedHandler {
    original: Arc<dyn Callable>,
    shape: HandlerShape,
    return_type: Option<String>,
    encoder: Option<StreamEncoder>,
}

impl NormalizedHandler {
    /// The callable this handler was built from.
    #[must_use]
    pub fn original(&self) -> &Arc<dyn Callable> {
        &self.original
    }

    /// The normalized shape.
    #[must_use]
    pub fn shape(&self) -> &HandlerShape {
        &self.shape
    }

    /// The binders of a `Bound` or `Stream` handler; empty otherwise.
    #[must_use]
    pub fn binders(&self) -> &[Binder] {
        match &self.shape {
            HandlerShape::Bound { binders, .. } | HandlerShape::Stream { binders, .. } => binders,
            _ => &[],
        }
    }

    /// Whether a parameter reads the request body.
    #[must_use]
    pub fn body_claimed(&self) -> bool {
        matches!(
            self.shape,
            HandlerShape::Bound { body_claimed: true, .. } | HandlerShape::Stream { body_claimed: true, .. }
        )
    }

    /// Whether the handler responds with a stream of items.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self.shape, HandlerShape::Stream { .. })
    }

    /// The declared return type of the original callable.
    #[must_use]
    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }
}

impl fmt::Debug for NormalizedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedHandler")
            .field("callable", &self.original.info().name)
            .field("shape", &self.shape)
            .field("return_type", &self.return_type)
            .finish()
    }
}

impl Handler for NormalizedHandler {
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult> {
        match &self.shape {
            HandlerShape::NoArgs => self.original.invoke(Vec::new()),
            HandlerShape::Direct(DirectInput::Request) => self.original.invoke(vec![Value::Request(request)]),
            HandlerShape::Direct(DirectInput::WebSocket) => self
                .original
                .invoke(vec![Value::WebSocket(WebSocket::new(request))]),
            HandlerShape::Bound { binders, .. } => {
                let binders = Arc::clone(binders);
                let original = Arc::clone(&self.original);
                Box::pin(async move {
                    let args = bind_all(&binders, &request, original.info().name.as_str()).await?;
                    original.invoke(args).await
                })
            }
            HandlerShape::Stream { binders, .. } => {
                let binders = Arc::clone(binders);
                let original = Arc::clone(&self.original);
                let encoder = self.encoder.clone();
                Box::pin(async move {
                    let encoder = encoder.ok_or_else(|| MerinoError::internal("stream handler without encoder"))?;
                    let args = bind_all(&binders, &request, original.info().name.as_str()).await?;
                    let items = original.invoke_stream(args)?;
                    Ok(encoder(items))
                })
            }
        }
    }
}

async fn bind_all(binders: &[Binder], request: &Request, callable: &str) -> Result<Vec<Value>, MerinoError> {
    let mut args = Vec::with_capacity(binders.len());
    for binder in binders {
        args.push(bind_one(binder, request, callable).await?);
    }
    Ok(args)
}

async fn bind_one(binder: &Binder, request: &Request, callable: &str) -> Result<Value, MerinoError> {
    binder.get_parameter(request).await.map_err(|err| {
        tracing::debug!(
            callable,
            parameter = binder.parameter(),
            status = err.status_code().as_u16(),
            error = %err,
            "parameter binding failed"
        );
        MerinoError::from(err)
    })
}

fn ensure_async(callable: &dyn Callable) -> Result<(), NormalizationError> {
    if callable.info().is_async {
        Ok(())
    } else {
        Err(NormalizationError::NotAsync {
            callable: callable.info().name.clone(),
        })
    }
}

fn direct_input(signature: &Signature) -> Option<DirectInput> {
    if signature.len() != 1 {
        return None;
    }
    match signature.params().next()?.declared {
        Some(TypeDesc::Request) => Some(DirectInput::Request),
        Some(TypeDesc::WebSocket) => Some(DirectInput::WebSocket),
        _ => None,
    }
}

fn bound_binders(resolved: ResolvedSlots) -> Vec<Binder> {
    resolved
        .into_slots()
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Bind(binder) => Some(binder),
            Slot::Next => None,
        })
        .collect()
}

/// Normalizes a route handler.
///
/// Binders are built fresh for this route; nothing is shared between routes.
/// A streaming callable is accepted only when `streams` can encode its item
/// type.
///
/// # Errors
///
/// Returns [`NormalizationError::NotAsync`] for a blocking callable,
/// [`NormalizationError::StreamItemUndeclared`] or
/// [`NormalizationError::StreamItemUnregistered`] for a stream that cannot be
/// encoded, or the first inspection or resolution failure.
pub fn normalize_handler(
    callable: Arc<dyn Callable>,
    route: &RoutePattern,
    registry: &BinderRegistry,
    services: &Arc<Container>,
    streams: &StreamTypes,
) -> Result<NormalizedHandler, NormalizationError> {
    ensure_async(callable.as_ref())?;
    let signature = inspect(callable.as_ref(), registry.type_names())?;
    let return_type = signature.return_type().map(str::to_string);

    if let Some(stream) = callable.info().stream {
        let item = stream.item.ok_or_else(|| NormalizationError::StreamItemUndeclared {
            callable: signature.callable().to_string(),
        })?;
        let encoder = streams
            .encoder(&item)
            .cloned()
            .ok_or_else(|| NormalizationError::StreamItemUnregistered {
                callable: signature.callable().to_string(),
                item: item.name().to_string(),
            })?;
        let ctx = ResolveContext::for_route(registry, services, route);
        let resolved = resolve_slots(&signature, &ctx)?;
        let body_claimed = resolved.body_claimed();
        let binders = bound_binders(resolved);
        tracing::debug!(
            callable = signature.callable(),
            %route,
            binders = binders.len(),
            item = item.short_name(),
            "normalized streaming handler"
        );
        return Ok(NormalizedHandler {
            original: callable,
            shape: HandlerShape::Stream {
                binders: binders.into(),
                body_claimed,
                item,
            },
            return_type,
            encoder: Some(encoder),
        });
    }

    let shape = if signature.is_empty() {
        tracing::debug!(callable = signature.callable(), %route, fast_path = true, "normalized handler without parameters");
        HandlerShape::NoArgs
    } else if let Some(input) = direct_input(&signature) {
        tracing::debug!(callable = signature.callable(), %route, fast_path = true, ?input, "normalized direct handler");
        HandlerShape::Direct(input)
    } else {
        let ctx = ResolveContext::for_route(registry, services, route);
        let resolved = resolve_slots(&signature, &ctx)?;
        let body_claimed = resolved.body_claimed();
        let binders = bound_binders(resolved);
        tracing::debug!(
            callable = signature.callable(),
            %route,
            binders = binders.len(),
            body_claimed,
            "normalized bound handler"
        );
        HandlerShape::Bound {
            binders: binders.into(),
            body_claimed,
        }
    };

    Ok(NormalizedHandler {
        original: callable,
        shape,
        return_type,
        encoder: None,
    })
}

/// How a normalized middleware turns a request into arguments.
#[derive(Debug, Clone)]
pub enum MiddlewareShape {
    /// `(request, handler)`: passed straight through.
    Direct {
        /// Whether `request` is the first parameter.
        request_first: bool,
    },
    /// Bound parameters, with or without a next-handler slot.
    Bound {
        /// One slot per parameter.
        slots: Arc<[Slot]>,
        /// Whether a parameter receives the rest of the chain.
        controls_chain: bool,
    },
}

/// A middleware in canonical form.
#[derive(Clone)]
pub struct NormalizedMiddleware {
    original: Arc<dyn Callable>,
    shape: MiddlewareShape,
}

impl NormalizedMiddleware {
    /// The callable this middleware was built from.
    #[must_use]
    pub fn original(&self) -> &Arc<dyn Callable> {
        &self.original
    }

    /// The normalized shape.
    #[must_use]
    pub fn shape(&self) -> &MiddlewareShape {
        &self.shape
    }

    /// Whether the middleware decides if the rest of the chain runs.
    #[must_use]
    pub fn controls_chain(&self) -> bool {
        match &self.shape {
            MiddlewareShape::Direct { .. } => true,
            MiddlewareShape::Bound { controls_chain, .. } => *controls_chain,
        }
    }
}

impl fmt::Debug for NormalizedMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedMiddleware")
            .field("callable", &self.original.info().name)
            .field("shape", &self.shape)
            .finish()
    }
}

impl Middleware for NormalizedMiddleware {
    fn name(&self) -> &str {
        &self.original.info().name
    }

    fn process<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, HandlerResult> {
        match &self.shape {
            MiddlewareShape::Direct { request_first } => {
                let args = if *request_first {
                    vec![Value::Request(request), Value::Next(next)]
                } else {
                    vec![Value::Next(next), Value::Request(request)]
                };
                self.original.invoke(args)
            }
            MiddlewareShape::Bound { slots, controls_chain } => Box::pin(async move {
                let callable = self.name();
                let mut args = Vec::with_capacity(slots.len());
                for slot in slots.iter() {
                    match slot {
                        Slot::Next => args.push(Value::Next(next.clone())),
                        Slot::Bind(binder) => args.push(bind_one(binder, &request, callable).await?),
                    }
                }
                if *controls_chain {
                    return self.original.invoke(args).await;
                }
                self.original.invoke(args).await?;
                next.run(request).await
            }),
        }
    }
}

fn is_direct_middleware(signature: &Signature) -> Option<bool> {
    if signature.len() != 2 {
        return None;
    }
    let mut request_at = None;
    let mut handler_at = None;
    for (index, param) in signature.params().enumerate() {
        let declared = param.declared.as_ref();
        if param.name == "request" && matches!(declared, None | Some(TypeDesc::Request)) {
            request_at = Some(index);
        } else if NEXT_HANDLER_NAMES.contains(&param.name.as_str()) && matches!(declared, None | Some(TypeDesc::Next)) {
            handler_at = Some(index);
        }
    }
    match (request_at, handler_at) {
        (Some(request), Some(_)) => Some(request == 0),
        _ => None,
    }
}

/// Normalizes a middleware.
///
/// # Errors
///
/// Returns [`NormalizationError::NotAsync`] for a blocking callable, or the
/// first inspection or resolution failure.
pub fn normalize_middleware(
    callable: Arc<dyn Callable>,
    registry: &BinderRegistry,
    services: &Arc<Container>,
) -> Result<NormalizedMiddleware, NormalizationError> {
    ensure_async(callable.as_ref())?;
    let signature = inspect(callable.as_ref(), registry.type_names())?;

    let shape = if let Some(request_first) = is_direct_middleware(&signature) {
        tracing::debug!(callable = signature.callable(), fast_path = true, "normalized direct middleware");
        MiddlewareShape::Direct { request_first }
    } else {
        let ctx = ResolveContext::for_middleware(registry, services);
        let slots = resolve_slots(&signature, &ctx)?.into_slots();
        let controls_chain = slots.iter().any(Slot::is_next);
        tracing::debug!(
            callable = signature.callable(),
            slots = slots.len(),
            controls_chain,
            "normalized bound middleware"
        );
        MiddlewareShape::Bound {
            slots: slots.into(),
            controls_chain,
        }
    };

    Ok(NormalizedMiddleware { original: callable, shape })
}

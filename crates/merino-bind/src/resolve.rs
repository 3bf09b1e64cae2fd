//! Binder resolution.
//!
//! [`resolve_parameter`] picks the binder for one parameter by walking a
//! fixed sequence of rules, stopping at the first that applies:
//!
//! 1. the parameter name is a registered alias
//! 2. the parameter is unannotated: route value, named service, or query
//! 3. an optional annotation is unwrapped; any other union is rejected
//! 4. the exact type has a registered handler
//! 5. the type is a bound-value wrapper
//! 6. the parameter name is a route segment
//! 7. the type is a registered service
//! 8. the type is simple: query string
//! 9. the type is an identity
//!
//! Anything else is a [`NormalizationError::NoMatchingBinder`].

use std::sync::Arc;

use merino_core::di::Container;
use merino_router::RoutePattern;

use crate::binder::{Binder, BinderSource, FactoryContext, ServiceLookup, SourceKind};
use crate::error::NormalizationError;
use crate::registry::{BinderRegistry, BinderSpec};
use crate::signature::{ParameterDescriptor, Signature};
use crate::types::{BoundDesc, BoundKind, TypeDesc};

/// Parameter names that receive the rest of a middleware chain.
pub const NEXT_HANDLER_NAMES: [&str; 2] = ["handler", "next_handler"];

/// What resolution needs to know about the callable's surroundings.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Binder configuration.
    pub registry: &'a BinderRegistry,
    /// The service container.
    pub services: &'a Arc<Container>,
    /// The route the callable serves; `None` for middleware.
    pub route: Option<&'a RoutePattern>,
}

impl<'a> ResolveContext<'a> {
    /// A context for a route handler.
    #[must_use]
    pub fn for_route(registry: &'a BinderRegistry, services: &'a Arc<Container>, route: &'a RoutePattern) -> Self {
        Self {
            registry,
            services,
            route: Some(route),
        }
    }

    /// A context for middleware.
    #[must_use]
    pub fn for_middleware(registry: &'a BinderRegistry, services: &'a Arc<Container>) -> Self {
        Self {
            registry,
            services,
            route: None,
        }
    }

    fn route_has(&self, name: &str) -> bool {
        self.route.is_some_and(|route| route.has_param(name))
    }
}

/// One positional argument of a normalized callable.
#[derive(Debug, Clone)]
pub enum Slot {
    /// A value produced by a binder.
    Bind(Binder),
    /// The rest of the middleware chain.
    Next,
}

impl Slot {
    /// The binder, unless this is the chain sentinel.
    #[must_use]
    pub fn binder(&self) -> Option<&Binder> {
        match self {
            Self::Bind(binder) => Some(binder),
            Self::Next => None,
        }
    }

    /// Returns true for the chain sentinel.
    #[must_use]
    pub fn is_next(&self) -> bool {
        matches!(self, Self::Next)
    }
}

/// The slots of a resolved signature.
#[derive(Debug, Clone)]
pub struct ResolvedSlots {
    slots: Vec<Slot>,
    body_param: Option<String>,
}

impl ResolvedSlots {
    /// One slot per declared parameter, in order.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The parameter that reads the request body, if any.
    #[must_use]
    pub fn body_param(&self) -> Option<&str> {
        self.body_param.as_deref()
    }

    /// Whether a parameter reads the request body.
    #[must_use]
    pub fn body_claimed(&self) -> bool {
        self.body_param.is_some()
    }

    /// Takes the slots.
    #[must_use]
    pub fn into_slots(self) -> Vec<Slot> {
        self.slots
    }
}

/// Resolves every parameter of a signature into a slot.
///
/// Without a route, parameters named `handler` or `next_handler`, or
/// declared as `Next`, become [`Slot::Next`]. At most one parameter may
/// read the request body; the result records which one did.
///
/// # Errors
///
/// Returns the first resolution failure, or
/// [`NormalizationError::AmbiguousSignature`] when two parameters read the
/// request body.
pub fn resolve_slots(signature: &Signature, ctx: &ResolveContext<'_>) -> Result<ResolvedSlots, NormalizationError> {
    let mut slots = Vec::with_capacity(signature.len());
    let mut body_param: Option<&str> = None;

    for param in signature.params() {
        if ctx.route.is_none() && is_next_parameter(param) {
            slots.push(Slot::Next);
            continue;
        }

        let binder = resolve_parameter(signature.callable(), param, ctx)?;
        if binder.is_body() {
            if let Some(first) = body_param {
                return Err(NormalizationError::AmbiguousSignature {
                    callable: signature.callable().to_string(),
                    first: first.to_string(),
                    second: param.name.clone(),
                });
            }
            body_param = Some(&param.name);
        }

        tracing::trace!(
            callable = signature.callable(),
            parameter = %param.name,
            source = ?binder.kind(),
            required = binder.is_required(),
            implicit = binder.implicit(),
            "resolved binder"
        );
        slots.push(Slot::Bind(binder));
    }

    Ok(ResolvedSlots {
        slots,
        body_param: body_param.map(str::to_string),
    })
}

fn is_next_parameter(param: &ParameterDescriptor) -> bool {
    match &param.declared {
        Some(TypeDesc::Next) => true,
        None => NEXT_HANDLER_NAMES.contains(&param.name.as_str()),
        Some(_) => false,
    }
}

/// Picks the binder for one parameter.
///
/// # Errors
///
/// Returns a [`NormalizationError`] when no rule applies or the declared
/// type is not bindable.
pub fn resolve_parameter(
    callable: &str,
    param: &ParameterDescriptor,
    ctx: &ResolveContext<'_>,
) -> Result<Binder, NormalizationError> {
    let binder = select_binder(callable, param, ctx)?;
    Ok(binder
        .with_default(param.default.clone())
        .with_max_body_size(ctx.registry.max_body_size()))
}

fn select_binder(
    callable: &str,
    param: &ParameterDescriptor,
    ctx: &ResolveContext<'_>,
) -> Result<Binder, NormalizationError> {
    let name = param.name.as_str();

    if let Some(spec) = ctx.registry.alias(name) {
        let target = param.declared.clone().map_or_else(
            || alias_target(spec),
            |declared| unwrap_optional(declared).0,
        );
        let optional = param.declared.as_ref().is_some_and(TypeDesc::is_optional);
        return Ok(from_spec(callable, param, spec, name, target, ctx)?
            .with_required(!optional)
            .with_implicit(true));
    }

    let Some(declared) = param.declared.clone() else {
        return Ok(unannotated(name, ctx));
    };

    let annotation = declared.to_string();
    let (declared, root_optional) = unwrap_optional(declared);
    if matches!(declared, TypeDesc::Union(_)) {
        return Err(NormalizationError::UnsupportedUnion {
            callable: callable.to_string(),
            parameter: name.to_string(),
            annotation,
        });
    }

    if let Some(spec) = ctx.registry.type_handler(&declared) {
        if !matches!(declared, TypeDesc::Bound(_)) && !is_service(&declared, ctx) {
            return Ok(from_spec(callable, param, spec, name, declared, ctx)?.with_required(!root_optional));
        }
    }

    if let TypeDesc::Bound(bound) = declared {
        return bound_binder(callable, param, bound, root_optional, ctx);
    }

    if ctx.route_has(name) {
        return Ok(Binder::new(BinderSource::Route, name, name, declared)
            .with_required(!root_optional)
            .with_implicit(true));
    }

    if let TypeDesc::Named(key) = &declared {
        if ctx.services.contains_type(key.id()) {
            let source = BinderSource::Services {
                lookup: ServiceLookup::ByType(*key),
                container: Arc::clone(ctx.services),
            };
            return Ok(Binder::new(source, name, key.short_name(), declared)
                .with_required(!root_optional)
                .with_implicit(true));
        }
    }

    if ctx.registry.is_simple(&declared) {
        return Ok(Binder::new(BinderSource::Query, name, name, declared)
            .with_required(!root_optional)
            .with_implicit(true));
    }

    if matches!(declared, TypeDesc::Identity | TypeDesc::User) {
        return Ok(Binder::new(BinderSource::Identity, name, name, declared)
            .with_required(!root_optional)
            .with_implicit(true));
    }

    Err(NormalizationError::NoMatchingBinder {
        callable: callable.to_string(),
        parameter: name.to_string(),
        annotation: declared.to_string(),
    })
}

fn unannotated(name: &str, ctx: &ResolveContext<'_>) -> Binder {
    if ctx.route_has(name) {
        return Binder::new(BinderSource::Route, name, name, TypeDesc::Str).with_implicit(true);
    }
    if ctx.services.contains_name(name) {
        let source = BinderSource::Services {
            lookup: ServiceLookup::ByName(name.to_string()),
            container: Arc::clone(ctx.services),
        };
        return Binder::new(source, name, name, TypeDesc::Any).with_implicit(true);
    }
    Binder::new(BinderSource::Query, name, name, TypeDesc::list(TypeDesc::Str))
        .with_required(false)
        .with_implicit(true)
}

/// Strips every layer of `Optional[T]` and `T | None`.
///
/// `Optional[Optional[int]]` and `Optional[int | None]` both give `int`.
/// A union left with two or more members after dropping `None` is returned
/// as a union for the caller to reject.
fn unwrap_optional(desc: TypeDesc) -> (TypeDesc, bool) {
    let mut current = desc;
    let mut optional = false;
    loop {
        current = match current {
            TypeDesc::Optional(inner) => *inner,
            TypeDesc::Union(members) if members.contains(&TypeDesc::NoneType) => {
                let mut rest: Vec<TypeDesc> = members
                    .into_iter()
                    .filter(|member| *member != TypeDesc::NoneType)
                    .collect();
                match rest.len() {
                    0 => TypeDesc::NoneType,
                    1 => rest.remove(0),
                    _ => TypeDesc::Union(rest),
                }
            }
            other => return (other, optional),
        };
        optional = true;
    }
}

fn is_service(desc: &TypeDesc, ctx: &ResolveContext<'_>) -> bool {
    matches!(desc, TypeDesc::Named(key) if ctx.services.contains_type(key.id()))
}

fn alias_target(spec: &BinderSpec) -> TypeDesc {
    match spec {
        BinderSpec::Source(SourceKind::Request) => TypeDesc::Request,
        BinderSpec::Source(SourceKind::WebSocket) => TypeDesc::WebSocket,
        BinderSpec::Source(SourceKind::Identity) => TypeDesc::Identity,
        BinderSpec::Source(SourceKind::ClientInfo) => TypeDesc::ClientInfo,
        BinderSpec::Source(SourceKind::ServerInfo) => TypeDesc::ServerInfo,
        _ => TypeDesc::Any,
    }
}

fn bound_binder(
    callable: &str,
    param: &ParameterDescriptor,
    bound: BoundDesc,
    root_optional: bool,
    ctx: &ResolveContext<'_>,
) -> Result<Binder, NormalizationError> {
    let name = param.name.as_str();
    let source_name = bound.name.clone().unwrap_or_else(|| name.to_string());

    let inner = *bound.inner;
    let annotation = inner.to_string();
    let (target, inner_optional) = unwrap_optional(inner);
    if matches!(target, TypeDesc::Union(_)) {
        return Err(NormalizationError::UnsupportedUnion {
            callable: callable.to_string(),
            parameter: name.to_string(),
            annotation,
        });
    }

    let Some(spec) = ctx.registry.bound_kind(&bound.kind) else {
        return Err(NormalizationError::NoMatchingBinder {
            callable: callable.to_string(),
            parameter: name.to_string(),
            annotation: bound.kind.wrapper_name().to_string(),
        });
    };

    if bound.kind == BoundKind::Route {
        if let Some(route) = ctx.route {
            if !route.has_param(&source_name) {
                return Err(NormalizationError::RouteBinderMismatch {
                    callable: callable.to_string(),
                    parameter: name.to_string(),
                    route: route.to_string(),
                });
            }
        }
    }

    let binder = if bound.kind == BoundKind::Services {
        let lookup = match &target {
            TypeDesc::Named(key) => ServiceLookup::ByType(*key),
            _ => ServiceLookup::ByName(source_name.clone()),
        };
        let source = BinderSource::Services {
            lookup,
            container: Arc::clone(ctx.services),
        };
        Binder::new(source, name, source_name, target)
    } else {
        from_spec(callable, param, spec, &source_name, target, ctx)?
    };

    Ok(binder
        .with_required(!inner_optional)
        .with_root_required(!root_optional))
}

fn from_spec(
    callable: &str,
    param: &ParameterDescriptor,
    spec: &BinderSpec,
    source_name: &str,
    target: TypeDesc,
    ctx: &ResolveContext<'_>,
) -> Result<Binder, NormalizationError> {
    let factory_error = |reason: String| NormalizationError::BinderFactory {
        callable: callable.to_string(),
        parameter: param.name.clone(),
        reason,
    };

    let source = match spec {
        BinderSpec::Source(kind) => BinderSource::from_kind(*kind).ok_or_else(|| {
            factory_error(format!("source kind {kind:?} cannot be used without a lookup"))
        })?,
        BinderSpec::Factory(factory) => {
            let context = factory_context(callable, param, source_name, &target, ctx);
            BinderSource::Custom(factory.create(&context).map_err(factory_error)?)
        }
        BinderSpec::Service(resolve) => {
            let factory = resolve(ctx.services)
                .ok_or_else(|| factory_error("binder factory is not registered as a service".to_string()))?;
            let context = factory_context(callable, param, source_name, &target, ctx);
            BinderSource::Custom(factory.create(&context).map_err(factory_error)?)
        }
    };

    Ok(Binder::new(source, param.name.clone(), source_name, target))
}

fn factory_context<'a>(
    callable: &'a str,
    param: &'a ParameterDescriptor,
    source_name: &'a str,
    target: &'a TypeDesc,
    ctx: &'a ResolveContext<'_>,
) -> FactoryContext<'a> {
    FactoryContext {
        callable,
        parameter: &param.name,
        source_name,
        target,
        route: ctx.route,
        services: ctx.services.as_ref(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::binder::ValueSource;
    use crate::signature::{inspect, Callable, CallableInfo, ParameterSpec};
    use crate::value::Value;
    use merino_core::{BoxFuture, HandlerResult, IntoResponse, Request};

    struct Described(CallableInfo);

    impl Callable for Described {
        fn info(&self) -> &CallableInfo {
            &self.0
        }

        fn invoke(&self, _args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
            Box::pin(async { Ok(().into_response()) })
        }
    }

    struct Repository;

    fn signature(params: Vec<ParameterSpec>, names: &crate::annotation::TypeNames) -> Signature {
        let callable = Described(CallableInfo {
            name: "endpoint".into(),
            params,
            return_type: None,
            is_async: true,
            type_hints: HashMap::new(),
            stream: None,
        });
        inspect(&callable, names).unwrap()
    }

    fn route(pattern: &str) -> RoutePattern {
        RoutePattern::parse(pattern).unwrap()
    }

    fn resolve(
        params: Vec<ParameterSpec>,
        pattern: Option<&str>,
        services: Container,
    ) -> Result<Vec<Slot>, NormalizationError> {
        let registry = BinderRegistry::default();
        let services = Arc::new(services);
        let pattern = pattern.map(route);
        let ctx = ResolveContext {
            registry: &registry,
            services: &services,
            route: pattern.as_ref(),
        };
        resolve_slots(&signature(params, registry.type_names()), &ctx).map(ResolvedSlots::into_slots)
    }

    fn binders(slots: &[Slot]) -> Vec<&Binder> {
        slots.iter().filter_map(Slot::binder).collect()
    }

    #[test]
    fn test_aliases() {
        let slots = resolve(
            vec![ParameterSpec::untyped("request"), ParameterSpec::untyped("user")],
            Some("/"),
            Container::new(),
        )
        .unwrap();
        let b = binders(&slots);
        assert_eq!(b[0].kind(), SourceKind::Request);
        assert_eq!(b[1].kind(), SourceKind::Identity);
        assert!(b[1].is_required());
    }

    #[test]
    fn test_unannotated_parameters() {
        let mut container = Container::new();
        container.register_named("cache", Arc::new(1_u32));
        let slots = resolve(
            vec![
                ParameterSpec::untyped("id"),
                ParameterSpec::untyped("cache"),
                ParameterSpec::untyped("tag"),
            ],
            Some("/items/{id}"),
            container,
        )
        .unwrap();
        let b = binders(&slots);

        assert_eq!(b[0].kind(), SourceKind::Route);
        assert_eq!(b[0].target(), &TypeDesc::Str);

        assert_eq!(b[1].kind(), SourceKind::Services);

        assert_eq!(b[2].kind(), SourceKind::Query);
        assert_eq!(b[2].target(), &TypeDesc::list(TypeDesc::Str));
        assert!(!b[2].is_required());
        assert!(b[2].implicit());
    }

    #[test]
    fn test_optional_and_default() {
        let slots = resolve(
            vec![
                ParameterSpec::annotated("q", "str | None"),
                ParameterSpec::annotated("page", "int").with_default(1),
                ParameterSpec::annotated("limit", "int"),
            ],
            Some("/"),
            Container::new(),
        )
        .unwrap();
        let b = binders(&slots);
        assert!(!b[0].is_required());
        assert_eq!(b[0].target(), &TypeDesc::Str);
        assert!(!b[1].is_required());
        assert_eq!(b[1].default(), Some(&Value::Int(1)));
        assert!(b[2].is_required());
    }

    #[test]
    fn test_wide_union_fails_fast() {
        let err = resolve(vec![ParameterSpec::annotated("x", "int | str")], Some("/"), Container::new())
            .unwrap_err();
        assert!(matches!(err, NormalizationError::UnsupportedUnion { .. }));

        let err = resolve(
            vec![ParameterSpec::annotated("x", "int | str | None")],
            Some("/"),
            Container::new(),
        )
        .unwrap_err();
        assert!(matches!(err, NormalizationError::UnsupportedUnion { .. }));
    }

    #[test]
    fn test_nested_optionals_flatten() {
        let slots = resolve(
            vec![
                ParameterSpec::annotated("a", "Optional[Optional[int]]"),
                ParameterSpec::annotated("b", "Optional[int | None]"),
                ParameterSpec::annotated("c", "Union[int | None, None]"),
                ParameterSpec::annotated("d", "FromQuery[Optional[int | None]]"),
            ],
            Some("/"),
            Container::new(),
        )
        .unwrap();
        let b = binders(&slots);
        for binder in &b[..3] {
            assert_eq!(binder.kind(), SourceKind::Query);
            assert_eq!(binder.target(), &TypeDesc::Int);
            assert!(!binder.is_required());
        }
        assert_eq!(b[3].target(), &TypeDesc::Int);
        assert!(!b[3].required());

        let err = resolve(
            vec![ParameterSpec::annotated("x", "Optional[int | str]")],
            Some("/"),
            Container::new(),
        )
        .unwrap_err();
        assert!(matches!(err, NormalizationError::UnsupportedUnion { .. }));
    }

    #[test]
    fn test_type_handlers() {
        let slots = resolve(
            vec![
                ParameterSpec::typed("req", TypeDesc::Request),
                ParameterSpec::typed("client", TypeDesc::ClientInfo),
            ],
            Some("/"),
            Container::new(),
        )
        .unwrap();
        let b = binders(&slots);
        assert_eq!(b[0].kind(), SourceKind::Request);
        assert_eq!(b[1].kind(), SourceKind::ClientInfo);
    }

    #[test]
    fn test_bound_wrappers() {
        let slots = resolve(
            vec![
                ParameterSpec::annotated("x_token", "Optional[FromHeader[str]]"),
                ParameterSpec::annotated("tags", "FromQuery[list[int] | None]"),
                ParameterSpec::annotated("payload", "FromJSON[dict]"),
            ],
            Some("/"),
            Container::new(),
        )
        .unwrap();
        let b = binders(&slots);

        assert_eq!(b[0].kind(), SourceKind::Header);
        assert!(b[0].required());
        assert!(!b[0].root_required());
        assert!(!b[0].implicit());

        assert_eq!(b[1].kind(), SourceKind::Query);
        assert!(!b[1].required());
        assert_eq!(b[1].target(), &TypeDesc::list(TypeDesc::Int));

        assert_eq!(b[2].kind(), SourceKind::Json);
        assert!(b[2].is_body());
    }

    #[test]
    fn test_route_binder_mismatch() {
        let err = resolve(
            vec![ParameterSpec::annotated("item_id", "FromRoute[int]")],
            Some("/items/{id}"),
            Container::new(),
        )
        .unwrap_err();
        assert!(matches!(err, NormalizationError::RouteBinderMismatch { .. }));
    }

    #[test]
    fn test_route_name_and_simple_types() {
        let slots = resolve(
            vec![
                ParameterSpec::annotated("item_id", "int"),
                ParameterSpec::annotated("q", "str"),
            ],
            Some("/items/{item_id}"),
            Container::new(),
        )
        .unwrap();
        let b = binders(&slots);
        assert_eq!(b[0].kind(), SourceKind::Route);
        assert_eq!(b[0].target(), &TypeDesc::Int);
        assert_eq!(b[1].kind(), SourceKind::Query);
    }

    #[test]
    fn test_service_types() {
        let mut container = Container::new();
        container.register(Arc::new(Repository));
        let slots = resolve(
            vec![ParameterSpec::typed("repo", TypeDesc::named::<Repository>())],
            Some("/"),
            container,
        )
        .unwrap();
        let b = binders(&slots);
        assert_eq!(b[0].kind(), SourceKind::Services);
        assert_eq!(b[0].source_name(), "Repository");
    }

    #[test]
    fn test_unregistered_type_has_no_binder() {
        let err = resolve(
            vec![ParameterSpec::typed("repo", TypeDesc::named::<Repository>())],
            Some("/"),
            Container::new(),
        )
        .unwrap_err();
        assert!(matches!(err, NormalizationError::NoMatchingBinder { .. }));
    }

    #[test]
    fn test_identity_types() {
        let slots = resolve(
            vec![ParameterSpec::annotated("caller", "Optional[User]")],
            Some("/"),
            Container::new(),
        )
        .unwrap();
        let b = binders(&slots);
        assert_eq!(b[0].kind(), SourceKind::Identity);
        assert!(!b[0].is_required());
    }

    #[test]
    fn test_two_body_parameters_are_ambiguous() {
        let err = resolve(
            vec![
                ParameterSpec::annotated("a", "FromJSON[dict]"),
                ParameterSpec::annotated("b", "FromText[str]"),
            ],
            Some("/"),
            Container::new(),
        )
        .unwrap_err();
        match err {
            NormalizationError::AmbiguousSignature { first, second, .. } => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_body_claim_is_recorded() {
        let registry = BinderRegistry::default();
        let services = Arc::new(Container::new());
        let pattern = route("/items/{id}");
        let ctx = ResolveContext::for_route(&registry, &services, &pattern);

        let sig = signature(
            vec![
                ParameterSpec::untyped("id"),
                ParameterSpec::annotated("payload", "FromJSON[dict]"),
            ],
            registry.type_names(),
        );
        let resolved = resolve_slots(&sig, &ctx).unwrap();
        assert!(resolved.body_claimed());
        assert_eq!(resolved.body_param(), Some("payload"));
        assert_eq!(resolved.slots().len(), 2);

        let sig = signature(vec![ParameterSpec::untyped("id")], registry.type_names());
        let resolved = resolve_slots(&sig, &ctx).unwrap();
        assert!(!resolved.body_claimed());
        assert_eq!(resolved.body_param(), None);
    }

    #[test]
    fn test_next_sentinel_only_without_route() {
        let params = || {
            vec![
                ParameterSpec::untyped("request"),
                ParameterSpec::untyped("next_handler"),
            ]
        };
        let slots = resolve(params(), None, Container::new()).unwrap();
        assert!(slots[1].is_next());

        let slots = resolve(params(), Some("/"), Container::new()).unwrap();
        assert!(!slots[1].is_next());

        let err = resolve(vec![ParameterSpec::typed("chain", TypeDesc::Next)], Some("/"), Container::new())
            .unwrap_err();
        assert!(matches!(err, NormalizationError::NoMatchingBinder { .. }));
    }

    struct Tenant;

    #[async_trait::async_trait]
    impl ValueSource for Tenant {
        async fn get_value(&self, request: &Request) -> Result<Option<Value>, crate::BindError> {
            Ok(request.header("x-tenant").map(Value::from))
        }
    }

    #[test]
    fn test_service_factory_builds_fresh_sources() {
        struct TenantFactory;

        impl crate::BinderFactory for TenantFactory {
            fn create(&self, context: &FactoryContext<'_>) -> Result<Arc<dyn ValueSource>, String> {
                if context.source_name.is_empty() {
                    return Err("empty name".into());
                }
                Ok(Arc::new(Tenant))
            }
        }

        let mut registry = BinderRegistry::default();
        registry.bind_service_factory::<TenantFactory>("FromTenant");

        let mut container = Container::new();
        container.register(Arc::new(TenantFactory));
        let services = Arc::new(container);
        let pattern = route("/");
        let ctx = ResolveContext::for_route(&registry, &services, &pattern);

        let sig = signature(
            vec![
                ParameterSpec::annotated("a", "FromTenant[str]"),
                ParameterSpec::annotated("b", "FromTenant[str]"),
            ],
            registry.type_names(),
        );
        let resolved = resolve_slots(&sig, &ctx).unwrap();
        assert!(!resolved.body_claimed());
        let b = binders(resolved.slots());
        let (BinderSource::Custom(first), BinderSource::Custom(second)) = (b[0].source(), b[1].source()) else {
            panic!("expected custom sources");
        };
        assert!(!Arc::ptr_eq(first, second));

        let empty = Arc::new(Container::new());
        let ctx = ResolveContext::for_route(&registry, &empty, &pattern);
        let err = resolve_slots(&sig, &ctx).unwrap_err();
        assert!(matches!(err, NormalizationError::BinderFactory { .. }));
    }
}

//! Binders.
//!
//! A [`Binder`] knows how to produce the value of one handler parameter
//! from a request. Binders are built once per route when the application
//! starts and never change afterwards; every setting is fixed at
//! construction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use merino_core::di::{Container, ServiceRef};
use merino_core::{ClientInfo, Request, ServerInfo, User, WebSocket};
use merino_router::RoutePattern;

use crate::error::{BindError, BindSource};
use crate::sources::{self, DEFAULT_MAX_BODY_SIZE};
use crate::types::{TypeDesc, TypeKey};
use crate::value::Value;

/// An application-defined value source.
///
/// Custom sources are produced by a [`BinderFactory`] for one parameter of
/// one route.
#[async_trait]
pub trait ValueSource: Send + Sync + 'static {
    /// Returns true if this source consumes the request body.
    fn is_body(&self) -> bool {
        false
    }

    /// Reads the value; `Ok(None)` means the value is absent.
    async fn get_value(&self, request: &Request) -> Result<Option<Value>, BindError>;
}

/// Everything a factory may look at when building a source.
#[derive(Debug, Clone, Copy)]
pub struct FactoryContext<'a> {
    /// The callable being normalized.
    pub callable: &'a str,
    /// The parameter name.
    pub parameter: &'a str,
    /// The lookup key: the wrapper's name override or the parameter name.
    pub source_name: &'a str,
    /// The declared inner type.
    pub target: &'a TypeDesc,
    /// The route the callable serves, if any.
    pub route: Option<&'a RoutePattern>,
    /// The service container.
    pub services: &'a Container,
}

/// Builds a fresh [`ValueSource`] for a parameter.
pub trait BinderFactory: Send + Sync + 'static {
    /// Builds the source, or explains why it cannot.
    ///
    /// # Errors
    ///
    /// Returns a reason string that surfaces as a startup error.
    fn create(&self, context: &FactoryContext<'_>) -> Result<Arc<dyn ValueSource>, String>;
}

impl<F> BinderFactory for F
where
    F: Fn(&FactoryContext<'_>) -> Result<Arc<dyn ValueSource>, String> + Send + Sync + 'static,
{
    fn create(&self, context: &FactoryContext<'_>) -> Result<Arc<dyn ValueSource>, String> {
        self(context)
    }
}

/// How a service is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceLookup {
    /// By registered type.
    ByType(TypeKey),
    /// By registered name.
    ByName(String),
}

impl fmt::Display for ServiceLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByType(key) => f.write_str(key.short_name()),
            Self::ByName(name) => f.write_str(name),
        }
    }
}

/// The kind of source a binder reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A route value.
    Route,
    /// A query parameter.
    Query,
    /// A header.
    Header,
    /// A cookie.
    Cookie,
    /// The JSON body.
    Json,
    /// The form body.
    Form,
    /// The text body.
    Text,
    /// The raw body.
    Bytes,
    /// Files of a multipart body.
    Files,
    /// A service.
    Services,
    /// The caller identity.
    Identity,
    /// The request.
    Request,
    /// The WebSocket connection.
    WebSocket,
    /// The remote peer address.
    ClientInfo,
    /// The local server address.
    ServerInfo,
    /// An application-defined source.
    Custom,
}

impl SourceKind {
    /// Returns true for kinds that consume the request body.
    #[must_use]
    pub fn is_body(self) -> bool {
        matches!(self, Self::Json | Self::Form | Self::Text | Self::Bytes | Self::Files)
    }
}

/// Where a binder reads its value from.
#[derive(Clone)]
pub enum BinderSource {
    /// A route value.
    Route,
    /// A query parameter.
    Query,
    /// A header.
    Header,
    /// A cookie.
    Cookie,
    /// The JSON body.
    Json,
    /// The form body.
    Form,
    /// The text body.
    Text,
    /// The raw body.
    Bytes,
    /// Files of a multipart body.
    Files,
    /// A service resolved from the container.
    Services {
        /// What to look up.
        lookup: ServiceLookup,
        /// Where to look it up.
        container: Arc<Container>,
    },
    /// The caller identity.
    Identity,
    /// The request.
    Request,
    /// The WebSocket connection.
    WebSocket,
    /// The remote peer address.
    ClientInfo,
    /// The local server address.
    ServerInfo,
    /// An application-defined source.
    Custom(Arc<dyn ValueSource>),
}

impl BinderSource {
    /// The source for a plain kind; `None` for kinds that carry data.
    #[must_use]
    pub fn from_kind(kind: SourceKind) -> Option<Self> {
        Some(match kind {
            SourceKind::Route => Self::Route,
            SourceKind::Query => Self::Query,
            SourceKind::Header => Self::Header,
            SourceKind::Cookie => Self::Cookie,
            SourceKind::Json => Self::Json,
            SourceKind::Form => Self::Form,
            SourceKind::Text => Self::Text,
            SourceKind::Bytes => Self::Bytes,
            SourceKind::Files => Self::Files,
            SourceKind::Identity => Self::Identity,
            SourceKind::Request => Self::Request,
            SourceKind::WebSocket => Self::WebSocket,
            SourceKind::ClientInfo => Self::ClientInfo,
            SourceKind::ServerInfo => Self::ServerInfo,
            SourceKind::Services | SourceKind::Custom => return None,
        })
    }

    /// The kind of this source.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Route => SourceKind::Route,
            Self::Query => SourceKind::Query,
            Self::Header => SourceKind::Header,
            Self::Cookie => SourceKind::Cookie,
            Self::Json => SourceKind::Json,
            Self::Form => SourceKind::Form,
            Self::Text => SourceKind::Text,
            Self::Bytes => SourceKind::Bytes,
            Self::Files => SourceKind::Files,
            Self::Services { .. } => SourceKind::Services,
            Self::Identity => SourceKind::Identity,
            Self::Request => SourceKind::Request,
            Self::WebSocket => SourceKind::WebSocket,
            Self::ClientInfo => SourceKind::ClientInfo,
            Self::ServerInfo => SourceKind::ServerInfo,
            Self::Custom(_) => SourceKind::Custom,
        }
    }

    fn bind_source(&self) -> BindSource {
        match self {
            Self::Route => BindSource::Route,
            Self::Query => BindSource::Query,
            Self::Header => BindSource::Header,
            Self::Cookie => BindSource::Cookie,
            Self::Json | Self::Form | Self::Text | Self::Bytes | Self::Files => BindSource::Body,
            Self::Services { .. } => BindSource::Services,
            Self::Identity => BindSource::Identity,
            Self::Request | Self::WebSocket | Self::ClientInfo | Self::ServerInfo | Self::Custom(_) => {
                BindSource::Custom
            }
        }
    }
}

impl fmt::Debug for BinderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Services { lookup, .. } => f.debug_struct("Services").field("lookup", lookup).finish(),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

/// Produces the value of one handler parameter.
///
/// A binder is *required* when the parameter has no default and its
/// declared type is not optional. For bound wrappers, `root_required`
/// records whether the wrapper itself was declared optional; a value is
/// demanded only when both flags hold.
#[derive(Debug, Clone)]
pub struct Binder {
    source: BinderSource,
    parameter: String,
    source_name: String,
    target: TypeDesc,
    required: bool,
    root_required: bool,
    implicit: bool,
    default: Option<Value>,
    max_body_size: usize,
}

impl Binder {
    /// Creates a required, explicit binder without default.
    #[must_use]
    pub fn new(
        source: BinderSource,
        parameter: impl Into<String>,
        source_name: impl Into<String>,
        target: TypeDesc,
    ) -> Self {
        Self {
            source,
            parameter: parameter.into(),
            source_name: source_name.into(),
            target,
            required: true,
            root_required: true,
            implicit: false,
            default: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Sets whether the inner value is required.
    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets whether the wrapper itself is required.
    #[must_use]
    pub fn with_root_required(mut self, root_required: bool) -> Self {
        self.root_required = root_required;
        self
    }

    /// Marks the binder as chosen by convention rather than declared.
    #[must_use]
    pub fn with_implicit(mut self, implicit: bool) -> Self {
        self.implicit = implicit;
        self
    }

    /// Attaches a default value; a binder with a default is never required.
    #[must_use]
    pub fn with_default(mut self, default: Option<Value>) -> Self {
        if default.is_some() {
            self.required = false;
        }
        self.default = default;
        self
    }

    /// Sets the body size limit.
    #[must_use]
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    /// The source.
    #[must_use]
    pub fn source(&self) -> &BinderSource {
        &self.source
    }

    /// The source kind.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// The parameter name.
    #[must_use]
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// The lookup key in the source.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The type values are converted to.
    #[must_use]
    pub fn target(&self) -> &TypeDesc {
        &self.target
    }

    /// Whether the inner value is required.
    #[must_use]
    pub fn required(&self) -> bool {
        self.required
    }

    /// Whether the wrapper itself is required.
    #[must_use]
    pub fn root_required(&self) -> bool {
        self.root_required
    }

    /// Whether a missing value is an error.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required && self.root_required
    }

    /// Whether the binder was chosen by convention.
    #[must_use]
    pub fn implicit(&self) -> bool {
        self.implicit
    }

    /// The default value.
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns true if the binder consumes the request body.
    #[must_use]
    pub fn is_body(&self) -> bool {
        match &self.source {
            BinderSource::Custom(source) => source.is_body(),
            other => other.kind().is_body(),
        }
    }

    /// Produces the parameter value.
    ///
    /// An absent value falls back to the default, then to an error when
    /// required, then to [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] when the value is invalid, or absent and
    /// required.
    pub async fn get_parameter(&self, request: &Request) -> Result<Value, BindError> {
        match self.get_value(request).await? {
            Some(value) => Ok(value),
            None => match &self.default {
                Some(default) => Ok(default.clone()),
                None if self.is_required() => Err(self.missing()),
                None => Ok(Value::Null),
            },
        }
    }

    fn missing(&self) -> BindError {
        match &self.source {
            BinderSource::Identity => BindError::unauthenticated(&self.parameter),
            BinderSource::Services { lookup, .. } => {
                BindError::service_unavailable(&self.parameter, &lookup.to_string())
            }
            other => BindError::missing(other.bind_source(), &self.parameter),
        }
    }

    fn convert(&self, raw: Option<Vec<String>>) -> Result<Option<Value>, BindError> {
        raw.map(|raw| sources::convert(raw, &self.target, self.source.bind_source(), &self.parameter))
            .transpose()
    }

    fn convert_json(&self, json: Option<serde_json::Value>) -> Result<Option<Value>, BindError> {
        json.map(|json| sources::convert_json(json, &self.target, &self.parameter))
            .transpose()
    }

    /// Reads the raw value; `Ok(None)` means absent.
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] when the value cannot be read or converted.
    pub async fn get_value(&self, request: &Request) -> Result<Option<Value>, BindError> {
        let name = self.source_name.as_str();
        let limit = self.max_body_size;
        match &self.source {
            BinderSource::Route => self.convert(request.route_values().get(name).map(|v| vec![v.to_string()])),
            BinderSource::Query => self.convert(sources::query_values(request, name)),
            BinderSource::Header => self.convert(sources::header_values(request, name)),
            BinderSource::Cookie => self.convert(sources::cookie_value(request, name).map(|v| vec![v])),
            BinderSource::Json => self.convert_json(sources::read_json(request, &self.parameter, limit)?),
            BinderSource::Form => {
                self.convert_json(sources::read_form(request, &self.parameter, limit).await?)
            }
            BinderSource::Text => {
                Ok(sources::read_text(request, &self.parameter, limit)?.map(Value::Str))
            }
            BinderSource::Bytes => Ok(sources::read_bytes(request, limit)?.map(Value::Bytes)),
            BinderSource::Files => {
                Ok(sources::read_files(request, &self.parameter, limit).await?.map(Value::Files))
            }
            BinderSource::Services { lookup, container } => {
                let service: Option<ServiceRef> = match lookup {
                    ServiceLookup::ByType(key) => container.resolve_type(key.id()),
                    ServiceLookup::ByName(name) => container.resolve_name(name),
                };
                Ok(service.map(Value::Service))
            }
            BinderSource::Identity => {
                let identity = request.identity().cloned();
                Ok(match self.target {
                    TypeDesc::User => identity.and_then(User::authenticated).map(|u| Value::Identity(u.into_identity())),
                    _ => identity.map(Value::Identity),
                })
            }
            BinderSource::Request => Ok(Some(Value::Request(request.clone()))),
            BinderSource::WebSocket => Ok(Some(Value::WebSocket(WebSocket::new(request.clone())))),
            BinderSource::ClientInfo => Ok(request.client_addr().map(|a| Value::ClientInfo(ClientInfo::from(a)))),
            BinderSource::ServerInfo => Ok(request.server_addr().map(|a| Value::ServerInfo(ServerInfo::from(a)))),
            BinderSource::Custom(source) => source.get_value(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merino_core::{Identity, Params};

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).build().unwrap()
    }

    #[tokio::test]
    async fn test_route_binder_converts() {
        let mut req = request("/items/42");
        req.set_route_values([("item_id".to_string(), "42".to_string())].into_iter().collect::<Params>());

        let binder = Binder::new(BinderSource::Route, "item_id", "item_id", TypeDesc::Int);
        assert_eq!(binder.get_parameter(&req).await.unwrap(), Value::Int(42));
    }

    #[tokio::test]
    async fn test_missing_required_and_optional() {
        let req = request("/search");
        let required = Binder::new(BinderSource::Query, "q", "q", TypeDesc::Str);
        let err = required.get_parameter(&req).await.unwrap_err();
        assert_eq!(err.field(), Some("q"));
        assert_eq!(err.source(), BindSource::Query);

        let optional = required.clone().with_required(false);
        assert_eq!(optional.get_parameter(&req).await.unwrap(), Value::Null);

        let defaulted = Binder::new(BinderSource::Query, "q", "q", TypeDesc::Str).with_default(Some("all".into()));
        assert!(!defaulted.required());
        assert_eq!(defaulted.get_parameter(&req).await.unwrap(), Value::from("all"));
    }

    #[tokio::test]
    async fn test_optional_wrapper_is_not_required() {
        let req = request("/");
        let binder = Binder::new(BinderSource::Header, "x_token", "x_token", TypeDesc::Str)
            .with_root_required(false);
        assert!(binder.required());
        assert!(!binder.is_required());
        assert_eq!(binder.get_parameter(&req).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_identity_binder() {
        let anonymous = Request::builder().uri("/").identity(Identity::anonymous()).build().unwrap();
        let user = Binder::new(BinderSource::Identity, "user", "user", TypeDesc::User);
        let err = user.get_parameter(&anonymous).await.unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::UNAUTHORIZED);

        let identity = Binder::new(BinderSource::Identity, "identity", "identity", TypeDesc::Identity);
        assert!(matches!(identity.get_parameter(&anonymous).await.unwrap(), Value::Identity(_)));

        let authenticated = Request::builder()
            .uri("/")
            .identity(Identity::from_claims(serde_json::json!({"sub": "u1"}), "Bearer"))
            .build()
            .unwrap();
        assert!(matches!(user.get_parameter(&authenticated).await.unwrap(), Value::Identity(_)));
    }

    #[tokio::test]
    async fn test_service_binder() {
        struct Repo;
        let mut container = Container::new();
        container.register(Arc::new(Repo));
        let container = Arc::new(container);

        let found = Binder::new(
            BinderSource::Services {
                lookup: ServiceLookup::ByType(TypeKey::of::<Repo>()),
                container: Arc::clone(&container),
            },
            "repo",
            "Repo",
            TypeDesc::named::<Repo>(),
        );
        assert!(matches!(found.get_parameter(&request("/")).await.unwrap(), Value::Service(_)));

        let missing = Binder::new(
            BinderSource::Services {
                lookup: ServiceLookup::ByName("cache".into()),
                container,
            },
            "cache",
            "cache",
            TypeDesc::Any,
        );
        let err = missing.get_parameter(&request("/")).await.unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_custom_source() {
        struct Fixed;

        #[async_trait]
        impl ValueSource for Fixed {
            fn is_body(&self) -> bool {
                true
            }

            async fn get_value(&self, _request: &Request) -> Result<Option<Value>, BindError> {
                Ok(Some(Value::Int(7)))
            }
        }

        let binder = Binder::new(BinderSource::Custom(Arc::new(Fixed)), "x", "x", TypeDesc::Int);
        assert!(binder.is_body());
        assert_eq!(binder.kind(), SourceKind::Custom);
        assert_eq!(binder.get_parameter(&request("/")).await.unwrap(), Value::Int(7));
    }
}

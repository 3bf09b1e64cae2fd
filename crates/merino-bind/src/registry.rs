//! The binder registry.
//!
//! [`BinderRegistry`] is plain configuration: which parameter names are
//! aliases, which exact types have dedicated binders, which types count as
//! simple, and how each bound-value wrapper kind is served. Resolution reads
//! it and never writes to it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use merino_core::di::Container;

use crate::annotation::TypeNames;
use crate::binder::{BinderFactory, SourceKind};
use crate::sources::DEFAULT_MAX_BODY_SIZE;
use crate::types::{BoundKind, TypeDesc};

/// Looks up a binder factory registered as a service.
pub type ServiceFactory = fn(&Container) -> Option<Arc<dyn BinderFactory>>;

/// How a registry entry produces a binder.
#[derive(Clone)]
pub enum BinderSpec {
    /// A built-in source.
    Source(SourceKind),
    /// A factory owned by the registry.
    Factory(Arc<dyn BinderFactory>),
    /// A factory resolved from the service container at resolution time.
    Service(ServiceFactory),
}

impl fmt::Debug for BinderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(kind) => f.debug_tuple("Source").field(kind).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Service(_) => f.write_str("Service(..)"),
        }
    }
}

fn resolve_factory<F: BinderFactory>(container: &Container) -> Option<Arc<dyn BinderFactory>> {
    container.resolve::<F>().map(|factory| factory as Arc<dyn BinderFactory>)
}

/// Configuration for binder resolution.
///
/// # Example
///
/// ```rust
/// use merino_bind::{BinderRegistry, SourceKind, TypeDesc};
///
/// let mut registry = BinderRegistry::default();
/// registry.add_alias("ctx", merino_bind::BinderSpec::Source(SourceKind::Request));
/// assert!(registry.alias("ctx").is_some());
/// assert!(registry.is_simple(&TypeDesc::list(TypeDesc::Int)));
/// ```
#[derive(Debug, Clone)]
pub struct BinderRegistry {
    aliases: IndexMap<String, BinderSpec>,
    type_handlers: HashMap<TypeDesc, BinderSpec>,
    simple_types: IndexSet<TypeDesc>,
    bound_kinds: HashMap<BoundKind, BinderSpec>,
    type_names: TypeNames,
    max_body_size: usize,
}

impl BinderRegistry {
    /// An empty registry with no built-ins.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            aliases: IndexMap::new(),
            type_handlers: HashMap::new(),
            simple_types: IndexSet::new(),
            bound_kinds: HashMap::new(),
            type_names: TypeNames::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Registers a parameter name alias.
    pub fn add_alias(&mut self, name: impl Into<String>, spec: BinderSpec) {
        self.aliases.insert(name.into(), spec);
    }

    /// Registers a binder for an exact declared type.
    pub fn add_type_handler(&mut self, desc: TypeDesc, spec: BinderSpec) {
        self.type_handlers.insert(desc, spec);
    }

    /// Marks a type as simple, i.e. bound from the query string by default.
    pub fn add_simple_type(&mut self, desc: TypeDesc) {
        self.simple_types.insert(desc);
    }

    /// Registers how a wrapper kind is served.
    pub fn add_bound_kind(&mut self, kind: BoundKind, spec: BinderSpec) {
        self.bound_kinds.insert(kind, spec);
    }

    /// Registers a custom wrapper kind served by a factory.
    ///
    /// The wrapper name becomes usable in annotation text.
    pub fn add_binder_factory(&mut self, kind: &'static str, factory: impl BinderFactory) {
        self.type_names.insert_wrapper(kind, BoundKind::Custom(kind));
        self.bound_kinds
            .insert(BoundKind::Custom(kind), BinderSpec::Factory(Arc::new(factory)));
    }

    /// Registers a custom wrapper kind whose factory is a service of type `F`.
    ///
    /// Each resolution fetches the factory from the container and asks it
    /// for a fresh source.
    pub fn bind_service_factory<F: BinderFactory>(&mut self, kind: &'static str) {
        self.type_names.insert_wrapper(kind, BoundKind::Custom(kind));
        self.bound_kinds
            .insert(BoundKind::Custom(kind), BinderSpec::Service(resolve_factory::<F>));
    }

    /// Registers a type name for annotation text.
    pub fn register_type_name(&mut self, name: impl Into<String>, desc: TypeDesc) {
        self.type_names.insert(name, desc);
    }

    /// Sets the body size limit.
    pub fn set_max_body_size(&mut self, limit: usize) {
        self.max_body_size = limit;
    }

    /// Looks up an alias.
    #[must_use]
    pub fn alias(&self, name: &str) -> Option<&BinderSpec> {
        self.aliases.get(name)
    }

    /// Looks up an exact type handler.
    #[must_use]
    pub fn type_handler(&self, desc: &TypeDesc) -> Option<&BinderSpec> {
        self.type_handlers.get(desc)
    }

    /// Looks up a wrapper kind.
    #[must_use]
    pub fn bound_kind(&self, kind: &BoundKind) -> Option<&BinderSpec> {
        self.bound_kinds.get(kind)
    }

    /// Returns true for simple types and lists or sets of them.
    #[must_use]
    pub fn is_simple(&self, desc: &TypeDesc) -> bool {
        match desc {
            TypeDesc::List(inner) | TypeDesc::Set(inner) => self.simple_types.contains(inner.as_ref()),
            other => self.simple_types.contains(other),
        }
    }

    /// Names known to the annotation parser.
    #[must_use]
    pub fn type_names(&self) -> &TypeNames {
        &self.type_names
    }

    /// The body size limit.
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

impl Default for BinderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.add_alias("request", BinderSpec::Source(SourceKind::Request));
        registry.add_alias("websocket", BinderSpec::Source(SourceKind::WebSocket));
        registry.add_alias("user", BinderSpec::Source(SourceKind::Identity));
        registry.add_alias("identity", BinderSpec::Source(SourceKind::Identity));

        registry.add_type_handler(TypeDesc::Request, BinderSpec::Source(SourceKind::Request));
        registry.add_type_handler(TypeDesc::WebSocket, BinderSpec::Source(SourceKind::WebSocket));
        registry.add_type_handler(TypeDesc::ClientInfo, BinderSpec::Source(SourceKind::ClientInfo));
        registry.add_type_handler(TypeDesc::ServerInfo, BinderSpec::Source(SourceKind::ServerInfo));

        for simple in [
            TypeDesc::Str,
            TypeDesc::Int,
            TypeDesc::Float,
            TypeDesc::Bool,
            TypeDesc::Uuid,
            TypeDesc::Bytes,
        ] {
            registry.add_simple_type(simple);
        }

        for (kind, source) in [
            (BoundKind::Query, SourceKind::Query),
            (BoundKind::Route, SourceKind::Route),
            (BoundKind::Header, SourceKind::Header),
            (BoundKind::Cookie, SourceKind::Cookie),
            (BoundKind::Json, SourceKind::Json),
            (BoundKind::Form, SourceKind::Form),
            (BoundKind::Text, SourceKind::Text),
            (BoundKind::Bytes, SourceKind::Bytes),
            (BoundKind::Files, SourceKind::Files),
            (BoundKind::Services, SourceKind::Services),
        ] {
            registry.add_bound_kind(kind, BinderSpec::Source(source));
        }

        registry
    }
}

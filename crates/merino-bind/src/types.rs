//! Type descriptors.
//!
//! A [`TypeDesc`] is the declared type of a handler parameter as the binding
//! engine sees it. Typed endpoints obtain descriptors from
//! [`Parameter::describe`](crate::Parameter::describe); dynamic endpoints
//! either supply them directly or as annotation text parsed by
//! [`parse_annotation`](crate::parse_annotation).

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a Rust type used as a named descriptor.
///
/// Equality and hashing use the [`TypeId`] only.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key of `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The type id.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The full Rust type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type name without module path or generic arguments.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Where a bound-value wrapper reads its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundKind {
    /// Query string.
    Query,
    /// Route values.
    Route,
    /// Request headers.
    Header,
    /// Request cookies.
    Cookie,
    /// JSON body.
    Json,
    /// URL-encoded or multipart form body.
    Form,
    /// UTF-8 text body.
    Text,
    /// Raw body bytes.
    Bytes,
    /// Files of a multipart body.
    Files,
    /// Service container.
    Services,
    /// A binder kind registered by the application.
    Custom(&'static str),
}

impl BoundKind {
    /// Returns true for kinds that consume the request body.
    #[must_use]
    pub fn is_body(&self) -> bool {
        matches!(
            self,
            Self::Json | Self::Form | Self::Text | Self::Bytes | Self::Files
        )
    }

    /// The wrapper name used in annotations and messages.
    #[must_use]
    pub fn wrapper_name(&self) -> &'static str {
        match self {
            Self::Query => "FromQuery",
            Self::Route => "FromRoute",
            Self::Header => "FromHeader",
            Self::Cookie => "FromCookie",
            Self::Json => "FromJson",
            Self::Form => "FromForm",
            Self::Text => "FromText",
            Self::Bytes => "FromBytes",
            Self::Files => "FromFiles",
            Self::Services => "FromServices",
            Self::Custom(name) => name,
        }
    }
}

/// A bound-value wrapper: an explicit value source plus the inner type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundDesc {
    /// The value source.
    pub kind: BoundKind,
    /// The declared inner type.
    pub inner: Box<TypeDesc>,
    /// Overrides the parameter name as lookup key.
    pub name: Option<String>,
}

/// Declared type of a handler parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// Text.
    Str,
    /// Integer.
    Int,
    /// Floating point number.
    Float,
    /// Boolean.
    Bool,
    /// UUID.
    Uuid,
    /// Raw bytes.
    Bytes,
    /// Any JSON value.
    Any,
    /// The none type, only meaningful as a union member.
    NoneType,
    /// Ordered sequence.
    List(Box<TypeDesc>),
    /// Unordered set.
    Set(Box<TypeDesc>),
    /// A value that may be absent.
    Optional(Box<TypeDesc>),
    /// A union of several types.
    Union(Vec<TypeDesc>),
    /// The request itself.
    Request,
    /// The WebSocket connection.
    WebSocket,
    /// The caller identity, possibly anonymous.
    Identity,
    /// An authenticated caller identity.
    User,
    /// Remote peer address.
    ClientInfo,
    /// Local server address.
    ServerInfo,
    /// The rest of a middleware chain.
    Next,
    /// A bound-value wrapper.
    Bound(BoundDesc),
    /// Any other Rust type, such as a service or a body model.
    Named(TypeKey),
}

impl TypeDesc {
    /// `Optional[inner]`.
    #[must_use]
    pub fn optional(inner: TypeDesc) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// `list[inner]`.
    #[must_use]
    pub fn list(inner: TypeDesc) -> Self {
        Self::List(Box::new(inner))
    }

    /// `set[inner]`.
    #[must_use]
    pub fn set(inner: TypeDesc) -> Self {
        Self::Set(Box::new(inner))
    }

    /// A bound-value wrapper without a name override.
    #[must_use]
    pub fn bound(kind: BoundKind, inner: TypeDesc) -> Self {
        Self::Bound(BoundDesc {
            kind,
            inner: Box::new(inner),
            name: None,
        })
    }

    /// A named Rust type.
    #[must_use]
    pub fn named<T: ?Sized + 'static>() -> Self {
        Self::Named(TypeKey::of::<T>())
    }

    /// Returns true for scalar types convertible from text.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Str | Self::Int | Self::Float | Self::Bool | Self::Uuid
        )
    }

    /// Returns true for `Optional[T]` and `T | None`.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        match self {
            Self::Optional(_) => true,
            Self::Union(members) => members.len() == 2 && members.contains(&Self::NoneType),
            _ => false,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => f.write_str("str"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::Uuid => f.write_str("UUID"),
            Self::Bytes => f.write_str("bytes"),
            Self::Any => f.write_str("Any"),
            Self::NoneType => f.write_str("None"),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Set(inner) => write!(f, "set[{inner}]"),
            Self::Optional(inner) => write!(f, "Optional[{inner}]"),
            Self::Union(members) => {
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            Self::Request => f.write_str("Request"),
            Self::WebSocket => f.write_str("WebSocket"),
            Self::Identity => f.write_str("Identity"),
            Self::User => f.write_str("User"),
            Self::ClientInfo => f.write_str("ClientInfo"),
            Self::ServerInfo => f.write_str("ServerInfo"),
            Self::Next => f.write_str("Next"),
            Self::Bound(bound) => write!(f, "{}[{}]", bound.kind.wrapper_name(), bound.inner),
            Self::Named(key) => f.write_str(key.short_name()),
        }
    }
}

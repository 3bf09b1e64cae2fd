//! Typed parameters.
//!
//! [`Parameter`] connects a Rust argument type to the binding engine: it
//! describes the declared type for resolution and converts the bound
//! [`Value`] back into the Rust type when the handler is invoked.
//!
//! The `From*` wrappers select a source explicitly:
//!
//! ```rust,ignore
//! async fn search(
//!     FromQuery(q): FromQuery<Option<String>>,
//!     FromHeader(tenant): FromHeader<String>,
//!     FromJson(filter): FromJson<Filter>,
//! ) -> Json<Vec<Item>> { ... }
//! ```

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use bytes::Bytes;
use merino_core::di::Inject;
use merino_core::{ClientInfo, Identity, Next, Request, ServerInfo, User, WebSocket};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ConversionError;
use crate::types::{BoundKind, TypeDesc};
use crate::value::{FormPart, Value};

/// A handler argument type.
pub trait Parameter: Sized + Send + 'static {
    /// The declared type; `None` means unannotated.
    fn describe() -> Option<TypeDesc>;

    /// Converts a bound value.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the value has the wrong shape.
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T, ConversionError> {
    Err(ConversionError::new(expected, value.kind_name()))
}

impl Parameter for Value {
    fn describe() -> Option<TypeDesc> {
        None
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl Parameter for String {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::Str)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Str(s) | Value::Json(serde_json::Value::String(s)) => Ok(s),
            Value::Uuid(u) => Ok(u.to_string()),
            Value::List(mut items) if items.len() == 1 => Self::from_value(items.remove(0)),
            other => mismatch("str", &other),
        }
    }
}

macro_rules! impl_integer_parameter {
    ($($ty:ty),*) => {
        $(
            impl Parameter for $ty {
                fn describe() -> Option<TypeDesc> {
                    Some(TypeDesc::Int)
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(i)
                            .map_err(|_| ConversionError::new(stringify!($ty), i.to_string())),
                        other => mismatch(stringify!($ty), &other),
                    }
                }
            }
        )*
    };
}

impl_integer_parameter!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl Parameter for f64 {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::Float)
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => mismatch("float", &other),
        }
    }
}

impl Parameter for f32 {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::Float)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl Parameter for bool {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::Bool)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => mismatch("bool", &other),
        }
    }
}

impl Parameter for Uuid {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::Uuid)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Uuid(u) => Ok(u),
            other => mismatch("UUID", &other),
        }
    }
}

impl Parameter for Bytes {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::Bytes)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Str(s) => Ok(Bytes::from(s)),
            other => mismatch("bytes", &other),
        }
    }
}

impl Parameter for serde_json::Value {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::Any)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(match value {
            Value::Json(json) => json,
            other => other.to_json(),
        })
    }
}

impl<T: Parameter> Parameter for Vec<T> {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::list(T::describe().unwrap_or(TypeDesc::Str)))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            other => T::from_value(other).map(|item| vec![item]),
        }
    }
}

impl<T: Parameter + Eq + Hash> Parameter for HashSet<T> {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::set(T::describe().unwrap_or(TypeDesc::Str)))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Vec::<T>::from_value(value).map(|items| items.into_iter().collect())
    }
}

impl<T: Parameter> Parameter for Option<T> {
    fn describe() -> Option<TypeDesc> {
        T::describe().map(TypeDesc::optional)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! impl_framework_parameter {
    ($($ty:ident => $desc:ident),*) => {
        $(
            impl Parameter for $ty {
                fn describe() -> Option<TypeDesc> {
                    Some(TypeDesc::$desc)
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::$ty(inner) => Ok(inner),
                        other => mismatch(stringify!($ty), &other),
                    }
                }
            }
        )*
    };
}

impl_framework_parameter!(
    Request => Request,
    WebSocket => WebSocket,
    Identity => Identity,
    ClientInfo => ClientInfo,
    ServerInfo => ServerInfo,
    Next => Next
);

impl Parameter for User {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::User)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Identity(identity) => {
                User::authenticated(identity).ok_or_else(|| ConversionError::new("User", "anonymous identity"))
            }
            other => mismatch("User", &other),
        }
    }
}

fn downcast_service<T: Send + Sync + 'static>(value: Value) -> Result<Arc<T>, ConversionError> {
    match value {
        Value::Service(service) => service
            .downcast::<T>()
            .map_err(|_| ConversionError::new(std::any::type_name::<T>(), "service of another type")),
        other => mismatch(std::any::type_name::<T>(), &other),
    }
}

impl<T: Send + Sync + 'static> Parameter for Arc<T> {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::named::<T>())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        downcast_service(value)
    }
}

impl<T: Send + Sync + 'static> Parameter for Inject<T> {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::bound(BoundKind::Services, TypeDesc::named::<T>()))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        downcast_service(value).map(Inject::new)
    }
}

macro_rules! simple_wrapper {
    ($(#[$doc:meta] $name:ident => $kind:ident),*) => {
        $(
            #[$doc]
            #[derive(Debug, Clone, PartialEq)]
            pub struct $name<T>(pub T);

            impl<T> $name<T> {
                /// Unwraps the value.
                pub fn into_inner(self) -> T {
                    self.0
                }
            }

            impl<T> std::ops::Deref for $name<T> {
                type Target = T;

                fn deref(&self) -> &T {
                    &self.0
                }
            }

            impl<T: Parameter> Parameter for $name<T> {
                fn describe() -> Option<TypeDesc> {
                    Some(TypeDesc::bound(
                        BoundKind::$kind,
                        T::describe().unwrap_or(TypeDesc::Str),
                    ))
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    T::from_value(value).map($name)
                }
            }
        )*
    };
}

simple_wrapper!(
    /// A value read from the query string.
    FromQuery => Query,
    /// A value read from the route.
    FromRoute => Route,
    /// A value read from a request header.
    FromHeader => Header,
    /// A value read from a cookie.
    FromCookie => Cookie
);

fn deserialize<T: DeserializeOwned>(value: Value) -> Result<T, ConversionError> {
    let json = match value {
        Value::Json(json) => json,
        other => other.to_json(),
    };
    serde_json::from_value(json).map_err(|e| ConversionError::new(std::any::type_name::<T>(), e.to_string()))
}

/// The declared target of a body wrapper; `Option<T>` marks the body as
/// optional so a request without one binds `None`.
fn body_target<T: 'static>() -> TypeDesc {
    let named = TypeDesc::named::<T>();
    if std::any::type_name::<T>().starts_with("core::option::Option<") {
        TypeDesc::optional(named)
    } else {
        named
    }
}

macro_rules! body_wrapper {
    ($(#[$doc:meta] $name:ident => $kind:ident),*) => {
        $(
            #[$doc]
            #[derive(Debug, Clone, PartialEq)]
            pub struct $name<T>(pub T);

            impl<T> $name<T> {
                /// Unwraps the value.
                pub fn into_inner(self) -> T {
                    self.0
                }
            }

            impl<T> std::ops::Deref for $name<T> {
                type Target = T;

                fn deref(&self) -> &T {
                    &self.0
                }
            }

            impl<T: DeserializeOwned + Send + 'static> Parameter for $name<T> {
                fn describe() -> Option<TypeDesc> {
                    Some(TypeDesc::bound(BoundKind::$kind, body_target::<T>()))
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    deserialize(value).map($name)
                }
            }
        )*
    };
}

body_wrapper!(
    /// A JSON body deserialized into `T`.
    FromJson => Json,
    /// A form body deserialized into `T`.
    FromForm => Form
);

/// A UTF-8 text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromText(pub String);

impl Parameter for FromText {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::bound(BoundKind::Text, TypeDesc::Str))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        String::from_value(value).map(FromText)
    }
}

/// The raw request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromBytes(pub Bytes);

impl Parameter for FromBytes {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::bound(BoundKind::Bytes, TypeDesc::Bytes))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Bytes::from_value(value).map(FromBytes)
    }
}

/// Files uploaded in a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromFiles(pub Vec<FormPart>);

impl Parameter for FromFiles {
    fn describe() -> Option<TypeDesc> {
        Some(TypeDesc::bound(BoundKind::Files, TypeDesc::list(TypeDesc::Bytes)))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Files(files) => Ok(FromFiles(files)),
            Value::Null => Ok(FromFiles(Vec::new())),
            other => mismatch("files", &other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merino_core::di::ServiceRef;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Filter {
        name: String,
        limit: Option<u32>,
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(String::describe(), Some(TypeDesc::Str));
        assert_eq!(Option::<i64>::describe(), Some(TypeDesc::optional(TypeDesc::Int)));
        assert_eq!(Vec::<Uuid>::describe(), Some(TypeDesc::list(TypeDesc::Uuid)));
        assert_eq!(Value::describe(), None);
        assert_eq!(Option::<Value>::describe(), None);
        assert_eq!(
            FromHeader::<Option<String>>::describe(),
            Some(TypeDesc::bound(BoundKind::Header, TypeDesc::optional(TypeDesc::Str)))
        );
        assert_eq!(
            FromJson::<Filter>::describe(),
            Some(TypeDesc::bound(BoundKind::Json, TypeDesc::named::<Filter>()))
        );
    }

    #[test]
    fn test_optional_body_targets() {
        assert_eq!(
            FromJson::<Option<Filter>>::describe(),
            Some(TypeDesc::bound(
                BoundKind::Json,
                TypeDesc::optional(TypeDesc::named::<Option<Filter>>())
            ))
        );
        assert_eq!(
            FromForm::<Option<Filter>>::describe(),
            Some(TypeDesc::bound(
                BoundKind::Form,
                TypeDesc::optional(TypeDesc::named::<Option<Filter>>())
            ))
        );
        let FromJson(filter) = FromJson::<Option<Filter>>::from_value(Value::Null).unwrap();
        assert_eq!(filter, None);
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(u8::from_value(Value::Int(200)).unwrap(), 200);
        assert!(u8::from_value(Value::Int(300)).is_err());
        assert!(i32::from_value(Value::Str("1".into())).is_err());
        assert!((f64::from_value(Value::Int(2)).unwrap() - 2.0).abs() < f64::EPSILON);
        assert_eq!(Option::<bool>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Vec::<i64>::from_value(Value::List(vec![Value::Int(1), Value::Int(2)])).unwrap(),
            vec![1, 2]
        );
        let set = HashSet::<String>::from_value(Value::List(vec!["a".into(), "a".into()])).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_json_wrapper_deserializes() {
        let value = Value::Json(serde_json::json!({"name": "ada", "limit": 5}));
        let FromJson(filter) = FromJson::<Filter>::from_value(value).unwrap();
        assert_eq!(
            filter,
            Filter {
                name: "ada".into(),
                limit: Some(5)
            }
        );
        assert!(FromJson::<Filter>::from_value(Value::Json(serde_json::json!({}))).is_err());
    }

    #[test]
    fn test_service_downcast() {
        struct Repo(u8);
        let service: ServiceRef = Arc::new(Repo(3));
        let repo = Arc::<Repo>::from_value(Value::Service(Arc::clone(&service))).unwrap();
        assert_eq!(repo.0, 3);
        let injected = Inject::<Repo>::from_value(Value::Service(service)).unwrap();
        assert_eq!(injected.0 .0, 3);
        assert!(Arc::<String>::from_value(Value::Service(Arc::new(1_u8))).is_err());
    }

    #[test]
    fn test_user_requires_authentication() {
        assert!(User::from_value(Value::Identity(Identity::anonymous())).is_err());
        let identity = Identity::from_claims(serde_json::json!({"sub": "1"}), "Bearer");
        assert!(User::from_value(Value::Identity(identity)).is_ok());
    }
}

//! Dynamically typed parameter values.
//!
//! Binders produce [`Value`]s and endpoints consume them positionally. Typed
//! endpoints convert each value back into the declared Rust type through
//! [`Parameter::from_value`](crate::Parameter::from_value).

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use merino_core::di::ServiceRef;
use merino_core::{ClientInfo, Identity, Next, Request, ServerInfo, WebSocket};
use uuid::Uuid;

/// A part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// Field name.
    pub name: String,
    /// Original file name, for file parts.
    pub file_name: Option<String>,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Part contents.
    pub data: Bytes,
}

impl FormPart {
    /// Contents as UTF-8 text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// A bound parameter value.
#[derive(Clone)]
pub enum Value {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Str(String),
    /// UUID.
    Uuid(Uuid),
    /// Sequence of values.
    List(Vec<Value>),
    /// Parsed JSON document.
    Json(serde_json::Value),
    /// Raw bytes.
    Bytes(Bytes),
    /// Uploaded files.
    Files(Vec<FormPart>),
    /// The request.
    Request(Request),
    /// The WebSocket connection.
    WebSocket(WebSocket),
    /// The caller identity.
    Identity(Identity),
    /// Remote peer address.
    ClientInfo(ClientInfo),
    /// Local server address.
    ServerInfo(ServerInfo),
    /// A service instance.
    Service(ServiceRef),
    /// The rest of a middleware chain.
    Next(Next),
}

impl Value {
    /// Short name of the variant, for messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Uuid(_) => "uuid",
            Self::List(_) => "list",
            Self::Json(_) => "json",
            Self::Bytes(_) => "bytes",
            Self::Files(_) => "files",
            Self::Request(_) => "request",
            Self::WebSocket(_) => "websocket",
            Self::Identity(_) => "identity",
            Self::ClientInfo(_) => "client_info",
            Self::ServerInfo(_) => "server_info",
            Self::Service(_) => "service",
            Self::Next(_) => "next",
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The text of a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer of a [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Converts plain data into JSON; opaque values become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Self::Bool(b) => J::Bool(*b),
            Self::Int(i) => J::from(*i),
            Self::Float(f) => J::from(*f),
            Self::Str(s) => J::String(s.clone()),
            Self::Uuid(u) => J::String(u.to_string()),
            Self::List(items) => J::Array(items.iter().map(Value::to_json).collect()),
            Self::Json(json) => json.clone(),
            _ => J::Null,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Uuid(u) => f.debug_tuple("Uuid").field(u).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Json(json) => f.debug_tuple("Json").field(json).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Files(files) => f.debug_tuple("Files").field(&files.len()).finish(),
            Self::Request(r) => f.debug_tuple("Request").field(&r.path()).finish(),
            Self::WebSocket(ws) => f.debug_tuple("WebSocket").field(&ws.path()).finish(),
            Self::Identity(i) => f.debug_tuple("Identity").field(&i.log_id()).finish(),
            Self::ClientInfo(c) => f.debug_tuple("ClientInfo").field(c).finish(),
            Self::ServerInfo(s) => f.debug_tuple("ServerInfo").field(s).finish(),
            Self::Service(_) => f.write_str("Service(..)"),
            Self::Next(_) => f.write_str("Next(..)"),
        }
    }
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Files(a), Self::Files(b)) => a == b,
            (Self::Identity(a), Self::Identity(b)) => a == b,
            (Self::ClientInfo(a), Self::ClientInfo(b)) => a == b,
            (Self::ServerInfo(a), Self::ServerInfo(b)) => a == b,
            (Self::Service(a), Self::Service(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(Value::from("x"), Value::Str("x".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_to_json() {
        let value = Value::List(vec![Value::Int(1), Value::Str("two".into())]);
        assert_eq!(value.to_json(), serde_json::json!([1, "two"]));
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_service_equality_is_identity() {
        let service: ServiceRef = Arc::new(5_u8);
        let same = Value::Service(Arc::clone(&service));
        let other = Value::Service(Arc::new(5_u8));
        assert_eq!(Value::Service(service), same);
        assert_ne!(same, other);
    }

    #[test]
    fn test_form_part_text() {
        let part = FormPart {
            name: "f".into(),
            file_name: None,
            content_type: None,
            data: Bytes::from_static(b"hello"),
        };
        assert_eq!(part.text(), Some("hello"));
    }
}

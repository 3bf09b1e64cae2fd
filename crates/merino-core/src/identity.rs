//! Request identity.
//!
//! An [`Identity`] is a bag of claims plus the authentication mode that
//! produced it. Authentication middleware attaches it to the request; the
//! binding engine hands it to handlers that declare an `Identity` or a
//! [`User`] parameter.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims describing the caller of a request.
///
/// An identity without an authentication mode is anonymous.
///
/// # Example
///
/// ```rust
/// use merino_core::Identity;
/// use serde_json::json;
///
/// let identity = Identity::from_claims(json!({"sub": "u-1", "roles": ["admin"]}), "Bearer");
/// assert!(identity.is_authenticated());
/// assert_eq!(identity.sub(), Some("u-1"));
/// assert!(identity.has_role("admin"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    claims: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authentication_mode: Option<String>,
}

impl Identity {
    /// Creates an authenticated identity.
    #[must_use]
    pub fn new(claims: Map<String, Value>, authentication_mode: impl Into<String>) -> Self {
        Self {
            claims,
            authentication_mode: Some(authentication_mode.into()),
        }
    }

    /// Creates an authenticated identity from a JSON object.
    ///
    /// Non-object values produce an identity without claims.
    #[must_use]
    pub fn from_claims(claims: Value, authentication_mode: impl Into<String>) -> Self {
        let claims = match claims {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(claims, authentication_mode)
    }

    /// Creates an anonymous identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns true when an authentication mode is set.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authentication_mode.is_some()
    }

    /// The authentication mode that produced this identity.
    #[must_use]
    pub fn authentication_mode(&self) -> Option<&str> {
        self.authentication_mode.as_deref()
    }

    /// All claims.
    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Returns a single claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The `sub` claim.
    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.claim("sub").and_then(Value::as_str)
    }

    /// The `name` claim.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.claim("name").and_then(Value::as_str)
    }

    /// Roles listed in the `roles` claim.
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        self.claim("roles")
            .and_then(Value::as_array)
            .map(|roles| roles.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true when `role` is listed in the `roles` claim.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles().contains(&role)
    }

    /// A string suitable for logs; never contains claim values other than `sub`.
    #[must_use]
    pub fn log_id(&self) -> String {
        match (self.authentication_mode(), self.sub()) {
            (None, _) => "anonymous".to_string(),
            (Some(mode), Some(sub)) => format!("{mode}:{sub}"),
            (Some(mode), None) => format!("{mode}:unknown"),
        }
    }
}

/// An authenticated identity.
///
/// Handlers that declare a `User` parameter only receive identities that
/// passed authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct User(Identity);

impl User {
    /// Wraps `identity` if it is authenticated.
    #[must_use]
    pub fn authenticated(identity: Identity) -> Option<Self> {
        identity.is_authenticated().then_some(Self(identity))
    }

    /// Unwraps the identity.
    #[must_use]
    pub fn into_identity(self) -> Identity {
        self.0
    }
}

impl Deref for User {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.0
    }
}

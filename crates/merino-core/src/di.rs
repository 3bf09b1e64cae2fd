//! Service container.
//!
//! Services are registered before the application starts, either by type or
//! under a name, and are looked up by the binding engine when a handler
//! declares a service parameter. The container only answers membership and
//! lookup questions; it does not construct services.
//!
//! # Example
//!
//! ```rust
//! use merino_core::di::Container;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! let mut container = Container::new();
//! container.register(Arc::new(Database { url: "postgres://localhost/db".into() }));
//! container.register_named("settings", Arc::new(42_u32));
//!
//! let db: Arc<Database> = container.resolve().unwrap();
//! assert_eq!(db.url, "postgres://localhost/db");
//! assert!(container.contains_name("settings"));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A type-erased service instance.
pub type ServiceRef = Arc<dyn Any + Send + Sync>;

/// Error when a dependency cannot be resolved.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to inject {service}: {reason}")]
pub struct InjectionError {
    /// The type or name that could not be resolved.
    pub service: String,
    /// The reason for the failure.
    pub reason: String,
}

impl InjectionError {
    /// A missing service of type `T`.
    pub fn not_registered<T>() -> Self {
        Self {
            service: std::any::type_name::<T>().to_string(),
            reason: "service not registered".to_string(),
        }
    }
}

#[derive(Clone)]
struct Registration {
    type_name: &'static str,
    service: ServiceRef,
}

/// A service container keyed by type and by name.
#[derive(Default, Clone)]
pub struct Container {
    by_type: HashMap<TypeId, Registration>,
    by_name: HashMap<String, ServiceRef>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service under its type.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.by_type.insert(
            TypeId::of::<T>(),
            Registration {
                type_name: std::any::type_name::<T>(),
                service,
            },
        );
    }

    /// Registers a service under a name.
    pub fn register_named<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, service: Arc<T>) {
        self.by_name.insert(name.into(), service);
    }

    /// Resolves a service by type.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve_type(TypeId::of::<T>())
            .and_then(|s| s.downcast::<T>().ok())
    }

    /// Resolves a service by type or returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if the service is not registered.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectionError> {
        self.resolve().ok_or_else(InjectionError::not_registered::<T>)
    }

    /// Resolves a named service of type `T`.
    #[must_use]
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.resolve_name(name).and_then(|s| s.downcast::<T>().ok())
    }

    /// Resolves a type-erased service by type id.
    #[must_use]
    pub fn resolve_type(&self, id: TypeId) -> Option<ServiceRef> {
        self.by_type.get(&id).map(|r| Arc::clone(&r.service))
    }

    /// Resolves a type-erased service by name.
    #[must_use]
    pub fn resolve_name(&self, name: &str) -> Option<ServiceRef> {
        self.by_name.get(name).cloned()
    }

    /// Checks if a service of type `T` is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.contains_type(TypeId::of::<T>())
    }

    /// Checks if a service with the given type id is registered.
    #[must_use]
    pub fn contains_type(&self, id: TypeId) -> bool {
        self.by_type.contains_key(&id)
    }

    /// Checks if a service is registered under `name`.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The Rust type name a type id was registered with.
    #[must_use]
    pub fn type_name_of(&self, id: TypeId) -> Option<&'static str> {
        self.by_type.get(&id).map(|r| r.type_name)
    }

    /// Total number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len() + self.by_name.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.by_name.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.by_type.values().map(|r| r.type_name).collect();
        types.sort_unstable();
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort_unstable();
        f.debug_struct("Container")
            .field("types", &types)
            .field("names", &names)
            .finish()
    }
}

/// A service injected from the container.
///
/// Declaring an `Inject<T>` parameter always sources the value from the
/// container, even when `T` is not registered yet at startup.
#[derive(Debug)]
pub struct Inject<T>(pub Arc<T>);

impl<T> Inject<T> {
    /// Wraps a service.
    pub fn new(inner: Arc<T>) -> Self {
        Self(inner)
    }

    /// Returns the shared service.
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Repo {
        items: Vec<&'static str>,
    }

    #[test]
    fn test_register_and_resolve_by_type() {
        let mut container = Container::new();
        container.register(Arc::new(Repo { items: vec!["a"] }));

        assert!(container.contains::<Repo>());
        assert_eq!(container.resolve::<Repo>().unwrap().items, vec!["a"]);
        assert!(container.resolve::<String>().is_none());
    }

    #[test]
    fn test_resolve_required_error() {
        let container = Container::new();
        let err = container.resolve_required::<Repo>().unwrap_err();
        assert!(err.to_string().contains("Repo"));
    }

    #[test]
    fn test_named_services_are_separate_from_types() {
        let mut container = Container::new();
        container.register_named("greeting", Arc::new("hi".to_string()));

        assert!(container.contains_name("greeting"));
        assert!(!container.contains::<String>());
        assert_eq!(
            container.resolve_named::<String>("greeting").as_deref().map(String::as_str),
            Some("hi")
        );
        assert!(container.resolve_named::<u8>("greeting").is_none());
    }

    #[test]
    fn test_type_name_of() {
        let mut container = Container::new();
        container.register(Arc::new(Repo { items: vec![] }));
        let name = container.type_name_of(TypeId::of::<Repo>()).unwrap();
        assert!(name.ends_with("Repo"));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_inject_deref() {
        let inject = Inject::new(Arc::new(Repo { items: vec!["x"] }));
        assert_eq!(inject.items.len(), 1);
    }
}

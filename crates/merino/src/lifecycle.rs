//! Application lifecycle events.
//!
//! | Event                          | Fired by                          | Hook receives          |
//! |--------------------------------|-----------------------------------|------------------------|
//! | `on_start`                     | [`Application::launch`], first    | `&mut Container`       |
//! | `on_middlewares_configuration` | chain composition, once           | [`MiddlewareList`]     |
//! | `after_start`                  | [`Application::launch`], last     | `&mut Container`       |
//! | `on_stop`                      | [`Application::stop`]             | `&mut Container`       |
//!
//! Start hooks run in registration order and the first failure aborts the
//! launch. Stop hooks run in reverse registration order; every hook runs and
//! failures are collected.
//!
//! [`Application::launch`]: crate::Application::launch
//! [`Application::stop`]: crate::Application::stop

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use merino_bind::Callable;
use merino_core::di::Container;
use merino_core::BoxFuture;
use merino_middleware::{BoxedMiddleware, Middleware};
use thiserror::Error;

use crate::endpoint::IntoEndpoint;

/// A lifecycle hook failure.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A hook reported a failure.
    #[error("{message}")]
    Hook {
        /// What went wrong.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A start hook failed; later hooks did not run.
    #[error("{event} hook '{hook}' failed: {source}")]
    Start {
        /// `on_start` or `after_start`.
        event: &'static str,
        /// Name of the failing hook.
        hook: String,
        /// The hook's error.
        #[source]
        source: Box<LifecycleError>,
    },

    /// One or more stop hooks failed.
    #[error("on_stop hooks failed: {0}")]
    Stop(String),
}

impl LifecycleError {
    /// A hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Hook {
            message: message.into(),
            source: None,
        }
    }

    /// A hook error wrapping a source error.
    pub fn with_source(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Hook {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// An asynchronous lifecycle hook.
pub type LifecycleHook = Arc<dyn Fn(&mut Container) -> BoxFuture<'static, Result<(), LifecycleError>> + Send + Sync>;

/// A hook that may adjust the middleware list before the chain is composed.
pub type MiddlewareHook = Arc<dyn Fn(&mut MiddlewareList<'_>) + Send + Sync>;

pub(crate) enum MiddlewareEntry {
    Pending(Arc<dyn Callable>),
    Native(BoxedMiddleware),
}

/// The registered middleware, as seen by `on_middlewares_configuration`.
pub struct MiddlewareList<'a> {
    entries: &'a mut Vec<MiddlewareEntry>,
}

impl<'a> MiddlewareList<'a> {
    pub(crate) fn new(entries: &'a mut Vec<MiddlewareEntry>) -> Self {
        Self { entries }
    }

    /// Appends a middleware callable.
    pub fn add(&mut self, middleware: impl IntoEndpoint) -> &mut Self {
        self.entries.push(MiddlewareEntry::Pending(middleware.into_callable()));
        self
    }

    /// Appends a native middleware.
    pub fn add_native(&mut self, middleware: impl Middleware) -> &mut Self {
        self.entries.push(MiddlewareEntry::Native(Arc::new(middleware)));
        self
    }

    /// Inserts a native middleware ahead of every registered one.
    pub fn prepend_native(&mut self, middleware: impl Middleware) -> &mut Self {
        self.entries.insert(0, MiddlewareEntry::Native(Arc::new(middleware)));
        self
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The hooks of one application.
#[derive(Default)]
pub(crate) struct Lifecycle {
    on_start: Vec<(String, LifecycleHook)>,
    after_start: Vec<(String, LifecycleHook)>,
    on_stop: Vec<(String, LifecycleHook)>,
    on_middlewares: Vec<MiddlewareHook>,
}

fn boxed<F, Fut>(hook: F) -> LifecycleHook
where
    F: Fn(&mut Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
{
    Arc::new(move |container: &mut Container| -> BoxFuture<'static, Result<(), LifecycleError>> {
        Box::pin(hook(container))
    })
}

impl Lifecycle {
    pub(crate) fn add_on_start<F, Fut>(&mut self, hook: F)
    where
        F: Fn(&mut Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        let name = format!("on_start_{}", self.on_start.len());
        self.on_start.push((name, boxed(hook)));
    }

    pub(crate) fn add_after_start<F, Fut>(&mut self, hook: F)
    where
        F: Fn(&mut Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        let name = format!("after_start_{}", self.after_start.len());
        self.after_start.push((name, boxed(hook)));
    }

    pub(crate) fn add_on_stop<F, Fut>(&mut self, hook: F)
    where
        F: Fn(&mut Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        let name = format!("on_stop_{}", self.on_stop.len());
        self.on_stop.push((name, boxed(hook)));
    }

    pub(crate) fn add_on_middlewares(&mut self, hook: MiddlewareHook) {
        self.on_middlewares.push(hook);
    }

    pub(crate) fn configure_middlewares(&self, entries: &mut Vec<MiddlewareEntry>) {
        let mut list = MiddlewareList::new(entries);
        for hook in &self.on_middlewares {
            hook(&mut list);
        }
    }

    pub(crate) async fn fire_on_start(&self, container: &mut Container) -> Result<(), LifecycleError> {
        run_in_order("on_start", &self.on_start, container).await
    }

    pub(crate) async fn fire_after_start(&self, container: &mut Container) -> Result<(), LifecycleError> {
        run_in_order("after_start", &self.after_start, container).await
    }

    pub(crate) async fn fire_on_stop(&self, container: &mut Container) -> Result<(), LifecycleError> {
        let mut errors = Vec::new();
        for (name, hook) in self.on_stop.iter().rev() {
            tracing::debug!(hook = %name, "running on_stop hook");
            if let Err(err) = hook(container).await {
                tracing::error!(hook = %name, error = %err, "on_stop hook failed");
                errors.push(format!("{name}: {err}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Stop(errors.join("; ")))
        }
    }
}

async fn run_in_order(
    event: &'static str,
    hooks: &[(String, LifecycleHook)],
    container: &mut Container,
) -> Result<(), LifecycleError> {
    for (name, hook) in hooks {
        tracing::debug!(hook = %name, event, "running lifecycle hook");
        if let Err(err) = hook(container).await {
            tracing::error!(hook = %name, event, error = %err, "lifecycle hook failed");
            return Err(LifecycleError::Start {
                event,
                hook: name.clone(),
                source: Box::new(err),
            });
        }
    }
    Ok(())
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("on_start", &self.on_start.len())
            .field("after_start", &self.after_start.len())
            .field("on_stop", &self.on_stop.len())
            .field("on_middlewares_configuration", &self.on_middlewares.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Pool;

    #[tokio::test]
    async fn test_start_hooks_run_in_order_and_stop_on_failure() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut lifecycle = Lifecycle::default();
        for step in 1..=3 {
            let order = Arc::clone(&order);
            lifecycle.add_on_start(move |_| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(step);
                    if step == 2 {
                        return Err(LifecycleError::new("database unreachable"));
                    }
                    Ok(())
                }
            });
        }

        let err = lifecycle.fire_on_start(&mut Container::new()).await.unwrap_err();
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
        assert!(matches!(err, LifecycleError::Start { ref hook, .. } if hook == "on_start_1"));
        assert!(err.to_string().contains("database unreachable"));
    }

    #[tokio::test]
    async fn test_start_hook_can_register_services() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.add_on_start(|container| {
            container.register(Arc::new(Pool));
            async { Ok(()) }
        });

        let mut container = Container::new();
        lifecycle.fire_on_start(&mut container).await.unwrap();
        assert!(container.contains::<Pool>());
    }

    #[tokio::test]
    async fn test_stop_hooks_run_in_reverse_and_collect_failures() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut lifecycle = Lifecycle::default();
        for step in 1..=3 {
            let order = Arc::clone(&order);
            lifecycle.add_on_stop(move |_| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(step);
                    if step == 3 {
                        return Err(LifecycleError::new("flush failed"));
                    }
                    Ok(())
                }
            });
        }

        let err = lifecycle.fire_on_stop(&mut Container::new()).await.unwrap_err();
        assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
        assert!(matches!(err, LifecycleError::Stop(ref summary) if summary.contains("on_stop_2: flush failed")));
    }
}

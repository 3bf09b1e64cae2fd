//! Endpoints: callables the application can inspect and invoke.
//!
//! Two kinds of endpoint implement [`Callable`]:
//!
//! - [`Endpoint`] wraps a typed `async fn`. Its parameter types describe
//!   themselves through [`Parameter`]; names are given with
//!   [`Endpoint::params`]. [`stream_endpoint`] wraps a function returning a
//!   [`Stream`] instead; each item becomes part of the response body.
//! - [`DynEndpoint`] carries an explicit parameter list and a closure over
//!   positional [`Value`]s. Hosts that expose handlers from elsewhere use it.
//!
//! # Example
//!
//! ```rust
//! use merino::{endpoint, FromQuery, Json};
//!
//! async fn get_item(item_id: i64, FromQuery(q): FromQuery<Option<String>>) -> Json<serde_json::Value> {
//!     Json(serde_json::json!({ "item_id": item_id, "q": q }))
//! }
//!
//! let ep = endpoint(get_item).params(["item_id", "q"]);
//! # let _ = ep;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use merino_bind::{
    Annotation, BoundDesc, Callable, CallableInfo, ConversionError, ItemStream, NormalizationError, Parameter,
    ParameterSpec, StreamItem, StreamOutput, TypeDesc, TypeKey, Value,
};
use merino_core::{BoxFuture, HandlerResult, IntoResponse, MerinoError, Response};

/// Conversion of a typed async function into positional invocation.
///
/// Implemented for `Fn(T1, …, Tn) -> Fut` with up to eight parameters,
/// where every `Ti: Parameter` and the output implements [`IntoResponse`].
pub trait IntoCallable<Args>: Send + Sync + 'static {
    /// Declared types of the parameters, in order.
    fn describe() -> Vec<Option<TypeDesc>>;

    /// Name of the return type.
    fn return_type() -> &'static str;

    /// Converts the values and calls the function.
    ///
    /// # Errors
    ///
    /// Returns the index of the first value that does not convert.
    fn invoke_with(&self, args: Vec<Value>) -> Result<BoxFuture<'static, Response>, (usize, ConversionError)>;
}

/// Conversion of a typed stream-returning function into positional
/// invocation.
///
/// Implemented for `Fn(T1, …, Tn) -> S` with up to eight parameters, where
/// every `Ti: Parameter` and `S` is a [`Stream`].
pub trait IntoStreamCallable<Args>: Send + Sync + 'static {
    /// Declared types of the parameters, in order.
    fn describe() -> Vec<Option<TypeDesc>>;

    /// Name of the stream type.
    fn return_type() -> &'static str;

    /// The type of each yielded item.
    fn item() -> TypeKey;

    /// Converts the values and calls the function.
    ///
    /// # Errors
    ///
    /// Returns the index of the first value that does not convert.
    fn stream_with(&self, args: Vec<Value>) -> Result<ItemStream, (usize, ConversionError)>;
}

macro_rules! impl_into_callable {
    ($($ty:ident),*) => {
        impl<F, Fut, R, $($ty,)*> IntoCallable<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoResponse + 'static,
            $($ty: Parameter,)*
        {
            fn describe() -> Vec<Option<TypeDesc>> {
                vec![$($ty::describe()),*]
            }

            fn return_type() -> &'static str {
                std::any::type_name::<R>()
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn invoke_with(&self, args: Vec<Value>) -> Result<BoxFuture<'static, Response>, (usize, ConversionError)> {
                let mut args = args.into_iter();
                let mut index = 0_usize;
                $(
                    let $ty = $ty::from_value(args.next().unwrap_or(Value::Null)).map_err(|e| (index, e))?;
                    index += 1;
                )*
                let future = (self)($($ty),*);
                Ok(Box::pin(async move { future.await.into_response() }))
            }
        }

        impl<F, St, $($ty,)*> IntoStreamCallable<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> St + Send + Sync + 'static,
            St: Stream + Send + 'static,
            St::Item: Send + 'static,
            $($ty: Parameter,)*
        {
            fn describe() -> Vec<Option<TypeDesc>> {
                vec![$($ty::describe()),*]
            }

            fn return_type() -> &'static str {
                std::any::type_name::<St>()
            }

            fn item() -> TypeKey {
                TypeKey::of::<St::Item>()
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn stream_with(&self, args: Vec<Value>) -> Result<ItemStream, (usize, ConversionError)> {
                let mut args = args.into_iter();
                let mut index = 0_usize;
                $(
                    let $ty = $ty::from_value(args.next().unwrap_or(Value::Null)).map_err(|e| (index, e))?;
                    index += 1;
                )*
                let items = (self)($($ty),*);
                Ok(items.map(|item| Box::new(item) as StreamItem).boxed())
            }
        }
    };
}

impl_into_callable!();
impl_into_callable!(T1);
impl_into_callable!(T1, T2);
impl_into_callable!(T1, T2, T3);
impl_into_callable!(T1, T2, T3, T4);
impl_into_callable!(T1, T2, T3, T4, T5);
impl_into_callable!(T1, T2, T3, T4, T5, T6);
impl_into_callable!(T1, T2, T3, T4, T5, T6, T7);
impl_into_callable!(T1, T2, T3, T4, T5, T6, T7, T8);

/// Endpoint kind of functions returning one response.
#[derive(Debug, Clone, Copy)]
pub struct Unary;

/// Endpoint kind of functions returning a stream of items.
#[derive(Debug, Clone, Copy)]
pub struct Streaming;

/// A typed function prepared for registration.
pub struct Endpoint<F, Args, K = Unary> {
    func: Arc<F>,
    info: CallableInfo,
    error: Option<NormalizationError>,
    _args: PhantomData<fn() -> (Args, K)>,
}

fn positional(descs: Vec<Option<TypeDesc>>) -> Vec<ParameterSpec> {
    descs
        .into_iter()
        .enumerate()
        .map(|(index, desc)| {
            let annotation = desc.map_or(Annotation::Empty, Annotation::Resolved);
            ParameterSpec::new(format!("arg{index}"), annotation)
        })
        .collect()
}

/// Wraps a typed async function.
///
/// Parameters are named `arg0`, `arg1`, … until [`Endpoint::params`] names
/// them.
pub fn endpoint<F, Args>(func: F) -> Endpoint<F, Args>
where
    F: IntoCallable<Args>,
{
    Endpoint {
        func: Arc::new(func),
        info: CallableInfo {
            name: std::any::type_name::<F>().to_string(),
            params: positional(F::describe()),
            return_type: Some(F::return_type().to_string()),
            is_async: true,
            type_hints: HashMap::new(),
            stream: None,
        },
        error: None,
        _args: PhantomData,
    }
}

/// Wraps a function that returns a stream.
///
/// The items are encoded by the response type registered for the item type
/// in the application's [`StreamTypes`](crate::StreamTypes).
///
/// ```rust
/// use futures_util::stream::{self, Stream};
/// use merino::{stream_endpoint, FromQuery};
///
/// fn count(FromQuery(to): FromQuery<i64>) -> impl Stream<Item = String> {
///     stream::iter((1..=to).map(|n| format!("{n}\n")))
/// }
///
/// let ep = stream_endpoint(count).params(["to"]);
/// # let _ = ep;
/// ```
pub fn stream_endpoint<F, Args>(func: F) -> Endpoint<F, Args, Streaming>
where
    F: IntoStreamCallable<Args>,
{
    Endpoint {
        func: Arc::new(func),
        info: CallableInfo {
            name: std::any::type_name::<F>().to_string(),
            params: positional(F::describe()),
            return_type: Some(F::return_type().to_string()),
            is_async: true,
            type_hints: HashMap::new(),
            stream: Some(StreamOutput { item: Some(F::item()) }),
        },
        error: None,
        _args: PhantomData,
    }
}

impl<F, Args, K> Endpoint<F, Args, K> {
    /// Names the parameters, in order.
    ///
    /// A count that does not match the function is reported when the
    /// application starts.
    #[must_use]
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != self.info.params.len() {
            self.fail(NormalizationError::ParameterNames {
                callable: self.info.name.clone(),
                expected: self.info.params.len(),
                declared: names.len(),
            });
            return self;
        }
        for (spec, name) in self.info.params.iter_mut().zip(names) {
            spec.name = name;
        }
        self
    }

    /// Sets the name used in logs and errors.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.info.name = name.into();
        self
    }

    /// Sets the default value of a parameter.
    #[must_use]
    pub fn default(mut self, parameter: &str, value: impl Into<Value>) -> Self {
        match self.info.params.iter_mut().find(|p| p.name == parameter) {
            Some(spec) => spec.default = Some(value.into()),
            None => self.unknown_parameter(parameter),
        }
        self
    }

    /// Overrides the lookup key of a bound-value wrapper parameter.
    ///
    /// `endpoint(f).params(["token"]).source_name("token", "X-Api-Token")`
    /// reads the `FromHeader` parameter `token` from the `X-Api-Token` header.
    #[must_use]
    pub fn source_name(mut self, parameter: &str, key: impl Into<String>) -> Self {
        let callable = self.info.name.clone();
        let Some(spec) = self.info.params.iter_mut().find(|p| p.name == parameter) else {
            self.unknown_parameter(parameter);
            return self;
        };
        let applied = match &mut spec.annotation {
            Annotation::Resolved(desc) => match bound_mut(desc) {
                Some(bound) => {
                    bound.name = Some(key.into());
                    true
                }
                None => false,
            },
            _ => false,
        };
        if !applied {
            self.fail(NormalizationError::InvalidRegistration {
                callable,
                parameter: parameter.to_string(),
                reason: "only bound-value wrappers take a source name".to_string(),
            });
        }
        self
    }

    fn unknown_parameter(&mut self, parameter: &str) {
        self.fail(NormalizationError::InvalidRegistration {
            callable: self.info.name.clone(),
            parameter: parameter.to_string(),
            reason: "no such parameter".to_string(),
        });
    }

    fn fail(&mut self, err: NormalizationError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn conversion_error(&self, index: usize, err: ConversionError) -> MerinoError {
        let parameter = self
            .info
            .params
            .get(index)
            .map_or_else(|| format!("arg{index}"), |p| p.name.clone());
        tracing::debug!(callable = %self.info.name, %parameter, error = %err, "argument conversion failed");
        MerinoError::bad_request(format!("invalid value for '{parameter}': {err}")).with_parameter(parameter)
    }
}

fn bound_mut(desc: &mut TypeDesc) -> Option<&mut BoundDesc> {
    match desc {
        TypeDesc::Bound(bound) => Some(bound),
        TypeDesc::Optional(inner) => bound_mut(inner),
        _ => None,
    }
}

impl<F, Args, K> fmt::Debug for Endpoint<F, Args, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint").field("info", &self.info).finish_non_exhaustive()
    }
}

impl<F, Args> Callable for Endpoint<F, Args, Unary>
where
    F: IntoCallable<Args>,
    Args: 'static,
{
    fn info(&self) -> &CallableInfo {
        &self.info
    }

    fn invoke(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        match IntoCallable::invoke_with(self.func.as_ref(), args) {
            Ok(future) => Box::pin(async move { Ok(future.await) }),
            Err((index, err)) => {
                let err = self.conversion_error(index, err);
                Box::pin(async move { Err(err) })
            }
        }
    }

    fn registration_error(&self) -> Option<&NormalizationError> {
        self.error.as_ref()
    }
}

impl<F, Args> Callable for Endpoint<F, Args, Streaming>
where
    F: IntoStreamCallable<Args>,
    Args: 'static,
{
    fn info(&self) -> &CallableInfo {
        &self.info
    }

    fn invoke(&self, _args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        let err = MerinoError::internal(format!("'{}' produces a stream", self.info.name));
        Box::pin(async move { Err(err) })
    }

    fn invoke_stream(&self, args: Vec<Value>) -> Result<ItemStream, MerinoError> {
        IntoStreamCallable::stream_with(self.func.as_ref(), args).map_err(|(index, err)| self.conversion_error(index, err))
    }

    fn registration_error(&self) -> Option<&NormalizationError> {
        self.error.as_ref()
    }
}

type DynFunc = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type DynStreamFunc = Arc<dyn Fn(Vec<Value>) -> ItemStream + Send + Sync>;

#[derive(Clone)]
enum DynBody {
    Call(DynFunc),
    Stream(DynStreamFunc),
}

/// A callable with an explicit parameter list.
///
/// # Example
///
/// ```rust
/// use merino::{DynEndpoint, IntoResponse, ParameterSpec};
///
/// let ep = DynEndpoint::new(
///     "get_item",
///     vec![
///         ParameterSpec::annotated("item_id", "int"),
///         ParameterSpec::annotated("q", "str | None"),
///     ],
///     |args| async move { Ok(format!("{args:?}").into_response()) },
/// );
/// # let _ = ep;
/// ```
#[derive(Clone)]
pub struct DynEndpoint {
    info: CallableInfo,
    body: DynBody,
}

impl DynEndpoint {
    /// Creates an asynchronous dynamic endpoint.
    pub fn new<F, Fut>(name: impl Into<String>, params: Vec<ParameterSpec>, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            info: CallableInfo {
                name: name.into(),
                params,
                return_type: None,
                is_async: true,
                type_hints: HashMap::new(),
                stream: None,
            },
            body: DynBody::Call(Arc::new(move |args: Vec<Value>| -> BoxFuture<'static, HandlerResult> {
                Box::pin(func(args))
            })),
        }
    }

    /// Creates a dynamic endpoint that yields a stream of `Item`s.
    pub fn streaming<F, St, Item>(name: impl Into<String>, params: Vec<ParameterSpec>, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> St + Send + Sync + 'static,
        St: Stream<Item = Item> + Send + 'static,
        Item: Send + 'static,
    {
        Self {
            info: CallableInfo {
                name: name.into(),
                params,
                return_type: Some(std::any::type_name::<St>().to_string()),
                is_async: true,
                type_hints: HashMap::new(),
                stream: Some(StreamOutput {
                    item: Some(TypeKey::of::<Item>()),
                }),
            },
            body: DynBody::Stream(Arc::new(move |args: Vec<Value>| -> ItemStream {
                func(args).map(|item| Box::new(item) as StreamItem).boxed()
            })),
        }
    }

    /// Replaces the declared item type of a streaming endpoint.
    ///
    /// Hosts pass `None` when the item type is not known; such an endpoint
    /// fails normalization.
    #[must_use]
    pub fn with_stream_item(mut self, item: Option<TypeKey>) -> Self {
        if let Some(stream) = &mut self.info.stream {
            stream.item = item;
        }
        self
    }

    /// Creates a blocking dynamic endpoint.
    ///
    /// Blocking callables cannot serve requests; normalization rejects them.
    pub fn blocking<F>(name: impl Into<String>, params: Vec<ParameterSpec>, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        let mut ep = Self::new(name, params, move |args| {
            let func = Arc::clone(&func);
            async move { func(args) }
        });
        ep.info.is_async = false;
        ep
    }

    /// Records the declared return type.
    #[must_use]
    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.info.return_type = Some(return_type.into());
        self
    }

    /// Supplies a type for a parameter, overriding its annotation.
    #[must_use]
    pub fn with_type_hint(mut self, parameter: impl Into<String>, desc: TypeDesc) -> Self {
        self.info.type_hints.insert(parameter.into(), desc);
        self
    }
}

impl fmt::Debug for DynEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynEndpoint").field("info", &self.info).finish_non_exhaustive()
    }
}

impl Callable for DynEndpoint {
    fn info(&self) -> &CallableInfo {
        &self.info
    }

    fn invoke(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        match &self.body {
            DynBody::Call(func) => func(args),
            DynBody::Stream(_) => {
                let err = MerinoError::internal(format!("'{}' produces a stream", self.info.name));
                Box::pin(async move { Err(err) })
            }
        }
    }

    fn invoke_stream(&self, args: Vec<Value>) -> Result<ItemStream, MerinoError> {
        match &self.body {
            DynBody::Stream(func) => Ok(func(args)),
            DynBody::Call(_) => Err(MerinoError::internal(format!(
                "'{}' does not produce a stream",
                self.info.name
            ))),
        }
    }
}

/// Anything the application accepts as a handler or middleware.
pub trait IntoEndpoint {
    /// Converts into a shared callable.
    fn into_callable(self) -> Arc<dyn Callable>;
}

impl<F, Args> IntoEndpoint for Endpoint<F, Args, Unary>
where
    F: IntoCallable<Args>,
    Args: 'static,
{
    fn into_callable(self) -> Arc<dyn Callable> {
        Arc::new(self)
    }
}

impl<F, Args> IntoEndpoint for Endpoint<F, Args, Streaming>
where
    F: IntoStreamCallable<Args>,
    Args: 'static,
{
    fn into_callable(self) -> Arc<dyn Callable> {
        Arc::new(self)
    }
}

impl IntoEndpoint for DynEndpoint {
    fn into_callable(self) -> Arc<dyn Callable> {
        Arc::new(self)
    }
}

impl IntoEndpoint for Arc<dyn Callable> {
    fn into_callable(self) -> Arc<dyn Callable> {
        self
    }
}

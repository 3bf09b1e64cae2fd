//! # Merino Bind
//!
//! Signature inspection and request parameter binding.
//!
//! Handlers declare what they need through their parameters. This crate
//! turns those declarations into binders once, at application start:
//!
//! - [`inspect`] reads a [`Callable`]'s parameters into a [`Signature`]
//! - [`resolve_slots`] picks a [`Binder`] for each parameter, driven by a
//!   [`BinderRegistry`]
//! - at request time each [`Binder`] produces a [`Value`] from the request
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use merino_bind::{BinderRegistry, ParameterDescriptor, ResolveContext, SourceKind, TypeDesc};
//! use merino_core::di::Container;
//! use merino_router::RoutePattern;
//!
//! let registry = BinderRegistry::default();
//! let services = Arc::new(Container::new());
//! let route = RoutePattern::parse("/items/{item_id}").unwrap();
//! let ctx = ResolveContext::for_route(&registry, &services, &route);
//!
//! let param = ParameterDescriptor {
//!     name: "item_id".into(),
//!     declared: Some(TypeDesc::Int),
//!     default: None,
//!     kind: Default::default(),
//! };
//! let binder = merino_bind::resolve_parameter("get_item", &param, &ctx).unwrap();
//! assert_eq!(binder.kind(), SourceKind::Route);
//! ```

#![doc(html_root_url = "https://docs.rs/merino-bind/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod annotation;
mod binder;
mod error;
mod param;
mod registry;
mod resolve;
mod signature;
pub mod sources;
mod types;
mod value;

pub use annotation::{parse_annotation, AnnotationError, TypeNames};
pub use binder::{
    Binder, BinderFactory, BinderSource, FactoryContext, ServiceLookup, SourceKind, ValueSource,
};
pub use error::{BindError, BindSource, ConversionError, NormalizationError};
pub use param::{
    FromBytes, FromCookie, FromFiles, FromForm, FromHeader, FromJson, FromQuery, FromRoute,
    FromText, Parameter,
};
pub use registry::{BinderRegistry, BinderSpec, ServiceFactory};
pub use resolve::{resolve_parameter, resolve_slots, ResolveContext, ResolvedSlots, Slot, NEXT_HANDLER_NAMES};
pub use signature::{
    inspect, Annotation, Callable, CallableInfo, ItemStream, ParameterDescriptor, ParameterKind,
    ParameterSpec, Signature, StreamItem, StreamOutput,
};
pub use types::{BoundDesc, BoundKind, TypeDesc, TypeKey};
pub use value::{FormPart, Value};

pub use async_trait::async_trait;

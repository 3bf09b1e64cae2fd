//! Signature inspection.
//!
//! A [`Callable`] reports what it declares through [`CallableInfo`]:
//! parameter names, kinds, annotations and defaults. [`inspect`] validates
//! that description and turns it into an ordered [`Signature`] of
//! [`ParameterDescriptor`]s with every annotation resolved.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use merino_core::{BoxFuture, HandlerResult, MerinoError};

use crate::annotation::{parse_annotation, TypeNames};
use crate::error::NormalizationError;
use crate::types::{TypeDesc, TypeKey};
use crate::value::Value;

/// How a parameter accepts arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterKind {
    /// An ordinary positional parameter.
    #[default]
    PositionalOrKeyword,
    /// Collects extra positional arguments.
    VarPositional,
    /// Can only be passed by keyword.
    KeywordOnly,
    /// Collects extra keyword arguments.
    VarKeyword,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PositionalOrKeyword => f.write_str("positional"),
            Self::VarPositional => f.write_str("variadic positional"),
            Self::KeywordOnly => f.write_str("keyword-only"),
            Self::VarKeyword => f.write_str("variadic keyword"),
        }
    }
}

/// A declared parameter type, as reported by a callable.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Annotation {
    /// No annotation.
    #[default]
    Empty,
    /// An already resolved descriptor.
    Resolved(TypeDesc),
    /// Annotation text, resolved during inspection.
    Deferred(String),
}

/// A parameter as reported by a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub annotation: Annotation,
    /// Parameter kind.
    pub kind: ParameterKind,
    /// Default value.
    pub default: Option<Value>,
}

impl ParameterSpec {
    /// A positional parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, annotation: Annotation) -> Self {
        Self {
            name: name.into(),
            annotation,
            kind: ParameterKind::PositionalOrKeyword,
            default: None,
        }
    }

    /// A positional parameter without annotation.
    #[must_use]
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, Annotation::Empty)
    }

    /// A positional parameter with a resolved type.
    #[must_use]
    pub fn typed(name: impl Into<String>, desc: TypeDesc) -> Self {
        Self::new(name, Annotation::Resolved(desc))
    }

    /// A positional parameter with annotation text.
    #[must_use]
    pub fn annotated(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, Annotation::Deferred(text.into()))
    }

    /// Sets the parameter kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ParameterKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// What a streaming callable declares about its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamOutput {
    /// The type of each item; `None` when the callable does not declare it.
    pub item: Option<TypeKey>,
}

/// One item yielded by a streaming callable.
pub type StreamItem = Box<dyn Any + Send>;

/// The items yielded by a streaming callable.
pub type ItemStream = BoxStream<'static, StreamItem>;

/// What a callable declares about itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallableInfo {
    /// Name used in logs and errors.
    pub name: String,
    /// Parameters in declaration order.
    pub params: Vec<ParameterSpec>,
    /// Declared return type, if known.
    pub return_type: Option<String>,
    /// Whether the callable is asynchronous.
    pub is_async: bool,
    /// Per-parameter type hints that override the declared annotations.
    pub type_hints: HashMap<String, TypeDesc>,
    /// Set when the callable yields a stream of items instead of one
    /// response.
    pub stream: Option<StreamOutput>,
}

/// Something the framework can inspect and invoke with positional values.
pub trait Callable: Send + Sync + 'static {
    /// Describes the callable's parameters.
    fn info(&self) -> &CallableInfo;

    /// Invokes the callable with one value per declared parameter.
    fn invoke(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult>;

    /// Invokes a streaming callable and returns its items.
    ///
    /// # Errors
    ///
    /// Returns [`MerinoError`] when an argument does not convert or the
    /// callable does not stream.
    fn invoke_stream(&self, args: Vec<Value>) -> Result<ItemStream, MerinoError> {
        drop(args);
        Err(MerinoError::internal(format!(
            "'{}' does not produce a stream",
            self.info().name
        )))
    }

    /// A mistake made while registering the callable, reported at inspection.
    fn registration_error(&self) -> Option<&NormalizationError> {
        None
    }
}

/// An inspected parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Parameter name.
    pub name: String,
    /// Resolved declared type; `None` when unannotated.
    pub declared: Option<TypeDesc>,
    /// Default value.
    pub default: Option<Value>,
    /// Parameter kind.
    pub kind: ParameterKind,
}

/// An inspected callable signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    callable: String,
    params: IndexMap<String, ParameterDescriptor>,
    return_type: Option<String>,
    is_async: bool,
}

impl Signature {
    /// Name of the inspected callable.
    #[must_use]
    pub fn callable(&self) -> &str {
        &self.callable
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> impl ExactSizeIterator<Item = &ParameterDescriptor> {
        self.params.values()
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.params.get(name)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if the callable takes no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Declared return type.
    #[must_use]
    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    /// Whether the callable is asynchronous.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async
    }
}

/// Inspects a callable's declared parameters.
///
/// Variadic and keyword-only parameters are rejected, annotation text is
/// parsed against `names`, and per-parameter type hints replace declared
/// annotations.
///
/// # Errors
///
/// Returns the callable's registration error, if any, or
/// [`NormalizationError::UnsupportedSignature`],
/// [`NormalizationError::DuplicateParameter`] or
/// [`NormalizationError::UnresolvedAnnotation`].
pub fn inspect(callable: &dyn Callable, names: &TypeNames) -> Result<Signature, NormalizationError> {
    if let Some(err) = callable.registration_error() {
        return Err(err.clone());
    }

    let info = callable.info();
    let mut params = IndexMap::with_capacity(info.params.len());

    for spec in &info.params {
        if spec.kind != ParameterKind::PositionalOrKeyword {
            return Err(NormalizationError::UnsupportedSignature {
                callable: info.name.clone(),
                parameter: spec.name.clone(),
                kind: spec.kind.to_string(),
            });
        }
        if params.contains_key(&spec.name) {
            return Err(NormalizationError::DuplicateParameter {
                callable: info.name.clone(),
                parameter: spec.name.clone(),
            });
        }

        let declared = if let Some(hint) = info.type_hints.get(&spec.name) {
            Some(hint.clone())
        } else {
            match &spec.annotation {
                Annotation::Empty => None,
                Annotation::Resolved(desc) => Some(desc.clone()),
                Annotation::Deferred(text) => Some(parse_annotation(text, names).map_err(|err| {
                    NormalizationError::UnresolvedAnnotation {
                        callable: info.name.clone(),
                        parameter: spec.name.clone(),
                        annotation: text.clone(),
                        reason: err.to_string(),
                    }
                })?),
            }
        };

        params.insert(
            spec.name.clone(),
            ParameterDescriptor {
                name: spec.name.clone(),
                declared,
                default: spec.default.clone(),
                kind: spec.kind,
            },
        );
    }

    tracing::trace!(callable = %info.name, params = params.len(), "inspected signature");

    Ok(Signature {
        callable: info.name.clone(),
        params,
        return_type: info.return_type.clone(),
        is_async: info.is_async,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use merino_core::IntoResponse;

    struct Described(CallableInfo);

    impl Callable for Described {
        fn info(&self) -> &CallableInfo {
            &self.0
        }

        fn invoke(&self, _args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
            Box::pin(async { Ok(().into_response()) })
        }
    }

    fn callable(params: Vec<ParameterSpec>) -> Described {
        Described(CallableInfo {
            name: "handler".to_string(),
            params,
            return_type: Some("Response".to_string()),
            is_async: true,
            type_hints: HashMap::new(),
            stream: None,
        })
    }

    #[test]
    fn test_inspect_preserves_order_and_defaults() {
        let c = callable(vec![
            ParameterSpec::annotated("item_id", "int"),
            ParameterSpec::annotated("q", "str | None").with_default("x"),
            ParameterSpec::untyped("raw"),
        ]);
        let signature = inspect(&c, &TypeNames::new()).unwrap();

        let names: Vec<_> = signature.params().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["item_id", "q", "raw"]);
        assert_eq!(signature.get("item_id").unwrap().declared, Some(TypeDesc::Int));
        assert_eq!(signature.get("q").unwrap().default, Some(Value::from("x")));
        assert_eq!(signature.get("raw").unwrap().declared, None);
        assert_eq!(signature.return_type(), Some("Response"));
        assert!(signature.is_async());
    }

    #[test]
    fn test_inspect_rejects_variadics() {
        for kind in [
            ParameterKind::VarPositional,
            ParameterKind::KeywordOnly,
            ParameterKind::VarKeyword,
        ] {
            let c = callable(vec![ParameterSpec::untyped("args").with_kind(kind)]);
            let err = inspect(&c, &TypeNames::new()).unwrap_err();
            assert!(matches!(err, NormalizationError::UnsupportedSignature { .. }));
        }
    }

    #[test]
    fn test_inspect_rejects_duplicates() {
        let c = callable(vec![ParameterSpec::untyped("a"), ParameterSpec::untyped("a")]);
        let err = inspect(&c, &TypeNames::new()).unwrap_err();
        assert!(matches!(err, NormalizationError::DuplicateParameter { .. }));
    }

    #[test]
    fn test_inspect_reports_unresolved_annotation() {
        let c = callable(vec![ParameterSpec::annotated("repo", "Repository")]);
        let err = inspect(&c, &TypeNames::new()).unwrap_err();
        match err {
            NormalizationError::UnresolvedAnnotation {
                parameter,
                annotation,
                ..
            } => {
                assert_eq!(parameter, "repo");
                assert_eq!(annotation, "Repository");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_type_hints_override_annotations() {
        let mut c = callable(vec![ParameterSpec::annotated("repo", "Repository")]);
        c.0.type_hints.insert("repo".to_string(), TypeDesc::Str);
        let signature = inspect(&c, &TypeNames::new()).unwrap();
        assert_eq!(signature.get("repo").unwrap().declared, Some(TypeDesc::Str));
    }
}

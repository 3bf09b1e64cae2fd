//! Textual annotations.
//!
//! Dynamic endpoints may declare parameter types as text, the way a host
//! runtime reports them: `int`, `Optional[str]`, `list[UUID] | None`,
//! `FromHeader[str]`. Names that are not built in are looked up in a
//! [`TypeNames`] table filled by the application.

use std::collections::HashMap;

use crate::types::{BoundKind, TypeDesc};

/// Application-registered type names for annotation text.
#[derive(Debug, Clone, Default)]
pub struct TypeNames {
    types: HashMap<String, TypeDesc>,
    wrappers: HashMap<String, BoundKind>,
}

impl TypeNames {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type name.
    pub fn insert(&mut self, name: impl Into<String>, desc: TypeDesc) {
        self.types.insert(name.into(), desc);
    }

    /// Registers the name of a custom bound-value wrapper.
    pub fn insert_wrapper(&mut self, name: impl Into<String>, kind: BoundKind) {
        self.wrappers.insert(name.into(), kind);
    }

    /// Looks up a type name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeDesc> {
        self.types.get(name)
    }

    fn wrapper(&self, name: &str) -> Option<&BoundKind> {
        self.wrappers.get(name)
    }
}

/// Why an annotation could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotationError {
    /// The text is not a well-formed annotation.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset of the problem.
        offset: usize,
        /// What was expected.
        message: String,
    },
    /// A name is neither built in nor registered.
    #[error("unknown type name '{0}'")]
    UnknownName(String),
    /// A generic received the wrong number of arguments.
    #[error("'{name}' takes {expected} type argument(s), got {got}")]
    Arity {
        /// The generic name.
        name: String,
        /// Expected argument count.
        expected: usize,
        /// Given argument count.
        got: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Open,
    Close,
    Comma,
    Pipe,
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token<'_>)>, AnnotationError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        match c {
            '[' => tokens.push((offset, Token::Open)),
            ']' => tokens.push((offset, Token::Close)),
            ',' => tokens.push((offset, Token::Comma)),
            '|' => tokens.push((offset, Token::Pipe)),
            c if c.is_whitespace() => {}
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut end = offset + c.len_utf8();
                while let Some(&(next, n)) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '.' {
                        end = next + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((offset, Token::Ident(&text[offset..end])));
            }
            other => {
                return Err(AnnotationError::Syntax {
                    offset,
                    message: format!("unexpected character '{other}'"),
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a, 'n> {
    tokens: Vec<(usize, Token<'a>)>,
    position: usize,
    end: usize,
    names: &'n TypeNames,
}

impl<'a> Parser<'a, '_> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.position).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map_or(self.end, |(offset, _)| *offset)
    }

    fn expect(&mut self, expected: &Token<'_>, what: &str) -> Result<(), AnnotationError> {
        if self.peek() == Some(expected) {
            self.position += 1;
            Ok(())
        } else {
            Err(AnnotationError::Syntax {
                offset: self.offset(),
                message: format!("expected {what}"),
            })
        }
    }

    fn union(&mut self) -> Result<TypeDesc, AnnotationError> {
        let mut members = vec![self.term()?];
        while self.peek() == Some(&Token::Pipe) {
            self.position += 1;
            members.push(self.term()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeDesc::Union(members)
        })
    }

    fn term(&mut self) -> Result<TypeDesc, AnnotationError> {
        let name = match self.peek() {
            Some(Token::Ident(name)) => *name,
            _ => {
                return Err(AnnotationError::Syntax {
                    offset: self.offset(),
                    message: "expected a type name".to_string(),
                })
            }
        };
        self.position += 1;

        let mut args = Vec::new();
        if self.peek() == Some(&Token::Open) {
            self.position += 1;
            args.push(self.union()?);
            while self.peek() == Some(&Token::Comma) {
                self.position += 1;
                args.push(self.union()?);
            }
            self.expect(&Token::Close, "']'")?;
        }
        self.resolve(name, args)
    }

    fn resolve(&self, name: &str, mut args: Vec<TypeDesc>) -> Result<TypeDesc, AnnotationError> {
        let short = name.rsplit('.').next().unwrap_or(name);
        let single = |args: &mut Vec<TypeDesc>, default: Option<TypeDesc>| {
            match (args.len(), default) {
                (0, Some(default)) => Ok(default),
                (1, _) => Ok(args.remove(0)),
                (got, _) => Err(AnnotationError::Arity {
                    name: name.to_string(),
                    expected: 1,
                    got,
                }),
            }
        };

        let no_args = |desc: TypeDesc, args: &[TypeDesc]| {
            if args.is_empty() {
                Ok(desc)
            } else {
                Err(AnnotationError::Arity {
                    name: name.to_string(),
                    expected: 0,
                    got: args.len(),
                })
            }
        };

        if let Some(desc) = plain_name(short) {
            return no_args(desc, &args);
        }

        let desc = match short {
            "dict" | "Dict" | "Mapping" => match args.len() {
                0 | 2 => TypeDesc::Any,
                got => {
                    return Err(AnnotationError::Arity {
                        name: name.to_string(),
                        expected: 2,
                        got,
                    })
                }
            },
            "Optional" => TypeDesc::optional(single(&mut args, None)?),
            "Union" => {
                if args.len() < 2 {
                    return Err(AnnotationError::Arity {
                        name: name.to_string(),
                        expected: 2,
                        got: args.len(),
                    });
                }
                TypeDesc::Union(args)
            }
            "list" | "List" | "Sequence" | "tuple" | "Tuple" => {
                TypeDesc::list(single(&mut args, Some(TypeDesc::Str))?)
            }
            "set" | "Set" | "frozenset" | "FrozenSet" => {
                TypeDesc::set(single(&mut args, Some(TypeDesc::Str))?)
            }
            "FromQuery" => TypeDesc::bound(BoundKind::Query, single(&mut args, None)?),
            "FromRoute" => TypeDesc::bound(BoundKind::Route, single(&mut args, None)?),
            "FromHeader" => TypeDesc::bound(BoundKind::Header, single(&mut args, None)?),
            "FromCookie" => TypeDesc::bound(BoundKind::Cookie, single(&mut args, None)?),
            "FromJson" | "FromJSON" => {
                TypeDesc::bound(BoundKind::Json, single(&mut args, Some(TypeDesc::Any))?)
            }
            "FromForm" => TypeDesc::bound(BoundKind::Form, single(&mut args, Some(TypeDesc::Any))?),
            "FromText" => TypeDesc::bound(BoundKind::Text, single(&mut args, Some(TypeDesc::Str))?),
            "FromBytes" => {
                TypeDesc::bound(BoundKind::Bytes, single(&mut args, Some(TypeDesc::Bytes))?)
            }
            "FromFiles" => TypeDesc::bound(
                BoundKind::Files,
                single(&mut args, Some(TypeDesc::list(TypeDesc::Bytes)))?,
            ),
            "FromServices" => TypeDesc::bound(BoundKind::Services, single(&mut args, None)?),
            other => {
                if let Some(kind) = self.names.wrapper(other) {
                    TypeDesc::bound(kind.clone(), single(&mut args, Some(TypeDesc::Str))?)
                } else if let Some(desc) = self.names.get(name).or_else(|| self.names.get(other)) {
                    no_args(desc.clone(), &args)?
                } else {
                    return Err(AnnotationError::UnknownName(name.to_string()));
                }
            }
        };
        Ok(desc)
    }
}

fn plain_name(short: &str) -> Option<TypeDesc> {
    let desc = match short {
        "str" => TypeDesc::Str,
        "int" => TypeDesc::Int,
        "float" => TypeDesc::Float,
        "bool" => TypeDesc::Bool,
        "bytes" => TypeDesc::Bytes,
        "UUID" => TypeDesc::Uuid,
        "None" | "NoneType" => TypeDesc::NoneType,
        "Any" | "object" => TypeDesc::Any,
        "Request" => TypeDesc::Request,
        "WebSocket" => TypeDesc::WebSocket,
        "Identity" => TypeDesc::Identity,
        "User" => TypeDesc::User,
        "ClientInfo" => TypeDesc::ClientInfo,
        "ServerInfo" => TypeDesc::ServerInfo,
        _ => return None,
    };
    Some(desc)
}

/// Parses annotation text into a type descriptor.
///
/// # Errors
///
/// Returns [`AnnotationError`] for malformed text, unknown names or wrong
/// generic arity.
///
/// # Example
///
/// ```rust
/// use merino_bind::{parse_annotation, TypeDesc, TypeNames};
///
/// let names = TypeNames::new();
/// let desc = parse_annotation("int | None", &names).unwrap();
/// assert!(desc.is_optional());
///
/// let desc = parse_annotation("Optional[list[str]]", &names).unwrap();
/// assert_eq!(desc, TypeDesc::optional(TypeDesc::list(TypeDesc::Str)));
/// ```
pub fn parse_annotation(text: &str, names: &TypeNames) -> Result<TypeDesc, AnnotationError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        end: text.len(),
        names,
    };
    let desc = parser.union()?;
    if parser.position != parser.tokens.len() {
        return Err(AnnotationError::Syntax {
            offset: parser.offset(),
            message: "unexpected trailing input".to_string(),
        });
    }
    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Catalog;

    fn parse(text: &str) -> Result<TypeDesc, AnnotationError> {
        parse_annotation(text, &TypeNames::new())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse("str").unwrap(), TypeDesc::Str);
        assert_eq!(parse("uuid.UUID").unwrap(), TypeDesc::Uuid);
        assert_eq!(parse("typing.List[int]").unwrap(), TypeDesc::list(TypeDesc::Int));
    }

    #[test]
    fn test_pipe_union() {
        assert_eq!(
            parse("int | str").unwrap(),
            TypeDesc::Union(vec![TypeDesc::Int, TypeDesc::Str])
        );
        assert_eq!(
            parse("Union[int, str, None]").unwrap(),
            TypeDesc::Union(vec![TypeDesc::Int, TypeDesc::Str, TypeDesc::NoneType])
        );
    }

    #[test]
    fn test_bare_collections_default_to_str() {
        assert_eq!(parse("list").unwrap(), TypeDesc::list(TypeDesc::Str));
        assert_eq!(parse("Set").unwrap(), TypeDesc::set(TypeDesc::Str));
    }

    #[test]
    fn test_bound_wrappers() {
        assert_eq!(
            parse("FromHeader[str]").unwrap(),
            TypeDesc::bound(BoundKind::Header, TypeDesc::Str)
        );
        assert_eq!(
            parse("FromJSON").unwrap(),
            TypeDesc::bound(BoundKind::Json, TypeDesc::Any)
        );
        assert_eq!(
            parse("FromQuery[Optional[int]]").unwrap(),
            TypeDesc::bound(BoundKind::Query, TypeDesc::optional(TypeDesc::Int))
        );
    }

    #[test]
    fn test_registered_names() {
        let mut names = TypeNames::new();
        names.insert("Catalog", TypeDesc::named::<Catalog>());
        names.insert_wrapper("FromTenant", BoundKind::Custom("tenant"));

        assert_eq!(
            parse_annotation("Catalog", &names).unwrap(),
            TypeDesc::named::<Catalog>()
        );
        assert_eq!(
            parse_annotation("FromTenant[str]", &names).unwrap(),
            TypeDesc::bound(BoundKind::Custom("tenant"), TypeDesc::Str)
        );
    }

    #[test]
    fn test_unknown_name_is_reported() {
        assert_eq!(
            parse("Catalog").unwrap_err(),
            AnnotationError::UnknownName("Catalog".to_string())
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse("list[int"), Err(AnnotationError::Syntax { .. })));
        assert!(matches!(parse("int str"), Err(AnnotationError::Syntax { .. })));
        assert!(matches!(parse("int | "), Err(AnnotationError::Syntax { .. })));
        assert!(matches!(parse("int!"), Err(AnnotationError::Syntax { offset: 3, .. })));
    }

    #[test]
    fn test_arity_errors() {
        assert!(matches!(
            parse("Optional[int, str]"),
            Err(AnnotationError::Arity { expected: 1, got: 2, .. })
        ));
        assert!(matches!(parse("Union[int]"), Err(AnnotationError::Arity { .. })));
    }

    #[test]
    fn test_plain_names_reject_type_arguments() {
        assert_eq!(
            parse("str[int]").unwrap_err(),
            AnnotationError::Arity {
                name: "str".to_string(),
                expected: 0,
                got: 1,
            }
        );
        assert!(matches!(
            parse("Optional[Request[str, int]]"),
            Err(AnnotationError::Arity { expected: 0, got: 2, .. })
        ));
        assert!(matches!(
            parse("uuid.UUID[str]"),
            Err(AnnotationError::Arity { expected: 0, .. })
        ));
        assert_eq!(parse("dict[str, int]").unwrap(), TypeDesc::Any);
        assert!(matches!(
            parse("dict[str]"),
            Err(AnnotationError::Arity { expected: 2, got: 1, .. })
        ));

        let mut names = TypeNames::new();
        names.insert("Catalog", TypeDesc::named::<Catalog>());
        assert!(matches!(
            parse_annotation("Catalog[int]", &names),
            Err(AnnotationError::Arity { expected: 0, got: 1, .. })
        ));
    }
}

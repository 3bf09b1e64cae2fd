//! Raw value sources and text conversion.
//!
//! Functions here read one kind of raw input from a [`Request`] (query
//! pairs, headers, cookies, body formats) and convert text into typed
//! [`Value`]s according to a [`TypeDesc`].

use std::io;

use bytes::Bytes;
use indexmap::IndexMap;
use merino_core::Request;
use uuid::Uuid;

use crate::error::{BindError, BindSource};
use crate::types::TypeDesc;
use crate::value::{FormPart, Value};

/// Default body size limit: 16 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM: &str = "multipart/form-data";

/// Parses a query string into ordered, possibly repeated, keys.
#[must_use]
pub fn parse_query(query: &str) -> IndexMap<String, Vec<String>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in pairs {
        grouped.entry(key).or_default().push(value);
    }
    grouped
}

/// All query values for `name`.
#[must_use]
pub fn query_values(request: &Request, name: &str) -> Option<Vec<String>> {
    let mut query = parse_query(request.query()?);
    query.shift_remove(name)
}

/// All header values for `name`.
///
/// Falls back to the name with underscores replaced by dashes, so a
/// parameter called `x_api_key` reads the `X-Api-Key` header.
#[must_use]
pub fn header_values(request: &Request, name: &str) -> Option<Vec<String>> {
    let collect = |key: &str| -> Option<Vec<String>> {
        let values: Vec<String> = request
            .headers()
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(ToString::to_string)
            .collect();
        (!values.is_empty()).then_some(values)
    };
    collect(name).or_else(|| {
        if name.contains('_') {
            collect(&name.replace('_', "-"))
        } else {
            None
        }
    })
}

/// The value of cookie `name`.
#[must_use]
pub fn cookie_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

/// Converts raw text values into a value of type `target`.
///
/// Scalars take the first value; lists and sets convert every value.
///
/// # Errors
///
/// Returns [`BindError::invalid_value`] when a value does not parse.
pub fn convert(raw: Vec<String>, target: &TypeDesc, source: BindSource, field: &str) -> Result<Value, BindError> {
    match target {
        TypeDesc::List(inner) => raw
            .iter()
            .map(|text| convert_scalar(text, inner, source, field))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        TypeDesc::Set(inner) => {
            let mut items: Vec<Value> = Vec::with_capacity(raw.len());
            for text in &raw {
                let item = convert_scalar(text, inner, source, field)?;
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            Ok(Value::List(items))
        }
        TypeDesc::Optional(inner) => convert(raw, inner, source, field),
        _ => match raw.first() {
            Some(text) => convert_scalar(text, target, source, field),
            None => Ok(Value::Null),
        },
    }
}

fn convert_scalar(text: &str, target: &TypeDesc, source: BindSource, field: &str) -> Result<Value, BindError> {
    let invalid = |expected: &str| {
        BindError::invalid_value(source, field, format!("expected {expected}, got '{text}'"))
    };
    match target {
        TypeDesc::Int => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| invalid("an integer")),
        TypeDesc::Float => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid("a number")),
        TypeDesc::Bool => parse_bool(text).map(Value::Bool).ok_or_else(|| invalid("a boolean")),
        TypeDesc::Uuid => Uuid::parse_str(text.trim())
            .map(Value::Uuid)
            .map_err(|_| invalid("a UUID")),
        TypeDesc::Bytes => Ok(Value::Bytes(Bytes::copy_from_slice(text.as_bytes()))),
        TypeDesc::Optional(inner) => convert_scalar(text, inner, source, field),
        _ => Ok(Value::Str(text.to_string())),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Converts a parsed JSON document into a value of type `target`.
///
/// Structured targets keep the document as [`Value::Json`].
///
/// # Errors
///
/// Returns [`BindError::invalid_value`] when a scalar target does not match.
pub fn convert_json(json: serde_json::Value, target: &TypeDesc, field: &str) -> Result<Value, BindError> {
    use serde_json::Value as J;
    let mismatch = |expected: &str, found: &J| {
        BindError::invalid_value(BindSource::Body, field, format!("expected {expected}, got {found}"))
    };
    match (target, json) {
        (TypeDesc::Optional(inner), json) => convert_json(json, inner, field),
        (_, J::Null) => Ok(Value::Null),
        (TypeDesc::Str, J::String(s)) => Ok(Value::Str(s)),
        (TypeDesc::Int, J::Number(n)) => n.as_i64().map(Value::Int).ok_or_else(|| mismatch("an integer", &J::Number(n))),
        (TypeDesc::Float, J::Number(n)) => n.as_f64().map(Value::Float).ok_or_else(|| mismatch("a number", &J::Number(n))),
        (TypeDesc::Bool, J::Bool(b)) => Ok(Value::Bool(b)),
        (TypeDesc::Uuid, J::String(s)) => Uuid::parse_str(&s)
            .map(Value::Uuid)
            .map_err(|_| mismatch("a UUID", &J::String(s.clone()))),
        (TypeDesc::List(inner) | TypeDesc::Set(inner), J::Array(items)) => items
            .into_iter()
            .map(|item| convert_json(item, inner, field))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (scalar, other) if scalar.is_scalar() => Err(mismatch(&scalar.to_string(), &other)),
        (_, other) => Ok(Value::Json(other)),
    }
}

fn check_size(request: &Request, limit: usize) -> Result<(), BindError> {
    let size = request.body().len();
    if size > limit {
        return Err(BindError::payload_too_large(limit, size));
    }
    Ok(())
}

/// Reads a JSON body.
///
/// An empty body yields `None`. A body without content type is parsed
/// anyway; a body with a non-JSON content type is rejected.
///
/// # Errors
///
/// Returns a [`BindError`] for oversized, mistyped or malformed bodies.
pub fn read_json(request: &Request, field: &str, limit: usize) -> Result<Option<serde_json::Value>, BindError> {
    if request.body().is_empty() {
        return Ok(None);
    }
    check_size(request, limit)?;
    if request.content_type().is_some() && !request.declares_json() {
        return Err(BindError::unsupported_media_type("application/json", request.content_type()));
    }
    serde_json::from_slice(request.body())
        .map(Some)
        .map_err(|e| BindError::deserialization_failed(field, e.to_string()))
}

/// Reads a URL-encoded or multipart form into a JSON object.
///
/// Repeated keys become arrays. File parts of a multipart body are skipped.
///
/// # Errors
///
/// Returns a [`BindError`] for oversized, mistyped or malformed bodies.
pub async fn read_form(request: &Request, field: &str, limit: usize) -> Result<Option<serde_json::Value>, BindError> {
    if request.body().is_empty() {
        return Ok(None);
    }
    check_size(request, limit)?;

    let pairs: Vec<(String, String)> = if request.declares_content_type(FORM_URLENCODED) {
        serde_urlencoded::from_bytes(request.body())
            .map_err(|e| BindError::deserialization_failed(field, e.to_string()))?
    } else if request.declares_content_type(MULTIPART_FORM) {
        read_multipart(request, field)
            .await?
            .into_iter()
            .filter(|part| part.file_name.is_none())
            .map(|part| {
                let text = String::from_utf8_lossy(&part.data).into_owned();
                (part.name, text)
            })
            .collect()
    } else {
        return Err(BindError::unsupported_media_type(FORM_URLENCODED, request.content_type()));
    };

    let mut object = serde_json::Map::new();
    for (key, value) in pairs {
        match object.get_mut(&key) {
            Some(serde_json::Value::Array(items)) => items.push(serde_json::Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = serde_json::Value::Array(vec![first, serde_json::Value::String(value)]);
            }
            None => {
                object.insert(key, serde_json::Value::String(value));
            }
        }
    }
    Ok(Some(serde_json::Value::Object(object)))
}

/// Reads a UTF-8 text body.
///
/// # Errors
///
/// Returns a [`BindError`] for oversized or non-UTF-8 bodies.
pub fn read_text(request: &Request, field: &str, limit: usize) -> Result<Option<String>, BindError> {
    if request.body().is_empty() {
        return Ok(None);
    }
    check_size(request, limit)?;
    std::str::from_utf8(request.body())
        .map(|text| Some(text.to_string()))
        .map_err(|e| BindError::deserialization_failed(field, e.to_string()))
}

/// Reads the raw body.
///
/// # Errors
///
/// Returns [`BindError::payload_too_large`] for oversized bodies.
pub fn read_bytes(request: &Request, limit: usize) -> Result<Option<Bytes>, BindError> {
    if request.body().is_empty() {
        return Ok(None);
    }
    check_size(request, limit)?;
    Ok(Some(request.body().clone()))
}

/// Reads the file parts of a multipart body.
///
/// # Errors
///
/// Returns a [`BindError`] for oversized, mistyped or malformed bodies.
pub async fn read_files(request: &Request, field: &str, limit: usize) -> Result<Option<Vec<FormPart>>, BindError> {
    if request.body().is_empty() {
        return Ok(None);
    }
    check_size(request, limit)?;
    if !request.declares_content_type(MULTIPART_FORM) {
        return Err(BindError::unsupported_media_type(MULTIPART_FORM, request.content_type()));
    }
    let files: Vec<FormPart> = read_multipart(request, field)
        .await?
        .into_iter()
        .filter(|part| part.file_name.is_some())
        .collect();
    Ok((!files.is_empty()).then_some(files))
}

async fn read_multipart(request: &Request, field: &str) -> Result<Vec<FormPart>, BindError> {
    let content_type = request.content_type().unwrap_or_default();
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| BindError::unsupported_media_type(MULTIPART_FORM, request.content_type()))?;

    let body = request.body().clone();
    let stream = futures_util::stream::once(async move { Ok::<_, io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let malformed = |e: multer::Error| BindError::deserialization_failed(field, e.to_string());
    let mut parts = Vec::new();
    while let Some(part) = multipart.next_field().await.map_err(malformed)? {
        let name = part.name().unwrap_or_default().to_string();
        let file_name = part.file_name().map(ToString::to_string);
        let content_type = part.content_type().map(mime::Mime::to_string);
        let data = part.bytes().await.map_err(malformed)?;
        parts.push(FormPart {
            name,
            file_name,
            content_type,
            data,
        });
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).build().unwrap()
    }

    fn body_request(content_type: &str, body: &'static str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("content-type", content_type)
            .body(body)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_query_groups_repeated_keys() {
        let query = parse_query("a=1&b=x&a=2&c=hello%20world");
        assert_eq!(query["a"], vec!["1", "2"]);
        assert_eq!(query["c"], vec!["hello world"]);
        assert_eq!(query.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_query_values_missing() {
        assert_eq!(query_values(&request("/x"), "q"), None);
        assert_eq!(query_values(&request("/x?p=1"), "q"), None);
        assert_eq!(query_values(&request("/x?q=hi"), "q"), Some(vec!["hi".to_string()]));
    }

    #[test]
    fn test_header_underscore_fallback() {
        let req = Request::builder()
            .uri("/")
            .header("x-api-key", "secret")
            .build()
            .unwrap();
        assert_eq!(header_values(&req, "x_api_key"), Some(vec!["secret".to_string()]));
        assert_eq!(header_values(&req, "authorization"), None);
    }

    #[test]
    fn test_cookie_value() {
        let req = Request::builder()
            .uri("/")
            .header("cookie", "session=abc; theme=\"dark\"")
            .build()
            .unwrap();
        assert_eq!(cookie_value(&req, "theme").as_deref(), Some("dark"));
        assert_eq!(cookie_value(&req, "session").as_deref(), Some("abc"));
        assert_eq!(cookie_value(&req, "missing"), None);
    }

    #[test]
    fn test_convert_scalars() {
        let one = |s: &str| vec![s.to_string()];
        assert_eq!(convert(one("42"), &TypeDesc::Int, BindSource::Query, "n").unwrap(), Value::Int(42));
        assert_eq!(convert(one("on"), &TypeDesc::Bool, BindSource::Query, "b").unwrap(), Value::Bool(true));
        assert_eq!(convert(one("2.5"), &TypeDesc::Float, BindSource::Query, "f").unwrap(), Value::Float(2.5));
        assert!(convert(one("abc"), &TypeDesc::Int, BindSource::Query, "n").is_err());
        assert!(convert(one("nope"), &TypeDesc::Uuid, BindSource::Route, "id").is_err());
    }

    #[test]
    fn test_convert_collections() {
        let raw = vec!["1".to_string(), "2".to_string(), "1".to_string()];
        assert_eq!(
            convert(raw.clone(), &TypeDesc::list(TypeDesc::Int), BindSource::Query, "n").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(1)])
        );
        assert_eq!(
            convert(raw, &TypeDesc::set(TypeDesc::Int), BindSource::Query, "n").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_convert_json_targets() {
        let json = serde_json::json!({"a": 1});
        assert_eq!(
            convert_json(json.clone(), &TypeDesc::Any, "body").unwrap(),
            Value::Json(json)
        );
        assert_eq!(
            convert_json(serde_json::json!([1, 2]), &TypeDesc::list(TypeDesc::Int), "ids").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert!(convert_json(serde_json::json!("x"), &TypeDesc::Int, "n").is_err());
    }

    #[test]
    fn test_read_json() {
        let req = body_request("application/json", r#"{"name":"x"}"#);
        assert_eq!(
            read_json(&req, "body", DEFAULT_MAX_BODY_SIZE).unwrap(),
            Some(serde_json::json!({"name": "x"}))
        );

        let empty = request("/");
        assert_eq!(read_json(&empty, "body", DEFAULT_MAX_BODY_SIZE).unwrap(), None);

        let wrong = body_request("text/plain", "{}");
        assert!(read_json(&wrong, "body", DEFAULT_MAX_BODY_SIZE).is_err());

        let broken = body_request("application/json", "{");
        assert!(read_json(&broken, "body", DEFAULT_MAX_BODY_SIZE).is_err());
    }

    #[test]
    fn test_body_limit() {
        let req = body_request("application/json", "[1,2,3]");
        let err = read_json(&req, "body", 3).unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_read_urlencoded_form() {
        let req = body_request(FORM_URLENCODED, "name=ada&tag=a&tag=b");
        let form = read_form(&req, "form", DEFAULT_MAX_BODY_SIZE).await.unwrap().unwrap();
        assert_eq!(form, serde_json::json!({"name": "ada", "tag": ["a", "b"]}));
    }

    #[tokio::test]
    async fn test_read_multipart_files_and_fields() {
        let body = "--XYZ\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
hello\r\n\
--XYZ\r\n\
Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\r\n\
file body\r\n\
--XYZ--\r\n";
        let req = body_request("multipart/form-data; boundary=XYZ", body);

        let files = read_files(&req, "files", DEFAULT_MAX_BODY_SIZE).await.unwrap().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name.as_deref(), Some("a.txt"));
        assert_eq!(files[0].text(), Some("file body"));

        let form = read_form(&req, "form", DEFAULT_MAX_BODY_SIZE).await.unwrap().unwrap();
        assert_eq!(form, serde_json::json!({"title": "hello"}));
    }
}

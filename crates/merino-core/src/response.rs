//! Response type and conversions.
//!
//! Handlers may return anything implementing [`IntoResponse`]: a ready
//! [`Response`], text, [`Json`], a status code, a [`FileResponse`], or a
//! `Result` of those with an error that itself converts. Streamed bodies are
//! built with [`stream_response`].

use bytes::Bytes;
use futures_util::Stream;
use http::header::{self, HeaderValue};
use http::StatusCode;
use serde::Serialize;

use crate::body::{self, Body};
use crate::error::MerinoError;

/// The HTTP response type produced by handlers and middleware.
pub type Response = http::Response<Body>;

/// Conversion into a [`Response`].
pub trait IntoResponse {
    /// Converts `self` into a response.
    fn into_response(self) -> Response;
}

/// Builds a response from a status, a static content type and a body.
#[must_use]
pub fn response_with(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response {
    let mut response = Response::new(body::full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Builds a `200 OK` response whose body is written chunk by chunk.
///
/// ```rust
/// use bytes::Bytes;
/// use futures_util::stream;
///
/// let chunks = stream::iter(vec![Bytes::from("a\n"), Bytes::from("b\n")]);
/// let response = merino_core::stream_response("text/plain; charset=utf-8", chunks);
/// assert_eq!(response.headers()["content-type"], "text/plain; charset=utf-8");
/// ```
#[must_use]
pub fn stream_response<S>(content_type: &'static str, chunks: S) -> Response
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    let mut response = Response::new(body::from_stream(chunks));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Extension methods for building error responses.
pub trait ResponseExt {
    /// A JSON error envelope response for `error`.
    fn from_error(error: &MerinoError, request_id: Option<&str>, show_details: bool) -> Response;
}

impl ResponseExt for Response {
    fn from_error(error: &MerinoError, request_id: Option<&str>, show_details: bool) -> Response {
        let envelope = error.to_envelope(request_id, show_details);
        let body = serde_json::to_vec(&envelope).unwrap_or_default();
        response_with(error.status_code(), "application/json", body)
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for MerinoError {
    fn into_response(self) -> Response {
        Response::from_error(&self, None, false)
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(error) => error.into_response(),
        }
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        NoContent.into_response()
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut response = Response::new(body::empty());
        *response.status_mut() = self;
        response
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        response_with(StatusCode::OK, "text/plain; charset=utf-8", self)
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        response_with(StatusCode::OK, "text/plain; charset=utf-8", self)
    }
}

impl IntoResponse for Bytes {
    fn into_response(self) -> Response {
        response_with(StatusCode::OK, "application/octet-stream", self)
    }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl<T: IntoResponse> IntoResponse for (StatusCode, T) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;
        response
    }
}

/// A JSON response body.
///
/// ```rust
/// use merino_core::{IntoResponse, Json};
///
/// let response = Json(serde_json::json!({"id": 1})).into_response();
/// assert_eq!(response.status(), 200);
/// ```
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => response_with(StatusCode::OK, "application/json", body),
            Err(err) => MerinoError::internal_with_source("response serialization failed", err)
                .into_response(),
        }
    }
}

/// An empty `204 No Content` response.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// A redirect response.
#[derive(Debug, Clone)]
pub struct Redirect {
    status: StatusCode,
    location: String,
}

impl Redirect {
    /// `302 Found`.
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            location: location.into(),
        }
    }

    /// `301 Moved Permanently`.
    #[must_use]
    pub fn permanent(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::MOVED_PERMANENTLY,
            location: location.into(),
        }
    }

    /// `303 See Other`.
    #[must_use]
    pub fn see_other(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SEE_OTHER,
            location: location.into(),
        }
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        match HeaderValue::from_str(&self.location) {
            Ok(location) => {
                response.headers_mut().insert(header::LOCATION, location);
                response
            }
            Err(err) => MerinoError::internal_with_source("invalid redirect location", err)
                .into_response(),
        }
    }
}

/// How a browser should present a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentDisposition {
    /// Display in the browser.
    #[default]
    Inline,
    /// Offer as a download.
    Attachment,
}

/// A file response with an explicit content type.
///
/// ```rust
/// use merino_core::{ContentDisposition, FileResponse, IntoResponse};
///
/// let response = FileResponse::new("a,b\n1,2\n", "text/csv")
///     .with_file_name("report.csv")
///     .with_disposition(ContentDisposition::Attachment)
///     .into_response();
///
/// assert_eq!(
///     response.headers()["content-disposition"],
///     "attachment; filename=\"report.csv\""
/// );
/// ```
#[derive(Debug, Clone)]
pub struct FileResponse {
    data: Bytes,
    content_type: String,
    file_name: Option<String>,
    disposition: ContentDisposition,
}

impl FileResponse {
    /// Creates a file response.
    #[must_use]
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            file_name: None,
            disposition: ContentDisposition::Inline,
        }
    }

    /// Sets the suggested file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the content disposition.
    #[must_use]
    pub fn with_disposition(mut self, disposition: ContentDisposition) -> Self {
        self.disposition = disposition;
        self
    }

    fn disposition_header(&self) -> String {
        let kind = match self.disposition {
            ContentDisposition::Inline => "inline",
            ContentDisposition::Attachment => "attachment",
        };
        match &self.file_name {
            Some(name) => format!("{kind}; filename=\"{}\"", name.replace('"', "")),
            None => kind.to_string(),
        }
    }
}

impl IntoResponse for FileResponse {
    fn into_response(self) -> Response {
        let disposition = self.disposition_header();
        let mut response = Response::new(body::full(self.data));
        let headers = response.headers_mut();
        match HeaderValue::from_str(&self.content_type) {
            Ok(value) => {
                headers.insert(header::CONTENT_TYPE, value);
            }
            Err(err) => {
                return MerinoError::internal_with_source("invalid content type", err).into_response();
            }
        }
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_string_response() {
        let response = "hello".to_string().into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_of(response).await, "hello");
    }

    #[tokio::test]
    async fn test_json_response() {
        let response = Json(vec![1, 2]).into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_of(response).await, "[1,2]");
    }

    #[test]
    fn test_unit_is_no_content() {
        assert_eq!(().into_response().status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_status_tuple_overrides_status() {
        let response = (StatusCode::CREATED, "made").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_error_result_uses_envelope() {
        let result: Result<String, MerinoError> = Err(MerinoError::not_found("no item"));
        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn test_redirect_sets_location() {
        let response = Redirect::see_other("/login").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_stream_response_body() {
        let chunks = futures_util::stream::iter(vec![Bytes::from("{\"n\":1}\n"), Bytes::from("{\"n\":2}\n")]);
        let response = stream_response("application/x-ndjson", chunks);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/x-ndjson");
        assert_eq!(body_of(response).await, "{\"n\":1}\n{\"n\":2}\n");
    }

    #[test]
    fn test_inline_file_without_name() {
        let response = FileResponse::new("x", "text/plain").into_response();
        assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline");
    }
}

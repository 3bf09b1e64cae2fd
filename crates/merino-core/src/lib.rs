//! # Merino Core
//!
//! Core types shared by every Merino crate:
//!
//! - [`Request`] - Buffered request with route values and caller identity
//! - [`Response`] and [`IntoResponse`] - Handler return values
//! - [`body::Body`] and [`ServerSentEvent`] - Buffered and streamed bodies
//! - [`Identity`] and [`User`] - Caller claims
//! - [`di::Container`] - Services looked up by type or name
//! - [`MerinoError`] - Request-time errors and their JSON envelope
//! - [`Handler`] and [`Next`] - The canonical `(request) -> response` shape

#![doc(html_root_url = "https://docs.rs/merino-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod body;
pub mod di;
mod error;
mod handler;
mod identity;
mod request;
mod response;
mod sse;
mod websocket;

pub use error::{ErrorDetail, ErrorEnvelope, MerinoError, MerinoResult};
pub use handler::{handler_fn, BoxFuture, FnHandler, Handler, HandlerResult, Next};
pub use identity::{Identity, User};
pub use request::{ClientInfo, Request, RequestBuilder, RequestId, ServerInfo};
pub use response::{
    response_with, stream_response, ContentDisposition, FileResponse, IntoResponse, Json, NoContent,
    Redirect, Response, ResponseExt,
};
pub use sse::ServerSentEvent;
pub use websocket::WebSocket;

pub use merino_router::Params;

//! Built-in middleware.

pub mod default_headers;
pub mod request_id;

pub use default_headers::{DefaultHeadersMiddleware, InvalidHeader};
pub use request_id::{RequestIdMiddleware, REQUEST_ID_HEADER};

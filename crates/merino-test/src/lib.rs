//! # Merino Test
//!
//! In-memory testing for Merino applications: no sockets, no ports.
//!
//! ```ignore
//! use merino_test::TestClient;
//!
//! let client = TestClient::new(app)?;
//! let response = client
//!     .post("/items")
//!     .json(&serde_json::json!({"name": "widget"}))
//!     .send()
//!     .await?;
//! response.assert_status(http::StatusCode::CREATED);
//! ```

#![doc(html_root_url = "https://docs.rs/merino-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::TestRequestBuilder;
pub use response::TestResponse;

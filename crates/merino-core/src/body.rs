//! Response bodies.
//!
//! A [`Body`] is either buffered, built with [`full`] or [`empty`], or
//! produced chunk by chunk from a stream with [`from_stream`].

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};

/// Error type carried by response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The body of a [`Response`](crate::Response).
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// A buffered body.
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into()).map_err(|never| match never {}).boxed_unsync()
}

/// A body without content.
pub fn empty() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync()
}

/// A body whose chunks come from `chunks`, in order.
pub fn from_stream<S>(chunks: S) -> Body
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    StreamBody::new(chunks.map(|chunk| Ok::<_, BoxError>(Frame::data(chunk)))).boxed_unsync()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_stream_body_concatenates_chunks() {
        let body = from_stream(stream::iter(vec![Bytes::from("a"), Bytes::from("b")]));
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, "ab");
    }

    #[tokio::test]
    async fn test_empty_body() {
        assert!(empty().collect().await.unwrap().to_bytes().is_empty());
    }
}

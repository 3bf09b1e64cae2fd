//! Response types for streaming handlers.
//!
//! A streaming handler yields items of one type. [`StreamTypes`] maps that
//! type to the encoder that turns the items into a response. A handler whose
//! item type has no encoder fails normalization when the application starts.
//!
//! | Item                | Content type                | Each item becomes        |
//! |---------------------|-----------------------------|--------------------------|
//! | `ServerSentEvent`   | `text/event-stream`         | the event's wire form    |
//! | `String`            | `text/plain; charset=utf-8` | the text                 |
//! | `Bytes`             | `application/octet-stream`  | the bytes                |
//! | `serde_json::Value` | `application/x-ndjson`      | one JSON line            |

use std::collections::HashMap;
use std::fmt;
use std::future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use merino_bind::{ItemStream, TypeKey};
use merino_core::{stream_response, Response, ServerSentEvent};

/// Turns a stream of yielded items into a response.
pub type StreamEncoder = Arc<dyn Fn(ItemStream) -> Response + Send + Sync>;

/// Encoders for the item types streaming handlers may yield.
#[derive(Clone)]
pub struct StreamTypes {
    encoders: HashMap<TypeKey, StreamEncoder>,
}

impl StreamTypes {
    /// A registry without encoders.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            encoders: HashMap::new(),
        }
    }

    /// Registers the encoder for streams of `T`, replacing any earlier one.
    pub fn register<T, F>(&mut self, encode: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn(BoxStream<'static, T>) -> Response + Send + Sync + 'static,
    {
        let encoder: StreamEncoder = Arc::new(move |items: ItemStream| {
            let typed = items
                .filter_map(|item| future::ready(item.downcast::<T>().ok().map(|item| *item)))
                .boxed();
            encode(typed)
        });
        self.encoders.insert(TypeKey::of::<T>(), encoder);
        self
    }

    /// Registers a chunked encoder: each item becomes one body chunk.
    pub fn register_chunked<T>(&mut self, content_type: &'static str, chunk: fn(T) -> Bytes) -> &mut Self
    where
        T: Send + 'static,
    {
        self.register::<T, _>(move |items| stream_response(content_type, items.map(chunk)))
    }

    /// Whether streams of `T` can be encoded.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.encoders.contains_key(&TypeKey::of::<T>())
    }

    /// The encoder for `item`.
    #[must_use]
    pub fn encoder(&self, item: &TypeKey) -> Option<&StreamEncoder> {
        self.encoders.get(item)
    }
}

impl Default for StreamTypes {
    fn default() -> Self {
        let mut types = Self::empty();
        types
            .register_chunked::<ServerSentEvent>("text/event-stream", |event| event.to_bytes())
            .register_chunked::<String>("text/plain; charset=utf-8", Bytes::from)
            .register_chunked::<Bytes>("application/octet-stream", |bytes| bytes)
            .register_chunked::<serde_json::Value>("application/x-ndjson", ndjson_line);
        types
    }
}

fn ndjson_line(value: serde_json::Value) -> Bytes {
    let mut line = value.to_string();
    line.push('\n');
    Bytes::from(line)
}

impl fmt::Debug for StreamTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.encoders.keys().map(TypeKey::short_name).collect();
        names.sort_unstable();
        f.debug_struct("StreamTypes").field("items", &names).finish()
    }
}

//! End-to-end tests for handlers that respond with a stream of items.

use futures_util::stream::{self, Stream};
use http::StatusCode;
use merino::prelude::*;
use merino_test::TestClient;
use serde_json::json;

fn ticks(FromQuery(count): FromQuery<i64>) -> impl Stream<Item = ServerSentEvent> {
    stream::iter((1..=count).map(|n| ServerSentEvent::new(format!("tick {n}")).id(n.to_string())))
}

fn rows(category: String) -> impl Stream<Item = serde_json::Value> {
    stream::unfold(0_u32, move |n| {
        let category = category.clone();
        async move { (n < 2).then(|| (json!({ "category": category, "row": n }), n + 1)) }
    })
}

fn client() -> TestClient {
    let mut app = Application::new();
    app.get("/ticks", stream_endpoint(ticks).params(["count"])).unwrap();
    app.get("/rows/{category}", stream_endpoint(rows).params(["category"])).unwrap();
    TestClient::new(app).unwrap()
}

#[tokio::test]
async fn test_server_sent_events() {
    let client = client();
    let response = client.get("/ticks?count=2").send().await.unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.content_type(), Some("text/event-stream"));
    assert_eq!(response.text().unwrap(), "id: 1\ndata: tick 1\n\nid: 2\ndata: tick 2\n\n");
}

#[tokio::test]
async fn test_json_lines_from_async_stream() {
    let client = client();
    let response = client.get("/rows/tools").send().await.unwrap();
    assert_eq!(response.content_type(), Some("application/x-ndjson"));
    assert_eq!(
        response.text().unwrap(),
        "{\"category\":\"tools\",\"row\":0}\n{\"category\":\"tools\",\"row\":1}\n"
    );
}

#[tokio::test]
async fn test_stream_arguments_are_bound_before_streaming() {
    let client = client();
    let response = client.get("/ticks?count=lots").send().await.unwrap();
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code().as_deref(), Some("BAD_REQUEST"));
}

#[tokio::test]
async fn test_dynamic_streaming_endpoint() {
    let mut app = Application::new();
    let chunks = DynEndpoint::streaming(
        "chunks",
        vec![ParameterSpec::annotated("word", "str")],
        |args: Vec<Value>| {
            let word = args[0].as_str().unwrap_or_default().to_string();
            stream::iter(vec![word.clone(), "-".to_string(), word])
        },
    );
    app.get("/chunks", chunks).unwrap();
    let client = TestClient::new(app).unwrap();

    let response = client.get("/chunks?word=ab").send().await.unwrap();
    assert_eq!(response.content_type(), Some("text/plain; charset=utf-8"));
    assert_eq!(response.text().unwrap(), "ab-ab");
}

//! Start-time validation of handler signatures.

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use http::StatusCode;
use merino::prelude::*;
use merino::{NormalizationError, StartupError};
use merino_test::TestClient;
use serde_json::Value as JsonValue;

async fn two_bodies(FromJson(_a): FromJson<JsonValue>, FromJson(_b): FromJson<JsonValue>) -> &'static str {
    "unreachable"
}

async fn wrong_segment(FromRoute(_slug): FromRoute<String>) -> &'static str {
    "unreachable"
}

async fn takes_next(_next: Next) -> &'static str {
    "unreachable"
}

fn start_error(app: Application) -> NormalizationError {
    match TestClient::new(app) {
        Err(merino_test::TestError::Startup(err)) => err.normalization().cloned().unwrap(),
        other => panic!("expected a startup error, got {other:?}"),
    }
}

#[test]
fn test_two_body_parameters_are_ambiguous() {
    let mut app = Application::new();
    app.post("/merge", endpoint(two_bodies).params(["a", "b"])).unwrap();

    let err = start_error(app);
    assert!(matches!(
        err,
        NormalizationError::AmbiguousSignature { ref first, ref second, .. } if first == "a" && second == "b"
    ));
}

#[test]
fn test_wide_union_fails_fast() {
    let mut app = Application::new();
    let ep = DynEndpoint::new(
        "lookup",
        vec![ParameterSpec::annotated("key", "int | str | None")],
        |_args| async { Ok(().into_response()) },
    );
    app.get("/lookup", ep).unwrap();

    let err = start_error(app);
    assert!(matches!(err, NormalizationError::UnsupportedUnion { ref parameter, .. } if parameter == "key"));
}

#[test]
fn test_route_parameter_must_match_segment() {
    let mut app = Application::new();
    app.get("/posts/{id}", endpoint(wrong_segment).params(["slug"])).unwrap();

    let err = start_error(app);
    assert!(matches!(
        err,
        NormalizationError::RouteBinderMismatch { ref parameter, ref route, .. }
            if parameter == "slug" && route == "/posts/{id}"
    ));
}

#[test]
fn test_next_in_route_has_no_binder() {
    let mut app = Application::new();
    app.get("/", endpoint(takes_next).params(["next"])).unwrap();

    let err = start_error(app);
    assert!(matches!(err, NormalizationError::NoMatchingBinder { .. }));
}

#[test]
fn test_wrong_parameter_name_count() {
    let mut app = Application::new();
    app.get("/", endpoint(wrong_segment).params(["a", "b"])).unwrap();

    let err = start_error(app);
    assert!(matches!(
        err,
        NormalizationError::ParameterNames {
            expected: 1,
            declared: 2,
            ..
        }
    ));
}

#[test]
fn test_blocking_endpoint_is_rejected() {
    let mut app = Application::new();
    app.get("/sync", DynEndpoint::blocking("sync_handler", vec![], |_args| Ok(().into_response())))
        .unwrap();

    let err = start_error(app);
    assert!(matches!(err, NormalizationError::NotAsync { .. }));
}

fn sizes() -> impl Stream<Item = u64> {
    stream::iter(vec![1_u64, 2, 3])
}

#[tokio::test]
async fn test_stream_item_without_encoder_fails_start() {
    let mut app = Application::new();
    app.get("/sizes", stream_endpoint(sizes)).unwrap();

    let err = app.start().unwrap_err();
    assert!(matches!(
        err.normalization(),
        Some(NormalizationError::StreamItemUnregistered { item, .. }) if item == "u64"
    ));
    assert!(err.to_string().contains("GET /sizes"));

    app.streams_mut()
        .register_chunked::<u64>("text/plain", |n| Bytes::from(n.to_string()));
    let client = TestClient::new(app).unwrap();
    let response = client.get("/sizes").send().await.unwrap();
    assert_eq!(response.text().unwrap(), "123");
}

#[test]
fn test_stream_without_declared_item_fails_start() {
    let mut app = Application::new();
    let feed = DynEndpoint::streaming("feed", vec![], |_args| stream::iter(vec![String::new()])).with_stream_item(None);
    app.get("/feed", feed).unwrap();

    let err = start_error(app);
    assert_eq!(
        err,
        NormalizationError::StreamItemUndeclared {
            callable: "feed".to_string()
        }
    );
}

#[test]
fn test_invalid_middleware_fails_start() {
    let mut app = Application::new();
    app.middleware(DynEndpoint::blocking("sync_mw", vec![], |_args| Ok(().into_response())));

    match TestClient::new(app) {
        Err(merino_test::TestError::Startup(StartupError::Middleware { name, .. })) => assert_eq!(name, "sync_mw"),
        other => panic!("expected a middleware error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_routes_added_after_start_are_served_after_restart() {
    async fn late() -> &'static str {
        "late"
    }

    let mut app = Application::new();
    app.start().unwrap();
    app.get("/late", endpoint(late)).unwrap();
    app.start().unwrap();

    let client = TestClient::new(app).unwrap();
    let response = client.get("/late").send().await.unwrap();
    response.assert_status(StatusCode::OK);
}

//! End-to-end chain tests.
//!
//! These tests compose the built-in stages with custom middleware around a
//! handler and check ordering, header handling and short-circuiting.

use std::sync::Arc;

use http::StatusCode;
use merino_core::{handler_fn, Handler, IntoResponse, MerinoError, Next, Request};
use merino_middleware::stages::{DefaultHeadersMiddleware, RequestIdMiddleware, REQUEST_ID_HEADER};
use merino_middleware::{compose, BoxedMiddleware, FnMiddleware};

fn handler() -> Arc<dyn Handler> {
    Arc::new(handler_fn(|request: Request| async move {
        Ok(format!("hello {}", request.path()).into_response())
    }))
}

fn default_headers() -> BoxedMiddleware {
    Arc::new(
        DefaultHeadersMiddleware::from_pairs([
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "DENY"),
        ])
        .unwrap(),
    )
}

fn request(path: &str) -> Request {
    Request::builder().uri(path).build().unwrap()
}

#[tokio::test]
async fn test_builtin_stages_decorate_response() {
    let chain = compose(&[default_headers(), Arc::new(RequestIdMiddleware::new())], handler());

    let req = request("/world");
    let id = req.id().to_string();
    let response = chain.call(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()[REQUEST_ID_HEADER], id.as_str());
}

#[tokio::test]
async fn test_short_circuit_skips_handler_and_later_middleware() {
    let guard: BoxedMiddleware = Arc::new(FnMiddleware::new("guard", |request: Request, next: Next| async move {
        if request.header("authorization").is_none() {
            return Err(MerinoError::unauthorized("missing credentials"));
        }
        next.run(request).await
    }));
    let chain = compose(&[guard, default_headers()], handler());

    let err = chain.call(request("/private")).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

    let authorized = Request::builder()
        .uri("/private")
        .header("authorization", "Bearer t")
        .build()
        .unwrap();
    let response = chain.call(authorized).await.unwrap();
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_chain_is_reusable_across_requests() {
    let chain = compose(&[default_headers()], handler());
    for path in ["/a", "/b", "/c"] {
        let response = chain.call(request(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

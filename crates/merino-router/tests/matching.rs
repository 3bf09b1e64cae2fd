//! Property tests for route matching.

use http::Method;
use merino_router::Router;
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,12}"
}

proptest! {
    #[test]
    fn param_route_captures_any_segment(value in segment()) {
        let mut router = Router::new();
        router.insert(Method::GET, "/items/{item_id}", ()).unwrap();

        let path = format!("/items/{value}");
        let found = router.at(&Method::GET, &path).unwrap();
        prop_assert_eq!(found.params.get("item_id"), Some(value.as_str()));
    }

    #[test]
    fn static_route_wins_over_param(value in segment()) {
        let mut router = Router::new();
        router.insert(Method::GET, "/items/{item_id}", "param").unwrap();
        router.insert(Method::GET, &format!("/items/{value}"), "static").unwrap();

        let found = router.at(&Method::GET, &format!("/items/{value}")).unwrap();
        prop_assert_eq!(*found.value, "static");
        prop_assert!(found.params.is_empty());
    }

    #[test]
    fn catch_all_collects_remaining_path(parts in prop::collection::vec(segment(), 1..5)) {
        let mut router = Router::new();
        router.insert(Method::GET, "/static/*path", ()).unwrap();

        let tail = parts.join("/");
        let found = router.at(&Method::GET, &format!("/static/{tail}")).unwrap();
        prop_assert_eq!(found.params.get("path"), Some(tail.as_str()));
    }
}

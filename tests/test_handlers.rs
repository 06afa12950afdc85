//! Handler registration and routing order.

use porthole::http::request::{Method, Request, RequestBuilder, RequestHead};
use porthole::{Response, Server, ServerError};

fn head(method: Method, target: &str) -> RequestHead {
    RequestBuilder::new()
        .method(method)
        .target(target)
        .header("Host", "localhost")
        .build()
        .unwrap()
}

#[test]
fn test_add_and_remove_handlers() {
    let mut server = Server::new();

    server
        .add_handler(Method::GET, "/test", |_| {
            Some(Response::html("<html><body><p>Hello World</p></body></html>"))
        })
        .unwrap();
    assert_eq!(server.handlers_count(), 1);

    assert!(server.route(&head(Method::GET, "/test")).is_some());
    assert!(server.route(&head(Method::POST, "/test")).is_none());

    server.remove_all_handlers();

    assert_eq!(server.handlers_count(), 0);
    assert!(server.route(&head(Method::GET, "/test")).is_none());
}

#[test]
fn test_method_mismatch_never_matches() {
    let mut server = Server::new();
    server.add_handler(Method::POST, "^/upload$", |_| None).unwrap();

    for method in [Method::GET, Method::PUT, Method::HEAD] {
        assert!(server.route(&head(method, "/upload")).is_none());
    }
    assert!(server.route(&head(Method::POST, "/upload")).is_some());
}

#[test]
fn test_most_recent_registration_wins() {
    let mut server = Server::new();

    server.add_matched_handler(
        |head: &RequestHead| {
            (head.path == "/same").then(|| Request::new(head.clone()))
        },
        |_, completion| completion.respond(Response::text("first")),
    );
    server.add_matched_handler(
        |head: &RequestHead| {
            (head.path == "/same").then(|| Request::buffered(head.clone()))
        },
        |_, completion| completion.respond(Response::text("second")),
    );

    // Only the second matcher builds buffered requests.
    let request = server.route(&head(Method::GET, "/same")).unwrap();
    assert_eq!(request.body(), Some(&b""[..]));
}

#[test]
fn test_earlier_handler_still_serves_what_later_ones_decline() {
    let mut server = Server::new();
    server.add_handler(Method::GET, "^/", |_| None).unwrap();
    server.add_handler(Method::GET, "^/api/", |_| None).unwrap();

    assert!(server.route(&head(Method::GET, "/api/users")).is_some());
    assert!(server.route(&head(Method::GET, "/index.html")).is_some());
}

#[test]
fn test_matcher_sees_query_and_headers() {
    let mut server = Server::new();
    server.add_matched_handler(
        |head: &RequestHead| {
            let wants_json = head.headers.get("accept") == Some("application/json");
            let has_key = head.query.contains_key("k1");
            (wants_json && has_key).then(|| Request::new(head.clone()))
        },
        |_, completion| completion.complete(None),
    );

    let plain = head(Method::GET, "/test?k1=v1");
    assert!(server.route(&plain).is_none());

    let json = RequestBuilder::new()
        .method(Method::GET)
        .target("/test?k1=v1")
        .header("Accept", "application/json")
        .build()
        .unwrap();
    assert!(server.route(&json).is_some());
}

#[test]
fn test_invalid_pattern_registers_nothing() {
    let mut server = Server::new();
    let result = server.add_handler(Method::GET, "([", |_| None);

    assert!(matches!(result, Err(ServerError::InvalidPattern { .. })));
    assert_eq!(server.handlers_count(), 0);
}

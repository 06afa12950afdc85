use porthole::http::parser::{ParseError, find_headers_end, parse_request_head};
use porthole::http::request::Method;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let parsed = parse_request_head(req).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
}

#[test]
fn test_parse_ignores_bytes_after_terminator() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let parsed = parse_request_head(req).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.path, "/api");
    assert_eq!(parsed.headers.get("Content-Length"), Some("5"));
    assert_eq!(find_headers_end(req), Some(req.len() - 5 - 4));
}

#[test]
fn test_parse_multiple_headers() {
    let req = b"GET /path HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test-client\r\nAccept: */*\r\n\r\n";
    let parsed = parse_request_head(req).unwrap();

    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(parsed.headers.get("User-Agent").unwrap(), "test-client");
    assert_eq!(parsed.headers.get("Accept").unwrap(), "*/*");
}

#[test]
fn test_parse_headers_case_insensitive_lookup() {
    let req = b"GET / HTTP/1.1\r\ncontent-type: application/json\r\n\r\n";
    let parsed = parse_request_head(req).unwrap();

    assert_eq!(parsed.headers.get("Content-Type"), Some("application/json"));
}

#[test]
fn test_parse_request_with_path_and_query_string() {
    let req = b"GET /search?q=rust&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let parsed = parse_request_head(req).unwrap();

    assert_eq!(parsed.path, "/search");
    assert_eq!(parsed.query.get("q").map(String::as_str), Some("rust"));
    assert_eq!(parsed.query.get("page").map(String::as_str), Some("2"));
    assert_eq!(parsed.url.as_str(), "http://example.com/search?q=rust&page=2");
}

#[test]
fn test_parse_decodes_path_and_query() {
    let req = b"GET /files/my%20doc.txt?name=a%2Bb+c HTTP/1.1\r\n\r\n";
    let parsed = parse_request_head(req).unwrap();

    assert_eq!(parsed.path, "/files/my doc.txt");
    assert_eq!(parsed.query.get("name").map(String::as_str), Some("a+b c"));
}

#[test]
fn test_parse_without_host_falls_back_to_localhost() {
    let parsed = parse_request_head(b"GET /x HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(parsed.url.host_str(), Some("localhost"));
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    let result = parse_request_head(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_invalid_http_method() {
    let req = b"INVALID / HTTP/1.1\r\n\r\n";
    let result = parse_request_head(req);

    assert!(matches!(result, Err(ParseError::InvalidMethod)));
}

#[test]
fn test_parse_malformed_request_line() {
    assert!(matches!(
        parse_request_head(b"GET /\r\n\r\n"),
        Err(ParseError::InvalidRequest)
    ));
    assert!(matches!(
        parse_request_head(b"GET / SPDY/3\r\n\r\n"),
        Err(ParseError::InvalidRequest)
    ));
}

#[test]
fn test_parse_malformed_header() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";
    let result = parse_request_head(req);

    assert!(matches!(result, Err(ParseError::InvalidHeader)));
}

#[test]
fn test_parse_rejects_folded_header() {
    let req = b"GET / HTTP/1.1\r\nX-A: 1\r\n continued\r\n\r\n";
    assert!(matches!(parse_request_head(req), Err(ParseError::InvalidHeader)));
}

#[test]
fn test_parse_rejects_non_numeric_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n";
    assert!(matches!(
        parse_request_head(req),
        Err(ParseError::InvalidContentLength)
    ));
}

#[test]
fn test_parse_rejects_conflicting_content_lengths() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: 5\r\ncontent-length: 50\r\n\r\n";
    assert!(matches!(
        parse_request_head(req),
        Err(ParseError::InvalidContentLength)
    ));
}

#[test]
fn test_parse_accepts_repeated_identical_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 5\r\n\r\n";
    let parsed = parse_request_head(req).unwrap();

    assert_eq!(parsed.headers.get("Content-Length"), Some("5"));
}

#[test]
fn test_parse_various_http_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("HEAD", Method::HEAD),
        ("OPTIONS", Method::OPTIONS),
        ("PATCH", Method::PATCH),
    ];

    for (method_str, expected_method) in methods {
        let req = format!("{} / HTTP/1.1\r\n\r\n", method_str);
        let parsed = parse_request_head(req.as_bytes()).unwrap();
        assert_eq!(parsed.method, expected_method);
    }
}

#[test]
fn test_parse_header_case_preservation() {
    let req = b"GET / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n";
    let parsed = parse_request_head(req).unwrap();

    let names: Vec<&str> = parsed.headers.iter().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["Content-Type"]);
}

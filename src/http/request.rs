use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::http::body::{BodyError, BodySink, BodyState, DataSink, IdentitySink};
use crate::http::headers::{Headers, normalize_header_value};
use crate::http::parser::{ParseError, resolve_target};

/// HTTP request methods.
///
/// Matching against a registered handler is exact: `GET` never matches a
/// handler registered for `HEAD` and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// CONNECT - Establish a tunnel
    CONNECT,
    /// TRACE - Loop-back test
    TRACE,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::CONNECT => "CONNECT",
            Method::TRACE => "TRACE",
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;

    /// Parses an HTTP method. Method tokens are case-sensitive.
    ///
    /// ```
    /// # use porthole::http::request::Method;
    /// assert_eq!("GET".parse::<Method>().ok(), Some(Method::GET));
    /// assert!("get".parse::<Method>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "HEAD" => Ok(Method::HEAD),
            "OPTIONS" => Ok(Method::OPTIONS),
            "PATCH" => Ok(Method::PATCH),
            "CONNECT" => Ok(Method::CONNECT),
            "TRACE" => Ok(Method::TRACE),
            _ => Err(ParseError::InvalidMethod),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the codec extracted from the request line and headers.
///
/// This is what handler matchers look at to decide whether they accept a
/// request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHead {
    pub method: Method,
    /// Absolute URL, resolved against the `Host` header.
    pub url: Url,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    pub headers: Headers,
    /// Percent-decoded path.
    pub path: String,
    /// Decoded query parameters. Later duplicates win.
    pub query: HashMap<String, String>,
}

/// Builder for request heads, mostly useful when exercising matchers.
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Option<String>,
    headers: Headers,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            target: None,
            version: None,
            headers: Headers::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Request target as it appears on the request line, e.g. `/a?b=c`.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn build(self) -> Result<RequestHead, ParseError> {
        let method = self.method.ok_or(ParseError::InvalidRequest)?;
        let target = self.target.unwrap_or_else(|| "/".to_string());
        let (url, path, query) = resolve_target(&target, self.headers.get("Host"))?;

        Ok(RequestHead {
            method,
            url,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            path,
            query,
        })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A routed HTTP request.
///
/// Produced by a handler's matcher once it accepts a [`RequestHead`]. The body,
/// if one is declared with `Content-Length`, is streamed into the request's
/// [`BodySink`] before the handler's processor runs.
pub struct Request {
    head: RequestHead,
    content_length: Option<u64>,
    content_type: Option<String>,
    sink: Box<dyn BodySink>,
    sink_state: BodyState,
}

impl Request {
    /// A request whose body, if any, is consumed and discarded.
    pub fn new(head: RequestHead) -> Self {
        Self::with_sink(head, IdentitySink::new())
    }

    /// A request that keeps its body in memory, see [`Request::body`].
    ///
    /// The buffer is unbounded; prefer [`Request::buffered_up_to`] for
    /// requests from untrusted peers.
    pub fn buffered(head: RequestHead) -> Self {
        Self::with_sink(head, DataSink::new())
    }

    /// A request that keeps at most `limit` body bytes in memory. Larger
    /// bodies are answered with 413.
    pub fn buffered_up_to(head: RequestHead, limit: u64) -> Self {
        Self::with_sink(head, DataSink::with_limit(limit))
    }

    pub fn with_sink(head: RequestHead, sink: impl BodySink + 'static) -> Self {
        let content_length = head
            .headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse().ok());
        let content_type = head.headers.get("Content-Type").map(normalize_header_value);

        Self {
            head,
            content_length,
            content_type,
            sink: Box::new(sink),
            sink_state: BodyState::Idle,
        }
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn url(&self) -> &Url {
        &self.head.url
    }

    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.head.query
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.head.query.get(key).map(|v| v.as_str())
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.head.headers.get(key)
    }

    /// Declared body length; `None` when the request carries no `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Normalized `Content-Type`, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Whether the request declares a body the connection has to read.
    pub fn has_body(&self) -> bool {
        self.content_length.is_some()
    }

    /// Body bytes, when the sink keeps them (see [`Request::buffered`]).
    pub fn body(&self) -> Option<&[u8]> {
        self.sink.data()
    }

    /// Largest body the sink accepts, if it has a limit.
    pub fn body_limit(&self) -> Option<u64> {
        self.sink.limit()
    }

    pub fn open_body(&mut self) -> Result<(), BodyError> {
        self.sink_state.begin_open()?;
        self.sink.open()
    }

    pub fn write_body(&mut self, chunk: &[u8]) -> Result<(), BodyError> {
        self.sink_state.ensure_open()?;
        self.sink.write(chunk)
    }

    pub fn close_body(&mut self) -> Result<(), BodyError> {
        self.sink_state.begin_close()?;
        self.sink.close()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.head.method)
            .field("path", &self.head.path)
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

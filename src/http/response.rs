use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::http::body::{BodyError, BodySource, BodyState, DataSource};
use crate::http::headers::{Headers, normalize_header_value, strip_line_breaks};
use crate::http::request::Method;

/// HTTP status code.
///
/// Named variants cover the codes the engine itself produces or commonly
/// sees; any other code is carried by [`StatusCode::Other`]. Comparison and
/// hashing go by the numeric code, so `Other(200) == Ok`.
///
/// - `Ok` (200): default for a freshly constructed response
/// - `NotModified` (304) / `PreconditionFailed` (412): produced by the override policy
/// - `BadRequest` (400): framing errors
/// - `Unauthorized` (401): typical preflight rejection
/// - `PayloadTooLarge` (413): a buffered body exceeded its limit
/// - `InternalServerError` (500): body I/O and processing errors
/// - `NotImplemented` (501): no handler matched
#[derive(Debug, Clone, Copy)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 206 Partial Content
    PartialContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Found
    Found,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 412 Precondition Failed
    PreconditionFailed,
    /// 413 Payload Too Large
    PayloadTooLarge,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// Any other three-digit code.
    Other(u16),
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use porthole::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::Other(418).as_u16(), 418);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::PartialContent => 206,
            StatusCode::MovedPermanently => 301,
            StatusCode::Found => 302,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::PreconditionFailed => 412,
            StatusCode::PayloadTooLarge => 413,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::Other(code) => *code,
        }
    }

    /// Maps a numeric code to its named variant, or `Other` for unlisted
    /// codes. `None` outside `100..=999`.
    pub fn from_u16(code: u16) -> Option<Self> {
        let status = match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            206 => StatusCode::PartialContent,
            301 => StatusCode::MovedPermanently,
            302 => StatusCode::Found,
            304 => StatusCode::NotModified,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            412 => StatusCode::PreconditionFailed,
            413 => StatusCode::PayloadTooLarge,
            500 => StatusCode::InternalServerError,
            501 => StatusCode::NotImplemented,
            503 => StatusCode::ServiceUnavailable,
            100..=999 => StatusCode::Other(code),
            _ => return None,
        };
        Some(status)
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// Unlisted codes get a phrase naming their class.
    ///
    /// # Example
    ///
    /// ```
    /// # use porthole::http::response::StatusCode;
    /// assert_eq!(StatusCode::NotModified.reason_phrase(), "Not Modified");
    /// assert_eq!(StatusCode::Other(502).reason_phrase(), "Server Error");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::PartialContent => "Partial Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::Found => "Found",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::PreconditionFailed => "Precondition Failed",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::Other(code) => match code / 100 {
                1 => "Informational",
                2 => "Success",
                3 => "Redirection",
                4 => "Client Error",
                5 => "Server Error",
                _ => "Unknown",
            },
        }
    }

    /// True for the `[200, 300)` range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }
}

impl PartialEq for StatusCode {
    fn eq(&self, other: &Self) -> bool {
        self.as_u16() == other.as_u16()
    }
}

impl Eq for StatusCode {}

impl Hash for StatusCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_u16().hash(state);
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// What happens to a successful handler response before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// 2xx responses become a header-only 304 (GET/HEAD) or 412 (other methods).
    #[default]
    HeaderOnly,
    /// Responses are written exactly as the handler produced them.
    PassThrough,
}

impl OverridePolicy {
    /// Applies the policy to a response produced for a request with `method`.
    pub fn apply(&self, method: &Method, response: Response) -> Response {
        match self {
            OverridePolicy::PassThrough => response,
            OverridePolicy::HeaderOnly if response.status().is_success() => {
                let status = if matches!(method, Method::GET | Method::HEAD) {
                    StatusCode::NotModified
                } else {
                    StatusCode::PreconditionFailed
                };
                Response::with_status(status)
            }
            OverridePolicy::HeaderOnly => response,
        }
    }
}

/// An HTTP response ready to be handed to the connection.
///
/// A response declares a body by carrying a content type; its bytes come
/// from the attached [`BodySource`]. `content_length` of `None` means the
/// length is not known up front.
pub struct Response {
    status: StatusCode,
    content_type: Option<String>,
    content_length: Option<u64>,
    headers: Headers,
    source: Option<Box<dyn BodySource>>,
    source_state: BodyState,
}

impl Response {
    /// A header-only 200 response.
    pub fn new() -> Self {
        Self::with_status(StatusCode::Ok)
    }

    /// A header-only response with the given status.
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            content_length: None,
            headers: Headers::new(),
            source: None,
            source_state: BodyState::Idle,
        }
    }

    /// A 200 response serving `data` as `content_type`.
    pub fn data(data: impl Into<Bytes>, content_type: &str) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .content_type(content_type)
            .body(data)
            .build()
    }

    pub fn html(html: impl Into<String>) -> Self {
        Self::data(html.into(), "text/html; charset=utf-8")
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::data(text.into(), "text/plain; charset=utf-8")
    }

    /// A 200 response whose body is produced by `source`.
    pub fn streamed(content_type: &str, source: impl BodySource + 'static) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .content_type(content_type)
            .source(source)
            .build()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Adds or replaces a header. CR and LF are stripped from both parts.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(strip_line_breaks(name), strip_line_breaks(value));
    }

    pub fn has_body(&self) -> bool {
        self.content_type.is_some()
    }

    /// Opens the body source. Fails when there is no source or it was opened before.
    pub fn open_body(&mut self) -> Result<(), BodyError> {
        self.source_state.begin_open()?;
        match self.source.as_mut() {
            Some(source) => source.open(),
            None => Err(BodyError::Rejected("response has no body source".into())),
        }
    }

    pub fn read_body(&mut self) -> Result<Option<Bytes>, BodyError> {
        self.source_state.ensure_open()?;
        match self.source.as_mut() {
            Some(source) => source.read(),
            None => Ok(None),
        }
    }

    pub fn close_body(&mut self) -> Result<(), BodyError> {
        self.source_state.begin_close()?;
        match self.source.as_mut() {
            Some(source) => source.close(),
            None => Ok(()),
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Cache-Control", "no-cache")
///     .content_type("application/json")
///     .body("{}")
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    content_type: Option<String>,
    content_length: Option<u64>,
    headers: Headers,
    source: Option<Box<dyn BodySource>>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            content_length: None,
            headers: Headers::new(),
            source: None,
        }
    }

    /// Adds or replaces a header. CR and LF are stripped from both parts.
    ///
    /// `Content-Type` and `Content-Length` are derived from the body and
    /// should be set through [`content_type`](Self::content_type) and
    /// [`content_length`](Self::content_length) instead.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(strip_line_breaks(key), strip_line_breaks(value));
        self
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(normalize_header_value(&strip_line_breaks(content_type)));
        self
    }

    /// Declares the body length when a streamed source knows it in advance.
    pub fn content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Sets an in-memory body. The content length follows the data size.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.content_length = Some(body.len() as u64);
        self.source = Some(Box::new(DataSource::new(body)));
        self
    }

    /// Sets a streaming body source.
    pub fn source(mut self, source: impl BodySource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Builds the final Response.
    ///
    /// A body without an explicit content type is served as
    /// `application/octet-stream`.
    pub fn build(mut self) -> Response {
        if self.source.is_some() && self.content_type.is_none() {
            self.content_type = Some("application/octet-stream".to_string());
        }

        Response {
            status: self.status,
            content_type: self.content_type,
            content_length: self.content_length,
            headers: self.headers,
            source: self.source,
            source_state: BodyState::Idle,
        }
    }
}

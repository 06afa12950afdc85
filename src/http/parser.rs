use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::http::headers::Headers;
use crate::http::request::{Method, RequestHead};

pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,

    #[error("unknown request method")]
    InvalidMethod,

    #[error("malformed header line")]
    InvalidHeader,

    #[error("invalid Content-Length")]
    InvalidContentLength,

    #[error("invalid request target")]
    InvalidTarget,

    #[error("header section is incomplete")]
    Incomplete,
}

/// Parses a complete header block (request line, headers and the blank
/// line that ends them) into a [`RequestHead`].
///
/// Any bytes after the terminator are ignored; the connection treats them as
/// the start of the body.
pub fn parse_request_head(buf: &[u8]) -> Result<RequestHead, ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let header_bytes = &buf[..headers_end];

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split(' ');

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() || target.is_empty() || !version.starts_with("HTTP/1.") {
        return Err(ParseError::InvalidRequest);
    }

    let method: Method = method_str.parse()?;

    // Headers
    let mut headers = Headers::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        // Folded continuation lines are obsolete (RFC 7230 §3.2.4).
        if line.starts_with([' ', '\t']) {
            return Err(ParseError::InvalidHeader);
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim_end();

        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(ParseError::InvalidHeader);
        }

        let value = value.trim();

        // Repeats must agree, otherwise the body boundary is ambiguous (RFC 7230 §3.3.2).
        if key.eq_ignore_ascii_case("Content-Length") {
            if let Some(previous) = headers.get(key) {
                if previous != value {
                    return Err(ParseError::InvalidContentLength);
                }
            }
        }

        headers.insert(key, value);
    }

    if let Some(length) = headers.get("Content-Length") {
        length
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidContentLength)?;
    }

    let (url, path, query) = resolve_target(target, headers.get("Host"))?;

    Ok(RequestHead {
        method,
        url,
        version: version.to_string(),
        headers,
        path,
        query,
    })
}

/// Position of the `\r\n\r\n` that ends the header section.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

/// Resolves a request target into an absolute URL plus the decoded path and
/// query parameters.
///
/// Origin-form targets (`/path?query`) are resolved against the `Host`
/// header, falling back to `localhost` when it is missing or unusable.
pub fn resolve_target(
    target: &str,
    host: Option<&str>,
) -> Result<(Url, String, HashMap<String, String>), ParseError> {
    let url = if target.starts_with('/') {
        let base = match host.and_then(|h| Url::parse(&format!("http://{}/", h.trim())).ok()) {
            Some(base) => base,
            None => Url::parse("http://localhost/").map_err(|_| ParseError::InvalidTarget)?,
        };
        base.join(target)
    } else {
        Url::parse(target)
    }
    .map_err(|_| ParseError::InvalidTarget)?;

    let path = percent_decode_str(url.path())
        .decode_utf8_lossy()
        .into_owned();
    let query = url.query_pairs().into_owned().collect();

    Ok((url, path, query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let parsed = parse_request_head(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert_eq!(parsed.url.as_str(), "http://example.com/");
    }

    #[test]
    fn terminator_position() {
        assert_eq!(find_headers_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(14));
        assert_eq!(find_headers_end(b"GET / HTTP/1.1\r\n\r"), None);
    }
}

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::body::BodyError;
use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes the status line and headers of `resp`.
///
/// Header-only responses are written with no headers at all; responses that
/// declare a body get `Content-Type` and, when known, `Content-Length`.
pub fn serialize_head(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status().as_u16(),
        resp.status().reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in resp.headers().iter() {
        if k.eq_ignore_ascii_case("Content-Type") || k.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        push_header(&mut buf, k, v);
    }

    if let Some(content_type) = resp.content_type() {
        push_header(&mut buf, "Content-Type", content_type);
        if let Some(length) = resp.content_length() {
            push_header(&mut buf, "Content-Length", &length.to_string());
        }
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

fn push_header(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Writes a serialized response head, tracking partial writes.
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(head: Vec<u8>) -> Self {
        Self {
            buffer: head,
            written: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.written
    }

    pub async fn write_to_stream<S>(&mut self, stream: &mut S) -> anyhow::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}

/// Outcome of streaming a response body.
#[derive(Debug)]
pub enum BodyWriteError {
    /// The response's body source failed.
    Source(BodyError),
    /// The socket failed.
    Socket(std::io::Error),
}

/// Streams the body of `resp` to `stream`: open, read until exhausted, close.
///
/// Returns the number of body bytes written.
pub async fn stream_body<S>(resp: &mut Response, stream: &mut S) -> Result<u64, BodyWriteError>
where
    S: AsyncWrite + Unpin,
{
    resp.open_body().map_err(BodyWriteError::Source)?;

    let mut sent = 0u64;
    loop {
        let chunk = match resp.read_body() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                let _ = resp.close_body();
                return Err(BodyWriteError::Source(e));
            }
        };

        if let Err(e) = stream.write_all(&chunk).await {
            let _ = resp.close_body();
            return Err(BodyWriteError::Socket(e));
        }
        sent += chunk.len() as u64;
    }

    resp.close_body().map_err(BodyWriteError::Source)?;
    stream.flush().await.map_err(BodyWriteError::Socket)?;

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{ResponseBuilder, StatusCode};

    #[test]
    fn header_only_response_has_no_headers() {
        let head = serialize_head(&Response::with_status(StatusCode::NotModified));
        assert_eq!(head, b"HTTP/1.1 304 Not Modified\r\n\r\n");
    }

    #[test]
    fn body_response_declares_type_and_length() {
        let resp = ResponseBuilder::new(StatusCode::Ok)
            .header("X-Trace", "1")
            .content_type("text/plain")
            .body("hi")
            .build();
        let head = String::from_utf8(serialize_head(&resp)).unwrap();

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("X-Trace: 1\r\n"));
        assert!(head.contains("Content-Type: text/plain\r\n"));
        assert!(head.contains("Content-Length: 2\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn streams_body_chunks() {
        let mut resp = Response::text("hello");
        let mut out = Vec::new();

        let sent = stream_body(&mut resp, &mut out).await.unwrap();

        assert_eq!(sent, 5);
        assert_eq!(out, b"hello");
    }
}

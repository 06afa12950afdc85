//! Pluggable HTTP message codec.
//!
//! The connection does its own framing (finding the end of the header
//! section and counting body bytes); the codec only turns a complete header
//! block into a [`RequestHead`] and a response's status and headers into
//! bytes.

use crate::http::parser::{ParseError, parse_request_head};
use crate::http::request::RequestHead;
use crate::http::response::Response;
use crate::http::writer::serialize_head;

pub trait Codec: Send + Sync {
    /// Parses a header block that ends with `\r\n\r\n`.
    fn parse_head(&self, block: &[u8]) -> Result<RequestHead, ParseError>;

    /// Serializes the status line and headers, including the blank line.
    fn serialize_head(&self, response: &Response) -> Vec<u8>;
}

/// Plain HTTP/1.x text codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Http1Codec;

impl Codec for Http1Codec {
    fn parse_head(&self, block: &[u8]) -> Result<RequestHead, ParseError> {
        parse_request_head(block)
    }

    fn serialize_head(&self, response: &Response) -> Vec<u8> {
        serialize_head(response)
    }
}

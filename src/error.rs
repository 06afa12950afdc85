//! Error types.
//!
//! [`ServerError`] covers registration and lifecycle calls made by the host
//! application. [`RequestError`] is the per-request taxonomy: every variant
//! ends the request with a header-only response carrying [`RequestError::status`].

use std::net::SocketAddr;

use crate::http::body::BodyError;
use crate::http::parser::ParseError;
use crate::http::response::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error("invalid path pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// No registered handler accepted the request.
    #[error("no handler matched the request")]
    Routing,

    /// Malformed header section or a body that overruns its declared length.
    #[error("framing error: {0}")]
    Framing(String),

    /// The preflight hook rejected the request.
    #[error("request rejected with {0}")]
    Authorization(StatusCode),

    /// The request body sink or response body source failed. A body over
    /// its sink's limit is answered with 413.
    #[error("body i/o failed: {0}")]
    Io(#[from] BodyError),

    /// The processor finished without producing a response.
    #[error("processor produced no response")]
    Processing,
}

impl RequestError {
    /// Wire status written for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Routing => StatusCode::NotImplemented,
            RequestError::Framing(_) => StatusCode::BadRequest,
            RequestError::Authorization(status) => *status,
            RequestError::Io(BodyError::TooLarge { .. }) => StatusCode::PayloadTooLarge,
            RequestError::Io(_) => StatusCode::InternalServerError,
            RequestError::Processing => StatusCode::InternalServerError,
        }
    }
}

impl From<ParseError> for RequestError {
    fn from(e: ParseError) -> Self {
        RequestError::Framing(e.to_string())
    }
}

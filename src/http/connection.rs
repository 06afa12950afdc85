use std::sync::Arc;

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::{HEADER_READ_CAPACITY, ServerOptions};
use crate::error::RequestError;
use crate::http::body::BodyError;
use crate::http::codec::{Codec, Http1Codec};
use crate::http::handler::{Completion, Handler, HandlerRegistry, PreflightFn};
use crate::http::parser::{HEADER_TERMINATOR, find_headers_end};
use crate::http::request::{Method, Request, RequestHead};
use crate::http::response::Response;
use crate::http::writer::{BodyWriteError, ResponseWriter, stream_body};

/// Everything a connection needs from its server. Read-only once shared.
pub struct ConnectionContext {
    pub handlers: HandlerRegistry,
    pub codec: Arc<dyn Codec>,
    pub preflight: Option<Arc<PreflightFn>>,
    pub options: ServerOptions,
}

impl ConnectionContext {
    pub fn new(handlers: HandlerRegistry, options: ServerOptions) -> Self {
        Self {
            handlers,
            codec: Arc::new(Http1Codec),
            preflight: None,
            options,
        }
    }
}

/// A request together with the handler that accepted it.
pub struct Routed {
    request: Request,
    handler: Arc<Handler>,
}

pub enum ConnectionState {
    ReadingHeaders,
    Routing(RequestHead),
    BodyDecision(Routed),
    ReadingBody(Routed),
    Preflight(Routed),
    Processing(Routed),
    Finalize(Method, Response),
    Writing { response: Response, send_body: bool },
    Closed,
}

/// Drives one accepted socket through exactly one request.
///
/// Each state is handled to completion before the next one starts, so the
/// buffers and the request/response never see concurrent access.
pub struct Connection<S> {
    stream: S,
    peer: String,
    context: Arc<ConnectionContext>,
    header_buffer: BytesMut,
    body_prefix: Bytes,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: impl Into<String>, context: Arc<ConnectionContext>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            context,
            header_buffer: BytesMut::with_capacity(HEADER_READ_CAPACITY),
            body_prefix: Bytes::new(),
            state: ConnectionState::ReadingHeaders,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::ReadingHeaders => self.read_headers().await,
                ConnectionState::Routing(head) => self.route(head),
                ConnectionState::BodyDecision(routed) => self.decide_body(routed),
                ConnectionState::ReadingBody(routed) => self.read_body(routed).await,
                ConnectionState::Preflight(routed) => self.preflight(routed),
                ConnectionState::Processing(routed) => self.process(routed).await,
                ConnectionState::Finalize(method, response) => self.finalize(method, response),
                ConnectionState::Writing {
                    response,
                    send_body,
                } => {
                    self.write_response(response, send_body).await?;
                    ConnectionState::Closed
                }
                ConnectionState::Closed => break,
            };
        }

        // The peer may already be gone; nothing left to report.
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    async fn read_headers(&mut self) -> ConnectionState {
        let mut temp = [0u8; HEADER_READ_CAPACITY];
        let mut scanned: usize = 0;

        loop {
            // The terminator may straddle two reads; rescan the tail of what we had.
            let from = scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
            if let Some(pos) = find_headers_end(&self.header_buffer[from..]) {
                let block = self
                    .header_buffer
                    .split_to(from + pos + HEADER_TERMINATOR.len());
                self.body_prefix = self.header_buffer.split().freeze();

                return match self.context.codec.parse_head(&block) {
                    Ok(head) => ConnectionState::Routing(head),
                    Err(e) => self.abort(e.into()),
                };
            }
            scanned = self.header_buffer.len();

            if scanned > self.context.options.max_header_size {
                return self.abort(RequestError::Framing(format!(
                    "header section exceeds {} bytes",
                    self.context.options.max_header_size
                )));
            }

            match self.stream.read(&mut temp).await {
                Ok(0) => {
                    debug!(peer = %self.peer, "Peer closed before sending a request");
                    return ConnectionState::Closed;
                }
                Ok(n) => self.header_buffer.extend_from_slice(&temp[..n]),
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "Failed to read request headers");
                    return ConnectionState::Closed;
                }
            }
        }
    }

    fn route(&self, head: RequestHead) -> ConnectionState {
        match self.context.handlers.route(&head) {
            Some((request, handler)) => {
                debug!(
                    peer = %self.peer,
                    method = %head.method,
                    path = %head.path,
                    "Request matched a handler"
                );
                ConnectionState::BodyDecision(Routed { request, handler })
            }
            None => {
                debug!(method = %head.method, path = %head.path, "No handler matched");
                self.abort(RequestError::Routing)
            }
        }
    }

    fn decide_body(&self, mut routed: Routed) -> ConnectionState {
        let Some(length) = routed.request.content_length() else {
            return ConnectionState::Preflight(routed);
        };

        if let Some(limit) = routed.request.body_limit() {
            if length > limit {
                return self.abort(BodyError::TooLarge { limit }.into());
            }
        }

        if let Err(e) = routed.request.open_body() {
            return self.abort(e.into());
        }

        if self.body_prefix.len() as u64 > length {
            if let Err(e) = routed.request.close_body() {
                warn!(peer = %self.peer, error = %e, "Failed to close request body");
            }
            return self.abort(RequestError::Framing(format!(
                "received {} body bytes but Content-Length is {}",
                self.body_prefix.len(),
                length
            )));
        }

        ConnectionState::ReadingBody(routed)
    }

    async fn read_body(&mut self, mut routed: Routed) -> ConnectionState {
        let length = routed.request.content_length().unwrap_or(0);
        let mut received = 0u64;

        let prefix = std::mem::take(&mut self.body_prefix);
        if !prefix.is_empty() {
            if let Err(e) = routed.request.write_body(&prefix) {
                return self.abort(e.into());
            }
            received += prefix.len() as u64;
        }

        let chunk_size = usize::try_from(length - received)
            .unwrap_or(usize::MAX)
            .min(self.context.options.body_chunk_size);
        let mut buffer = vec![0u8; chunk_size];

        while received < length {
            // Never ask for more than what is still owed.
            let want = usize::try_from(length - received)
                .unwrap_or(usize::MAX)
                .min(buffer.len());

            let n = match self.stream.read(&mut buffer[..want]).await {
                Ok(0) => {
                    return self.abort(RequestError::Framing(format!(
                        "connection closed after {received} of {length} body bytes"
                    )));
                }
                Ok(n) => n,
                Err(e) => {
                    return self.abort(RequestError::Framing(format!(
                        "failed to read body: {e}"
                    )));
                }
            };

            if let Err(e) = routed.request.write_body(&buffer[..n]) {
                return self.abort(e.into());
            }
            received += n as u64;
        }

        if let Err(e) = routed.request.close_body() {
            return self.abort(e.into());
        }

        debug!(peer = %self.peer, bytes = received, "Request body received");
        ConnectionState::Preflight(routed)
    }

    fn preflight(&self, routed: Routed) -> ConnectionState {
        if let Some(hook) = &self.context.preflight {
            if let Some(response) = hook(&routed.request) {
                let rejection = RequestError::Authorization(response.status());
                debug!(peer = %self.peer, reason = %rejection, "Preflight answered the request");
                return ConnectionState::Finalize(routed.request.method().clone(), response);
            }
        }

        ConnectionState::Processing(routed)
    }

    async fn process(&mut self, routed: Routed) -> ConnectionState {
        let Routed { request, handler } = routed;
        let method = request.method().clone();

        let (completion, rx) = Completion::channel();
        handler.process(request, completion);

        let outcome = match self.context.options.request_timeout() {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(peer = %self.peer, ?deadline, "Processor timed out");
                    return self.abort(RequestError::Processing);
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(Some(response)) => ConnectionState::Finalize(method, response),
            Ok(None) | Err(_) => self.abort(RequestError::Processing),
        }
    }

    fn finalize(&self, method: Method, response: Response) -> ConnectionState {
        let response = self.context.options.override_policy.apply(&method, response);

        ConnectionState::Writing {
            response,
            send_body: method != Method::HEAD,
        }
    }

    /// Replaces the rest of the lifecycle with a header-only error response.
    fn abort(&self, error: RequestError) -> ConnectionState {
        let status = error.status();
        warn!(peer = %self.peer, status = status.as_u16(), error = %error, "Aborting request");

        ConnectionState::Writing {
            response: Response::with_status(status),
            send_body: false,
        }
    }

    async fn write_response(&mut self, mut response: Response, send_body: bool) -> anyhow::Result<()> {
        let head = self.context.codec.serialize_head(&response);
        let mut writer = ResponseWriter::new(head);
        writer
            .write_to_stream(&mut self.stream)
            .await
            .context("failed to write response head")?;

        if send_body && response.has_body() {
            match stream_body(&mut response, &mut self.stream).await {
                Ok(sent) => {
                    if let Some(declared) = response.content_length() {
                        if declared != sent {
                            warn!(
                                peer = %self.peer,
                                declared,
                                sent,
                                "Response body length differs from Content-Length"
                            );
                        }
                    }
                }
                Err(BodyWriteError::Source(e)) => {
                    warn!(peer = %self.peer, error = %e, "Response body source failed");
                }
                Err(BodyWriteError::Socket(e)) => {
                    return Err(e).context("failed to write response body");
                }
            }
        }

        debug!(peer = %self.peer, status = response.status().as_u16(), "Response sent");
        Ok(())
    }
}

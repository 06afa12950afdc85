//! HTTP protocol implementation.
//!
//! One request per connection: no keep-alive, no pipelining, no chunked
//! bodies. Request bodies are only read when `Content-Length` declares them.
//!
//! # Architecture
//!
//! - **`connection`**: the per-socket state machine
//! - **`handler`**: matchers, processors and the handler registry
//! - **`codec`**: the replaceable header parser/serializer
//! - **`parser`** / **`writer`**: the default HTTP/1.x codec halves
//! - **`request`** / **`response`**: message types
//! - **`body`**: streaming body sinks and sources
//! - **`headers`**: case-insensitive header list
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌────────────────┐
//!        │ ReadingHeaders │ ← accumulate until \r\n\r\n
//!        └───────┬────────┘
//!                ▼
//!        ┌────────────────┐   no match
//!        │    Routing     │ ─────────────► Abort(501)
//!        └───────┬────────┘
//!                ▼
//!        ┌────────────────┐   prefix > Content-Length
//!        │  BodyDecision  │ ─────────────► Abort(400)
//!        └───────┬────────┘
//!                ▼ (Content-Length declared)
//!        ┌────────────────┐   sink failure
//!        │  ReadingBody   │ ─────────────► Abort(500)
//!        └───────┬────────┘
//!                ▼
//!        ┌────────────────┐   hook returns a response
//!        │   Preflight    │ ──────────────────┐
//!        └───────┬────────┘                   │
//!                ▼                            │
//!        ┌────────────────┐   no response     │
//!        │   Processing   │ ─────► Abort(500) │
//!        └───────┬────────┘                   │
//!                ▼                            │
//!        ┌────────────────┐ ◄─────────────────┘
//!        │    Finalize    │ ← override policy
//!        └───────┬────────┘
//!                ▼
//!        ┌────────────────┐
//!        │    Writing     │ ← Abort(..) lands here directly
//!        └───────┬────────┘
//!                ▼
//!             Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use porthole::http::connection::{Connection, ConnectionContext};
//! use porthole::http::handler::HandlerRegistry;
//! use porthole::ServerOptions;
//!
//! let context = Arc::new(ConnectionContext::new(HandlerRegistry::new(), ServerOptions::default()));
//! let (socket, peer) = listener.accept().await?;
//! tokio::spawn(async move {
//!     let mut conn = Connection::new(socket, peer.to_string(), context);
//!     if let Err(e) = conn.run().await {
//!         tracing::warn!("Connection error: {}", e);
//!     }
//! });
//! ```

pub mod body;
pub mod codec;
pub mod connection;
pub mod handler;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

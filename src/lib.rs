//! Porthole - embeddable HTTP server core
//!
//! Lets a host application expose local HTTP endpoints without running a
//! separate server process. One request is served per connection.

pub mod config;
pub mod error;
pub mod http;
pub mod server;

pub use config::ServerOptions;
pub use error::{RequestError, ServerError};
pub use http::handler::Completion;
pub use http::request::{Method, Request, RequestHead};
pub use http::response::{OverridePolicy, Response, ResponseBuilder, StatusCode};
pub use server::Server;

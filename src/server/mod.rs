//! Server lifecycle: handler registration, listening sockets, the accept
//! loops and the shutdown barrier.
//!
//! Handlers are registered on a stopped server. `start` takes a snapshot of
//! the registry, so changes made while running only apply after the next
//! `stop`/`start` cycle.

pub mod barrier;
pub mod listener;
pub mod shutdown;

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ServerOptions;
use crate::error::ServerError;
use crate::http::codec::{Codec, Http1Codec};
use crate::http::connection::ConnectionContext;
use crate::http::handler::{
    Completion, Handler, HandlerRegistry, PreflightFn, buffered_path_matcher, path_matcher, sync_processor,
};
use crate::http::request::{Method, Request, RequestHead};
use crate::http::response::Response;
use barrier::InFlight;
use shutdown::Shutdown;

struct Running {
    shutdown: Shutdown,
    accept_tasks: Vec<JoinHandle<()>>,
    local_addrs: Vec<SocketAddr>,
}

/// An embeddable HTTP server.
///
/// # Example
///
/// ```ignore
/// let mut server = Server::new();
/// server.add_handler(Method::GET, "^/status$", |_| Some(Response::text("ok")))?;
/// server.start_with(ServerOptions::with_port(9000)).await?;
/// // ...
/// server.stop().await;
/// ```
pub struct Server {
    handlers: HandlerRegistry,
    codec: Arc<dyn Codec>,
    preflight: Option<Arc<PreflightFn>>,
    options: Option<ServerOptions>,
    running: Option<Running>,
    in_flight: InFlight,
}

impl Server {
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            codec: Arc::new(Http1Codec),
            preflight: None,
            options: None,
            running: None,
            in_flight: InFlight::new(),
        }
    }

    /// Registers a synchronous processor for `method` requests whose path
    /// matches `pattern`. Request bodies are read and discarded.
    pub fn add_handler<F>(&mut self, method: Method, pattern: &str, process: F) -> Result<(), ServerError>
    where
        F: Fn(Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.add_async_handler(method, pattern, sync_processor(process))
    }

    /// Like [`add_handler`](Self::add_handler), but the processor sees up to
    /// `max_body_size` body bytes through [`Request::body`]. Requests
    /// declaring a larger body are answered with 413.
    pub fn add_buffered_handler<F>(
        &mut self,
        method: Method,
        pattern: &str,
        max_body_size: u64,
        process: F,
    ) -> Result<(), ServerError>
    where
        F: Fn(Request) -> Option<Response> + Send + Sync + 'static,
    {
        let matcher = buffered_path_matcher(method, pattern, max_body_size)
            .map_err(|source| invalid_pattern(pattern, source))?;
        self.add_matched_handler(matcher, sync_processor(process));
        Ok(())
    }

    /// Registers a processor that reports its response through a [`Completion`].
    pub fn add_async_handler<P>(&mut self, method: Method, pattern: &str, process: P) -> Result<(), ServerError>
    where
        P: Fn(Request, Completion) + Send + Sync + 'static,
    {
        let matcher = path_matcher(method, pattern).map_err(|source| invalid_pattern(pattern, source))?;
        self.add_matched_handler(matcher, process);
        Ok(())
    }

    /// Registers a handler with a custom matcher.
    pub fn add_matched_handler<M, P>(&mut self, matcher: M, process: P)
    where
        M: Fn(&RequestHead) -> Option<Request> + Send + Sync + 'static,
        P: Fn(Request, Completion) + Send + Sync + 'static,
    {
        self.handlers.add(Handler::new(matcher, process));
    }

    pub fn remove_all_handlers(&mut self) {
        self.handlers.clear();
    }

    pub fn handlers_count(&self) -> usize {
        self.handlers.len()
    }

    /// Runs the registry the same way a connection does.
    pub fn route(&self, head: &RequestHead) -> Option<Request> {
        self.handlers.route(head).map(|(request, _)| request)
    }

    pub fn set_preflight<F>(&mut self, preflight: F)
    where
        F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.preflight = Some(Arc::new(preflight));
    }

    pub fn clear_preflight(&mut self) {
        self.preflight = None;
    }

    pub fn set_codec(&mut self, codec: impl Codec + 'static) {
        self.codec = Arc::new(codec);
    }

    /// Starts with default options, or with the options captured by an
    /// earlier successful start.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        self.start_with(ServerOptions::default()).await
    }

    /// Binds the listening socket(s) and starts accepting.
    ///
    /// The options of the first successful start are kept for the life of
    /// the server; later calls reuse them and ignore their argument. On
    /// error nothing is left listening.
    pub async fn start_with(&mut self, options: ServerOptions) -> Result<(), ServerError> {
        if self.running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let options = match &self.options {
            Some(bound) => {
                if *bound != options {
                    debug!("Ignoring new options; server keeps the options it was first started with");
                }
                bound.clone()
            }
            None => options,
        };

        let ip4 = if options.bind_to_localhost {
            Ipv4Addr::LOCALHOST
        } else {
            Ipv4Addr::UNSPECIFIED
        };
        let mut listeners = vec![listener::bind(SocketAddr::from((ip4, options.port)))?];

        if options.ipv6 {
            // Follow the IPv4 port so an ephemeral port is shared by both.
            let port = listeners[0]
                .local_addr()
                .map(|a| a.port())
                .unwrap_or(options.port);
            let ip6 = if options.bind_to_localhost {
                Ipv6Addr::LOCALHOST
            } else {
                Ipv6Addr::UNSPECIFIED
            };
            listeners.push(listener::bind(SocketAddr::from((ip6, port)))?);
        }

        let context = Arc::new(ConnectionContext {
            handlers: self.handlers.clone(),
            codec: Arc::clone(&self.codec),
            preflight: self.preflight.clone(),
            options: options.clone(),
        });

        let shutdown = Shutdown::new();
        let mut local_addrs = Vec::with_capacity(listeners.len());
        let mut accept_tasks = Vec::with_capacity(listeners.len());

        for tcp in listeners {
            if let Ok(addr) = tcp.local_addr() {
                info!("Listening on {}", addr);
                local_addrs.push(addr);
            }
            accept_tasks.push(tokio::spawn(listener::run(
                tcp,
                Arc::clone(&context),
                shutdown.subscribe(),
                self.in_flight.clone(),
            )));
        }

        self.options = Some(options);
        self.running = Some(Running {
            shutdown,
            accept_tasks,
            local_addrs,
        });
        Ok(())
    }

    /// Stops accepting and waits for every accepted connection to finish.
    ///
    /// Connections are never cut short: a processor that has not completed
    /// yet keeps this call waiting.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown.trigger();
        for task in running.accept_tasks {
            // A panicked accept loop has nothing left to accept.
            let _ = task.await;
        }

        debug!(in_flight = self.in_flight.count(), "Waiting for connections to finish");
        self.in_flight.wait().await;
        info!("Server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address of the IPv4 listener while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref()?.local_addrs.first().copied()
    }

    pub fn local_addrs(&self) -> &[SocketAddr] {
        self.running
            .as_ref()
            .map(|r| r.local_addrs.as_slice())
            .unwrap_or_default()
    }

    pub fn port(&self) -> Option<u16> {
        self.local_addr().map(|a| a.port())
    }

    /// Options captured by the first successful start.
    pub fn bound_options(&self) -> Option<&ServerOptions> {
        self.options.as_ref()
    }

    /// Connections accepted and not yet closed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }
}

fn invalid_pattern(pattern: &str, source: regex::Error) -> ServerError {
    ServerError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    /// Stops accepting without waiting for open connections.
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.trigger();
        }
    }
}

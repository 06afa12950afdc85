//! Handler registration and request routing.
//!
//! A [`Handler`] pairs a *matcher*, which looks at a [`RequestHead`] and
//! either builds a [`Request`] or declines, with a *processor*, which turns
//! the request into a [`Response`] and reports it through a [`Completion`].
//!
//! The registry is searched most-recently-registered first, so a later
//! registration overrides an earlier one wherever their matchers overlap.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tokio::sync::oneshot;

use crate::http::request::{Method, Request, RequestHead};
use crate::http::response::Response;

pub type MatchFn = dyn Fn(&RequestHead) -> Option<Request> + Send + Sync;

pub type ProcessFn = dyn Fn(Request, Completion) + Send + Sync;

/// Runs after the body was received and before the processor. Returning a
/// response answers the request with it and skips the processor.
pub type PreflightFn = dyn Fn(&Request) -> Option<Response> + Send + Sync;

/// Delivers a processor's result back to its connection.
///
/// `complete` consumes the value, so a response can be delivered at most
/// once. Dropping a completion without calling it counts as completing with
/// no response, which the connection answers with a 500.
#[must_use = "the connection waits until the completion is used or dropped"]
pub struct Completion {
    tx: oneshot::Sender<Option<Response>>,
}

impl Completion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Option<Response>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self, response: Option<Response>) {
        // The receiver is gone only when the connection already gave up.
        let _ = self.tx.send(response);
    }

    pub fn respond(self, response: Response) {
        self.complete(Some(response));
    }

    /// True when the connection stopped waiting (e.g. the request timed out).
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

/// A registered (matcher, processor) pair.
pub struct Handler {
    matcher: Box<MatchFn>,
    processor: Box<ProcessFn>,
}

impl Handler {
    pub fn new<M, P>(matcher: M, processor: P) -> Self
    where
        M: Fn(&RequestHead) -> Option<Request> + Send + Sync + 'static,
        P: Fn(Request, Completion) + Send + Sync + 'static,
    {
        Self {
            matcher: Box::new(matcher),
            processor: Box::new(processor),
        }
    }

    pub fn try_match(&self, head: &RequestHead) -> Option<Request> {
        (self.matcher)(head)
    }

    pub fn process(&self, request: Request, completion: Completion) {
        (self.processor)(request, completion)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

/// Builds a matcher accepting `method` requests whose decoded path contains
/// a match for `pattern` (case-insensitive, anchor it for a full match).
///
/// Accepted requests discard their body; use [`buffered_path_matcher`] when
/// the processor needs it.
pub fn path_matcher(
    method: Method,
    pattern: &str,
) -> Result<impl Fn(&RequestHead) -> Option<Request> + Send + Sync + 'static, regex::Error> {
    pattern_matcher(method, pattern, Request::new)
}

/// Like [`path_matcher`], but accepted requests keep up to `max_body_size`
/// body bytes in memory. A larger declared body is answered with 413.
pub fn buffered_path_matcher(
    method: Method,
    pattern: &str,
    max_body_size: u64,
) -> Result<impl Fn(&RequestHead) -> Option<Request> + Send + Sync + 'static, regex::Error> {
    pattern_matcher(method, pattern, move |head| {
        Request::buffered_up_to(head, max_body_size)
    })
}

fn pattern_matcher<B>(
    method: Method,
    pattern: &str,
    build: B,
) -> Result<impl Fn(&RequestHead) -> Option<Request> + Send + Sync + 'static, regex::Error>
where
    B: Fn(RequestHead) -> Request + Send + Sync + 'static,
{
    let expression: Regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;

    Ok(move |head: &RequestHead| {
        if head.method != method {
            return None;
        }
        if !expression.is_match(&head.path) {
            return None;
        }
        Some(build(head.clone()))
    })
}

/// Adapts a synchronous `Request -> Option<Response>` function into a processor.
pub fn sync_processor<F>(process: F) -> impl Fn(Request, Completion) + Send + Sync + 'static
where
    F: Fn(Request) -> Option<Response> + Send + Sync + 'static,
{
    move |request: Request, completion: Completion| completion.complete(process(request))
}

/// Ordered handler list, newest first.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: VecDeque<Arc<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` ahead of every handler registered before it.
    pub fn add(&mut self, handler: Handler) {
        self.handlers.push_front(Arc::new(handler));
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Finds the first handler, newest first, whose matcher accepts `head`.
    pub fn route(&self, head: &RequestHead) -> Option<(Request, Arc<Handler>)> {
        self.handlers.iter().find_map(|handler| {
            handler
                .try_match(head)
                .map(|request| (request, Arc::clone(handler)))
        })
    }
}

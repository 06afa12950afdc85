//! Streaming body interfaces.
//!
//! A [`Request`](crate::http::request::Request) receives its body through a
//! [`BodySink`]; a [`Response`](crate::http::response::Response) produces its
//! body through a [`BodySource`]. Both are driven by the connection in
//! bounded chunks, so neither side ever needs the whole body in memory unless
//! the implementation chooses to buffer it (as [`DataSink`] does).
//!
//! The owning request/response wraps each implementation in a [`BodyState`]
//! guard so that `open` happens at most once, reads/writes only happen while
//! open, and `close` happens at most once.

use bytes::{Bytes, BytesMut};

/// Errors produced while moving body bytes.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("body was already opened")]
    AlreadyOpened,

    #[error("body is not open")]
    NotOpen,

    #[error("body was already closed")]
    AlreadyClosed,

    #[error("body rejected: {0}")]
    Rejected(String),

    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Receives request body bytes as they arrive from the socket.
///
/// This is the extension point for transforming uploads on the fly
/// (e.g. decompression or writing straight to a file).
pub trait BodySink: Send {
    /// Called once before any body data is written.
    fn open(&mut self) -> Result<(), BodyError> {
        Ok(())
    }

    /// Called for every chunk of body data received.
    fn write(&mut self, chunk: &[u8]) -> Result<(), BodyError>;

    /// Called once after all declared body bytes have been written.
    fn close(&mut self) -> Result<(), BodyError> {
        Ok(())
    }

    /// Buffered body contents, for sinks that keep them.
    fn data(&self) -> Option<&[u8]> {
        None
    }

    /// Largest body this sink accepts. A request declaring more is refused
    /// before any of its body is read.
    fn limit(&self) -> Option<u64> {
        None
    }
}

/// Produces response body bytes to be written to the socket.
pub trait BodySource: Send {
    /// Called once before the first read.
    fn open(&mut self) -> Result<(), BodyError> {
        Ok(())
    }

    /// Returns the next chunk, or `None` once the body is exhausted.
    fn read(&mut self) -> Result<Option<Bytes>, BodyError>;

    /// Called once after the body was exhausted.
    fn close(&mut self) -> Result<(), BodyError> {
        Ok(())
    }
}

/// Accepts and discards everything.
#[derive(Debug, Default)]
pub struct IdentitySink {
    received: u64,
}

impl IdentitySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes written so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl BodySink for IdentitySink {
    fn write(&mut self, chunk: &[u8]) -> Result<(), BodyError> {
        self.received += chunk.len() as u64;
        Ok(())
    }
}

/// Buffers the whole body in memory, optionally up to a size limit.
#[derive(Debug, Default)]
pub struct DataSink {
    buffer: BytesMut,
    limit: Option<u64>,
}

impl DataSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that fails with [`BodyError::TooLarge`] past `limit` bytes.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            buffer: BytesMut::new(),
            limit: Some(limit),
        }
    }
}

impl BodySink for DataSink {
    fn write(&mut self, chunk: &[u8]) -> Result<(), BodyError> {
        if let Some(limit) = self.limit {
            if (self.buffer.len() + chunk.len()) as u64 > limit {
                return Err(BodyError::TooLarge { limit });
            }
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.buffer[..])
    }

    fn limit(&self) -> Option<u64> {
        self.limit
    }
}

/// Serves a single in-memory chunk.
#[derive(Debug)]
pub struct DataSource {
    data: Option<Bytes>,
}

impl DataSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

impl BodySource for DataSource {
    fn read(&mut self) -> Result<Option<Bytes>, BodyError> {
        Ok(self.data.take().filter(|d| !d.is_empty()))
    }
}

/// Generates the body chunk by chunk from a closure.
///
/// The closure returns `Ok(None)` when there is nothing more to send.
pub struct StreamedSource<F> {
    generator: F,
}

impl<F> StreamedSource<F>
where
    F: FnMut() -> Result<Option<Bytes>, BodyError> + Send,
{
    pub fn new(generator: F) -> Self {
        Self { generator }
    }
}

impl<F> BodySource for StreamedSource<F>
where
    F: FnMut() -> Result<Option<Bytes>, BodyError> + Send,
{
    fn read(&mut self) -> Result<Option<Bytes>, BodyError> {
        (self.generator)()
    }
}

/// Lifecycle of a sink or source: `Idle -> Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyState {
    #[default]
    Idle,
    Open,
    Closed,
}

impl BodyState {
    pub(crate) fn begin_open(&mut self) -> Result<(), BodyError> {
        match self {
            BodyState::Idle => {
                *self = BodyState::Open;
                Ok(())
            }
            _ => Err(BodyError::AlreadyOpened),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), BodyError> {
        match self {
            BodyState::Open => Ok(()),
            _ => Err(BodyError::NotOpen),
        }
    }

    pub(crate) fn begin_close(&mut self) -> Result<(), BodyError> {
        match self {
            BodyState::Open => {
                *self = BodyState::Closed;
                Ok(())
            }
            BodyState::Closed => Err(BodyError::AlreadyClosed),
            BodyState::Idle => Err(BodyError::NotOpen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_enforces_single_open_and_close() {
        let mut state = BodyState::default();
        assert!(matches!(state.ensure_open(), Err(BodyError::NotOpen)));
        assert!(matches!(state.begin_close(), Err(BodyError::NotOpen)));

        state.begin_open().unwrap();
        assert!(state.ensure_open().is_ok());
        assert!(matches!(state.begin_open(), Err(BodyError::AlreadyOpened)));

        state.begin_close().unwrap();
        assert!(matches!(state.begin_close(), Err(BodyError::AlreadyClosed)));
        assert!(matches!(state.ensure_open(), Err(BodyError::NotOpen)));
    }

    #[test]
    fn limited_data_sink_refuses_overflow() {
        let mut sink = DataSink::with_limit(4);
        sink.write(b"abc").unwrap();
        assert!(matches!(sink.write(b"de"), Err(BodyError::TooLarge { limit: 4 })));
        sink.write(b"d").unwrap();
        assert_eq!(sink.data(), Some(&b"abcd"[..]));
        assert_eq!(sink.limit(), Some(4));
    }

    #[test]
    fn data_source_yields_once() {
        let mut source = DataSource::new("abc");
        assert_eq!(source.read().unwrap(), Some(Bytes::from_static(b"abc")));
        assert_eq!(source.read().unwrap(), None);
    }

    #[test]
    fn empty_data_source_is_exhausted_immediately() {
        let mut source = DataSource::new(Bytes::new());
        assert_eq!(source.read().unwrap(), None);
    }

    #[test]
    fn streamed_source_runs_until_none() {
        let mut left = 3;
        let mut source = StreamedSource::new(move || {
            if left == 0 {
                return Ok(None);
            }
            left -= 1;
            Ok(Some(Bytes::from_static(b"x")))
        });

        let mut total = 0;
        while let Some(chunk) = source.read().unwrap() {
            total += chunk.len();
        }
        assert_eq!(total, 3);
    }
}

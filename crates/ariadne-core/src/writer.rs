//! Contract between the pipeline and the hosting container.
//!
//! The pipeline never touches sockets. When a response is ready it asks the
//! container's [`ContainerResponseWriter`] for an output sink, writes the
//! entity into it and finishes the exchange.

use std::io::{self, Write};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use tracing::error;

use crate::error::ProcessingError;
use crate::response::ContainerResponse;

/// Writes a response to the underlying transport.
///
/// Per request the pipeline calls [`write_status_and_headers`] at most once,
/// then writes the entity into the returned sink and finally calls
/// [`finish`] exactly once. If processing fails and no response can be
/// produced, [`failure`] is called instead of the write sequence.
///
/// [`write_status_and_headers`]: ContainerResponseWriter::write_status_and_headers
/// [`finish`]: ContainerResponseWriter::finish
/// [`failure`]: ContainerResponseWriter::failure
pub trait ContainerResponseWriter: Send {
    /// Commits status and headers and returns the entity sink.
    ///
    /// `content_length` is the body size in bytes, or `-1` when unknown
    /// (chunked responses).
    fn write_status_and_headers(
        &mut self,
        content_length: i64,
        response: &ContainerResponse,
    ) -> io::Result<&mut (dyn Write + Send)>;

    /// Completes the exchange.
    fn finish(&mut self) -> io::Result<()>;

    /// Reports a failure that no exception mapper handled.
    ///
    /// The default implementation logs the error.
    fn failure(&mut self, error: &ProcessingError) {
        error!(error = %error, "Request failed without a response");
    }
}

/// Everything a [`BufferedResponseWriter`] observed.
#[derive(Debug, Clone, Default)]
pub struct CapturedResponse {
    /// Committed status.
    pub status: Option<StatusCode>,
    /// Committed headers.
    pub headers: HeaderMap,
    /// Content length announced by the pipeline.
    pub content_length: Option<i64>,
    /// Entity bytes in write order.
    pub body: BytesMut,
    /// Individual flushed writes; one entry per chunk for streamed bodies.
    pub chunks: Vec<Bytes>,
    /// Number of `finish` calls.
    pub finish_count: usize,
    /// Message of the reported failure, if any.
    pub failure: Option<String>,
}

impl CapturedResponse {
    /// Returns the body as UTF-8 text (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns `true` once the exchange has been finished.
    pub const fn is_finished(&self) -> bool {
        self.finish_count > 0
    }
}

struct CaptureSink {
    captured: Arc<Mutex<CapturedResponse>>,
    pending: BytesMut,
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = self.pending.split().freeze();
        let mut captured = self.captured.lock();
        captured.body.extend_from_slice(&chunk);
        captured.chunks.push(chunk);
        Ok(())
    }
}

/// An in-memory container writer.
///
/// Useful for tests and for embedding the pipeline where the response is
/// consumed in-process. The captured state is shared, so a handle obtained
/// from [`captured`](Self::captured) stays valid after the writer has been
/// moved into the pipeline.
///
/// # Example
///
/// ```
/// use ariadne_core::{BufferedResponseWriter, ContainerResponse, ContainerResponseWriter};
///
/// let mut writer = BufferedResponseWriter::new();
/// let handle = writer.captured();
/// let response = ContainerResponse::ok();
/// writer.write_status_and_headers(0, &response).unwrap();
/// writer.finish().unwrap();
/// assert!(handle.lock().is_finished());
/// ```
pub struct BufferedResponseWriter {
    captured: Arc<Mutex<CapturedResponse>>,
    sink: CaptureSink,
    committed: bool,
}

impl BufferedResponseWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        let captured = Arc::new(Mutex::new(CapturedResponse::default()));
        Self {
            sink: CaptureSink {
                captured: Arc::clone(&captured),
                pending: BytesMut::new(),
            },
            captured,
            committed: false,
        }
    }

    /// Returns a shared handle to the captured state.
    pub fn captured(&self) -> Arc<Mutex<CapturedResponse>> {
        Arc::clone(&self.captured)
    }
}

impl Default for BufferedResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerResponseWriter for BufferedResponseWriter {
    fn write_status_and_headers(
        &mut self,
        content_length: i64,
        response: &ContainerResponse,
    ) -> io::Result<&mut (dyn Write + Send)> {
        if self.committed {
            return Err(io::Error::other("status and headers already written"));
        }
        self.committed = true;
        {
            let mut captured = self.captured.lock();
            captured.status = Some(response.status());
            captured.headers = response.headers().clone();
            captured.content_length = Some(content_length);
        }
        Ok(&mut self.sink)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.sink.flush()?;
        self.captured.lock().finish_count += 1;
        Ok(())
    }

    fn failure(&mut self, error: &ProcessingError) {
        self.captured.lock().failure = Some(error.to_string());
    }
}

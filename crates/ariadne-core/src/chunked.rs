//! Streaming response entity.
//!
//! A [`ChunkedResponse`] is a FIFO buffer shared between the handler that
//! produces chunks and the container writer that consumes them. Producers
//! may write from any task or thread; a single consumer drains the buffer
//! with [`ChunkedResponse::next_chunk`], which waits at most one poll
//! interval before returning so the writer can re-check for closure.
//!
//! ```text
//!   handler tasks ──write()/send()──▶ [ c1 c2 c3 ] ──next_chunk()──▶ writer
//!                                          │
//!                  close() ────────────────┘  (consumer sees None, stops)
//! ```
//!
//! Closing is one-way and does not drain: chunks still queued when the
//! response is closed are abandoned. Producers that need every chunk
//! delivered finish with [`ChunkedResponse::close_when_drained`].
//!
//! A producer that goes away without closing (it returned early, panicked
//! or was cancelled) does not stall the consumer. Once a single handle is
//! left, that handle takes what is still queued and then the response
//! closes itself.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{ProcessingError, ProcessingResult};
use crate::request::ContainerRequest;

/// Default time [`ChunkedResponse::next_chunk`] waits for a chunk.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for chunked responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedConfig {
    /// Maximum time a consumer waits for the next chunk.
    pub poll_interval: Duration,
    /// Maximum number of queued chunks, or `None` for an unbounded queue.
    pub capacity: Option<usize>,
}

impl Default for ChunkedConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            capacity: None,
        }
    }
}

impl ChunkedConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bounds the queue.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

enum Rejected<T> {
    Closed,
    Full(T, usize),
}

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    closed: AtomicBool,
    handles: AtomicUsize,
    available: Notify,
    space: Notify,
    drained: Notify,
    config: ChunkedConfig,
}

/// Cloneable handle to a chunked response buffer.
///
/// All clones refer to the same queue. Hand one clone to the container (as
/// the response entity) and keep others in producer tasks.
///
/// # Example
///
/// ```
/// use ariadne_core::ChunkedResponse;
/// use bytes::Bytes;
///
/// # tokio_test::block_on(async {
/// let chunks = ChunkedResponse::new();
/// chunks.write(Bytes::from_static(b"hello")).unwrap();
/// assert_eq!(chunks.next_chunk().await, Some(Bytes::from_static(b"hello")));
///
/// chunks.close();
/// assert!(chunks.write(Bytes::from_static(b"late")).is_err());
/// assert_eq!(chunks.next_chunk().await, None);
/// # });
/// ```
pub struct ChunkedResponse<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ChunkedResponse<T> {
    /// Creates an unbounded buffer with the default poll interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ChunkedConfig::default())
    }

    /// Creates a buffer with the given configuration.
    #[must_use]
    pub fn with_config(config: ChunkedConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
                handles: AtomicUsize::new(1),
                available: Notify::new(),
                space: Notify::new(),
                drained: Notify::new(),
                config,
            }),
        }
    }

    /// Creates a buffer using the [`ChunkedConfig`] attached to the request,
    /// falling back to the defaults.
    #[must_use]
    pub fn for_request(request: &ContainerRequest) -> Self {
        let config = request
            .extensions()
            .get::<ChunkedConfig>()
            .copied()
            .unwrap_or_default();
        Self::with_config(config)
    }

    /// Returns the buffer configuration.
    pub fn config(&self) -> &ChunkedConfig {
        &self.shared.config
    }

    fn enqueue(&self, chunk: T) -> Result<(), Rejected<T>> {
        {
            let mut queue = self.shared.queue.lock();
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(Rejected::Closed);
            }
            if let Some(capacity) = self.shared.config.capacity {
                if queue.len() >= capacity {
                    return Err(Rejected::Full(chunk, capacity));
                }
            }
            queue.push_back(chunk);
        }
        self.shared.available.notify_one();
        Ok(())
    }

    /// Appends a chunk without waiting.
    ///
    /// `None` is accepted and ignored. Fails with
    /// [`ProcessingError::IllegalState`] once the response is closed and with
    /// [`ProcessingError::QueueFull`] when a bounded queue has no room.
    pub fn write(&self, chunk: impl Into<Option<T>>) -> ProcessingResult<()> {
        if self.is_closed() {
            return Err(ProcessingError::illegal_state("chunked response is closed"));
        }
        let Some(chunk) = chunk.into() else {
            return Ok(());
        };
        match self.enqueue(chunk) {
            Ok(()) => Ok(()),
            Err(Rejected::Closed) => {
                Err(ProcessingError::illegal_state("chunked response is closed"))
            }
            Err(Rejected::Full(_, capacity)) => Err(ProcessingError::QueueFull { capacity }),
        }
    }

    /// Appends a chunk, waiting for room in a bounded queue.
    ///
    /// Fails with [`ProcessingError::IllegalState`] if the response is closed
    /// before the chunk could be queued.
    pub async fn send(&self, chunk: T) -> ProcessingResult<()> {
        let mut chunk = chunk;
        loop {
            let space = self.shared.space.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            match self.enqueue(chunk) {
                Ok(()) => return Ok(()),
                Err(Rejected::Closed) => {
                    return Err(ProcessingError::illegal_state("chunked response is closed"))
                }
                Err(Rejected::Full(returned, _)) => {
                    if self.is_sole_handle() {
                        // Nobody is left to make room.
                        self.close();
                        return Err(ProcessingError::illegal_state(
                            "chunked response has no consumer",
                        ));
                    }
                    chunk = returned;
                    space.await;
                }
            }
        }
    }

    /// Closes the response. Idempotent.
    ///
    /// Wakes the consumer and any blocked [`send`](Self::send) callers.
    /// Queued chunks are not drained.
    pub fn close(&self) {
        let was_closed = {
            let _queue = self.shared.queue.lock();
            self.shared.closed.swap(true, Ordering::AcqRel)
        };
        if !was_closed {
            self.shared.available.notify_one();
            self.shared.space.notify_waiters();
            self.shared.drained.notify_waiters();
        }
    }

    /// Waits until the consumer has taken every queued chunk, then closes.
    ///
    /// Returns early if the response is closed by someone else meanwhile,
    /// e.g. because the client went away.
    pub async fn close_when_drained(&self) {
        loop {
            let drained = self.shared.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.is_closed() || self.pending() == 0 || self.is_sole_handle() {
                break;
            }
            drained.await;
        }
        self.close();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn is_sole_handle(&self) -> bool {
        self.shared.handles.load(Ordering::Acquire) == 1
    }

    /// Number of chunks waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    fn pop(&self) -> Option<T> {
        let (chunk, now_empty) = {
            let mut queue = self.shared.queue.lock();
            let chunk = queue.pop_front();
            (chunk, queue.is_empty())
        };
        if chunk.is_some() {
            if self.shared.config.capacity.is_some() {
                self.shared.space.notify_one();
            }
            if now_empty {
                self.shared.drained.notify_waiters();
            }
        }
        chunk
    }

    /// Takes the next chunk.
    ///
    /// Returns `None` immediately when the response is closed, otherwise
    /// waits up to the poll interval for a chunk and returns `None` on
    /// timeout. Callers distinguish the two cases with
    /// [`is_closed`](Self::is_closed).
    ///
    /// When the queue is empty and every other handle has been dropped, no
    /// more chunks can arrive: the response is closed and `None` returned.
    pub async fn next_chunk(&self) -> Option<T> {
        let deadline = Instant::now() + self.shared.config.poll_interval;
        loop {
            let available = self.shared.available.notified();
            tokio::pin!(available);
            available.as_mut().enable();

            if self.is_closed() {
                return None;
            }
            if let Some(chunk) = self.pop() {
                return Some(chunk);
            }
            if self.is_sole_handle() {
                self.close();
                return None;
            }
            if tokio::time::timeout_at(deadline, available).await.is_err() {
                return None;
            }
        }
    }

    /// Converts the buffer into a stream that ends when the response closes.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send + 'static
    where
        T: Send + 'static,
    {
        futures_util::stream::unfold(self, |chunks| async move {
            loop {
                if let Some(chunk) = chunks.next_chunk().await {
                    return Some((chunk, chunks));
                }
                if chunks.is_closed() {
                    return None;
                }
            }
        })
    }
}

impl<T> Default for ChunkedResponse<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ChunkedResponse<T> {
    fn clone(&self) -> Self {
        self.shared.handles.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for ChunkedResponse<T> {
    fn drop(&mut self) {
        if self.shared.handles.fetch_sub(1, Ordering::AcqRel) == 2 {
            // Wake the remaining handle so it notices it is alone.
            self.shared.available.notify_one();
            self.shared.space.notify_waiters();
            self.shared.drained.notify_waiters();
        }
    }
}

impl<T> fmt::Debug for ChunkedResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedResponse")
            .field("closed", &self.is_closed())
            .field("pending", &self.pending())
            .field("config", &self.shared.config)
            .finish()
    }
}

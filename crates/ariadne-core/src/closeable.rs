//! Per-request registry of resources released when the request completes.
//!
//! Anything a handler opens for the duration of a request (a file handle, a
//! pooled connection, a temporary directory) can be registered with the
//! request's [`CloseableService`]. The pipeline closes the service once the
//! response has been written, whether the request succeeded, failed or was
//! aborted by a filter.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// A resource that must be released when its owning request ends.
pub trait Closeable: Send + Sync {
    /// Releases the resource.
    ///
    /// Failures are logged by the registry and never propagate to the request.
    fn close(&self) -> anyhow::Result<()>;
}

/// Adapts a closure into a [`Closeable`].
///
/// # Example
///
/// ```
/// use ariadne_core::{CloseableService, FnCloseable};
///
/// let service = CloseableService::new();
/// assert!(service.add(FnCloseable::new(|| Ok(()))));
/// ```
pub struct FnCloseable<F> {
    f: F,
}

impl<F> FnCloseable<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    /// Wraps the closure.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Closeable for FnCloseable<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn close(&self) -> anyhow::Result<()> {
        (self.f)()
    }
}

/// Outcome of [`CloseableService::close`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    /// Handles released successfully.
    pub released: usize,
    /// Handles whose release failed.
    pub failed: usize,
}

#[derive(Default)]
struct State {
    closed: bool,
    handles: Vec<Arc<dyn Closeable>>,
}

/// Registry of [`Closeable`] handles scoped to a single request.
///
/// Transitions once from open to closed. Handles added before the transition
/// are released exactly once, in registration order; handles offered after it
/// are refused and stay the caller's responsibility.
#[derive(Default)]
pub struct CloseableService {
    state: Mutex<State>,
}

impl CloseableService {
    /// Creates an open, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle.
    ///
    /// Returns `false` if the registry is already closed, in which case the
    /// handle was not retained.
    pub fn add(&self, handle: impl Closeable + 'static) -> bool {
        self.add_shared(Arc::new(handle))
    }

    /// Registers an already shared handle.
    pub fn add_shared(&self, handle: Arc<dyn Closeable>) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.handles.push(handle);
        true
    }

    /// Closes the registry and releases every registered handle.
    ///
    /// Only the first call releases anything; later calls return an empty
    /// summary. Handles are released outside the lock so a handle may safely
    /// touch the registry while closing.
    pub fn close(&self) -> ReleaseSummary {
        let handles = {
            let mut state = self.state.lock();
            if state.closed {
                return ReleaseSummary::default();
            }
            state.closed = true;
            std::mem::take(&mut state.handles)
        };

        let mut summary = ReleaseSummary::default();
        for (index, handle) in handles.iter().enumerate() {
            match handle.close() {
                Ok(()) => summary.released += 1,
                Err(error) => {
                    summary.failed += 1;
                    warn!(handle = index, error = %error, "Failed to release closeable");
                }
            }
        }

        if !handles.is_empty() {
            debug!(
                released = summary.released,
                failed = summary.failed,
                "Released request closeables"
            );
        }
        summary
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of handles waiting to be released.
    pub fn len(&self) -> usize {
        self.state.lock().handles.len()
    }

    /// Returns `true` if no handles are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CloseableService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CloseableService")
            .field("closed", &state.closed)
            .field("handles", &state.handles.len())
            .finish()
    }
}

impl Drop for CloseableService {
    fn drop(&mut self) {
        self.close();
    }
}

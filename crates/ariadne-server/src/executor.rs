//! Executors and their per-request assignment.
//!
//! Two executors serve every request: the *requesting* executor runs the
//! resource method, the *responding* executor writes the response. An
//! [`ExecutorProvider`] hands out both; the pipeline resolves them once per
//! request into an [`ExecutorAssignment`].
//!
//! A [`Direct`](ExecutorKind::Direct) executor runs work inline on the
//! caller's task. A [`Pooled`](ExecutorKind::Pooled) executor owns a tokio
//! runtime with named worker threads and must be shut down when the
//! application stops; dropping it does so as well.
//!
//! Unless configured otherwise, resource methods run on a pool named
//! `{thread_name}-req-N` and responses are written inline.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ariadne_core::{ContainerRequest, ProcessingError, ProcessingResult};
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, warn, Instrument};

use crate::config::{ExecutorConfig, ExecutorKind};

/// Runs request work.
pub struct Executor {
    name: String,
    flavor: Flavor,
}

enum Flavor {
    Direct,
    Pooled(Pool),
}

struct Pool {
    size: usize,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    accepting: AtomicBool,
    in_flight: Arc<AtomicUsize>,
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Executor {
    /// Creates an executor that runs work inline.
    pub fn direct(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flavor: Flavor::Direct,
        }
    }

    /// Creates an executor backed by `size` worker threads named
    /// `{thread_name}-{n}`.
    ///
    /// # Errors
    ///
    /// Fails if `size` is zero or the runtime cannot be started.
    pub fn pooled(
        name: impl Into<String>,
        size: usize,
        thread_name: impl Into<String>,
    ) -> ProcessingResult<Self> {
        let name = name.into();
        if size == 0 {
            return Err(ProcessingError::executor(format!(
                "executor '{name}' needs at least one worker thread"
            )));
        }

        let thread_name = thread_name.into();
        let counter = AtomicUsize::new(0);
        let runtime = Builder::new_multi_thread()
            .worker_threads(size)
            .thread_name_fn(move || {
                format!("{thread_name}-{}", counter.fetch_add(1, Ordering::Relaxed))
            })
            .enable_all()
            .build()?;

        debug!(executor = %name, size, "Started executor pool");

        Ok(Self {
            name,
            flavor: Flavor::Pooled(Pool {
                size,
                handle: runtime.handle().clone(),
                runtime: Mutex::new(Some(runtime)),
                accepting: AtomicBool::new(true),
                in_flight: Arc::new(AtomicUsize::new(0)),
            }),
        })
    }

    /// Creates an executor of the given kind.
    ///
    /// # Errors
    ///
    /// See [`pooled`](Self::pooled).
    pub fn from_kind(
        name: impl Into<String>,
        kind: ExecutorKind,
        thread_name: &str,
    ) -> ProcessingResult<Self> {
        match kind {
            ExecutorKind::Direct => Ok(Self::direct(name)),
            ExecutorKind::Pooled { size } => Self::pooled(name, size, thread_name),
        }
    }

    /// Returns the executor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind of this executor.
    pub const fn kind(&self) -> ExecutorKind {
        match &self.flavor {
            Flavor::Direct => ExecutorKind::Direct,
            Flavor::Pooled(pool) => ExecutorKind::Pooled { size: pool.size },
        }
    }

    /// Number of tasks currently running on the pool. Always zero for
    /// direct executors.
    pub fn in_flight(&self) -> usize {
        match &self.flavor {
            Flavor::Direct => 0,
            Flavor::Pooled(pool) => pool.in_flight.load(Ordering::Acquire),
        }
    }

    /// Returns `false` once the executor has been shut down. Direct
    /// executors always accept.
    pub fn is_accepting(&self) -> bool {
        match &self.flavor {
            Flavor::Direct => true,
            Flavor::Pooled(pool) => pool.accepting.load(Ordering::Acquire),
        }
    }

    /// Runs `future` on this executor and waits for its output.
    ///
    /// The caller's tracing span follows the work onto pool threads.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::Executor`] when the executor has been shut
    /// down, or when the task was cancelled or panicked.
    pub async fn run<F>(&self, future: F) -> ProcessingResult<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let pool = match &self.flavor {
            Flavor::Direct => return Ok(future.await),
            Flavor::Pooled(pool) => pool,
        };

        if !pool.accepting.load(Ordering::Acquire) {
            return Err(ProcessingError::executor(format!(
                "executor '{}' is shut down",
                self.name
            )));
        }

        let guard = InFlight::enter(&pool.in_flight);
        let task = pool.handle.spawn(
            async move {
                let _guard = guard;
                future.await
            }
            .in_current_span(),
        );

        task.await.map_err(|e| {
            let reason = if e.is_cancelled() { "cancelled" } else { "panicked" };
            ProcessingError::executor(format!("task on executor '{}' {reason}", self.name))
        })
    }

    /// Stops accepting work and cancels running tasks. Idempotent.
    pub fn shutdown(&self) {
        let Flavor::Pooled(pool) = &self.flavor else {
            return;
        };

        pool.accepting.store(false, Ordering::Release);
        if let Some(runtime) = pool.runtime.lock().take() {
            info!(
                executor = %self.name,
                in_flight = pool.in_flight.load(Ordering::Acquire),
                "Shutting down executor"
            );
            runtime.shutdown_background();
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

/// Hands out the executors for a request.
pub trait ExecutorProvider: Send + Sync + 'static {
    /// Executor running the resource method for `request`.
    fn requesting_executor(&self, request: &ContainerRequest) -> Arc<Executor>;

    /// Executor writing the response for `request`.
    fn responding_executor(&self, request: &ContainerRequest) -> Arc<Executor>;

    /// Releases the provider's executors.
    fn shutdown(&self);
}

/// Provider returning the same two executors for every request.
#[derive(Debug, Clone)]
pub struct DefaultExecutorProvider {
    requesting: Arc<Executor>,
    responding: Arc<Executor>,
}

impl DefaultExecutorProvider {
    /// Creates a provider from existing executors.
    pub const fn new(requesting: Arc<Executor>, responding: Arc<Executor>) -> Self {
        Self {
            requesting,
            responding,
        }
    }

    /// Creates the executors described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if a pool cannot be started.
    pub fn from_config(config: &ExecutorConfig) -> ProcessingResult<Self> {
        let requesting = Executor::from_kind(
            "requesting",
            config.requesting,
            &format!("{}-req", config.thread_name),
        )?;
        let responding = Executor::from_kind(
            "responding",
            config.responding,
            &format!("{}-resp", config.thread_name),
        )?;
        Ok(Self::new(Arc::new(requesting), Arc::new(responding)))
    }
}

/// Resource methods run on a pool sized to the available parallelism and
/// responses are written inline. If the pool cannot be started, requests
/// fall back to running inline.
impl Default for DefaultExecutorProvider {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default()).unwrap_or_else(|err| {
            warn!(error = %err, "Could not start requesting pool; running handlers inline");
            Self::new(
                Arc::new(Executor::direct("requesting")),
                Arc::new(Executor::direct("responding")),
            )
        })
    }
}

impl ExecutorProvider for DefaultExecutorProvider {
    fn requesting_executor(&self, _request: &ContainerRequest) -> Arc<Executor> {
        Arc::clone(&self.requesting)
    }

    fn responding_executor(&self, _request: &ContainerRequest) -> Arc<Executor> {
        Arc::clone(&self.responding)
    }

    fn shutdown(&self) {
        self.requesting.shutdown();
        self.responding.shutdown();
    }
}

/// The executors bound to one request.
#[derive(Debug, Clone)]
pub struct ExecutorAssignment {
    /// Runs the resource method.
    pub requesting: Arc<Executor>,
    /// Writes the response.
    pub responding: Arc<Executor>,
}

impl ExecutorAssignment {
    /// Asks `provider` for both executors of `request`.
    pub fn resolve(provider: &dyn ExecutorProvider, request: &ContainerRequest) -> Self {
        let assignment = Self {
            requesting: provider.requesting_executor(request),
            responding: provider.responding_executor(request),
        };
        debug!(
            request_id = %request.id(),
            requesting = assignment.requesting.name(),
            responding = assignment.responding.name(),
            "Resolved executors"
        );
        assignment
    }
}

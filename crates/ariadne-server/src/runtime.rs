//! The application handler: one request in, one response out.
//!
//! ```text
//!  request ─▶ pre-match filters ─▶ routing ─▶ inflector extraction
//!                   │                              │
//!                   │ Respond                      │ Invoke (requesting executor)
//!                   ▼                              ▼
//!              responder (responding executor) ◀── response / error
//!                   │
//!                   ▼
//!          ContainerResponseWriter        closeables released
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ariadne_core::{
    ChunkedConfig, ChunkedResponse, ContainerRequest, ContainerResponse, ContainerResponseWriter,
    Entity, ProcessingError, ProcessingResult, RequestHead, SharedInflector,
};
use ariadne_router::{Resource, ResourceRouter};
use ariadne_telemetry::fields;
use bytes::Bytes;
use thiserror::Error;
use tracing::field::Empty;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::context::{AcceptingContext, RouteResolution};
use crate::error::ConfigError;
use crate::exception::{ExceptionMapper, ExceptionMappers};
use crate::executor::{DefaultExecutorProvider, ExecutorAssignment, ExecutorProvider};
use crate::extraction::InflectorExtractionStage;
use crate::filter::{PreMatchFilter, PreMatchFilterStage, ResponseFilter, ResponseFilterChain};
use crate::responder::Responder;
use crate::routing::RoutingStage;
use crate::stage::{Continuation, StageChain};

/// Errors building an [`ApplicationHandler`].
#[derive(Error, Debug)]
pub enum BuildError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A collaborator could not be created.
    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

struct Inner {
    stages: StageChain,
    responder: Arc<Responder>,
    executors: Arc<dyn ExecutorProvider>,
    config: ServerConfig,
    chunked: ChunkedConfig,
}

/// Processes requests through the accepting stages and writes responses.
///
/// Cheap to clone; clones share the routing table, filters and executors.
///
/// # Example
///
/// ```
/// use ariadne_core::{inflector_fn, BufferedResponseWriter, ContainerRequest, ContainerResponse};
/// use ariadne_router::Resource;
/// use ariadne_server::ApplicationHandler;
///
/// # tokio_test::block_on(async {
/// let hello = inflector_fn("hello", |request| async move {
///     let name = request.param("name").unwrap_or("world").to_owned();
///     Ok(ContainerResponse::ok().with_text(format!("hello {name}")))
/// });
///
/// let app = ApplicationHandler::builder()
///     .resource(Resource::builder("/hello/{name}").get(hello).build().unwrap())
///     .build()
///     .unwrap();
///
/// let writer = BufferedResponseWriter::new();
/// let captured = writer.captured();
/// app.handle(ContainerRequest::get("/hello/ariadne"), writer).await.unwrap();
/// assert_eq!(captured.lock().body_text(), "hello ariadne");
/// # });
/// ```
#[derive(Clone)]
pub struct ApplicationHandler {
    inner: Arc<Inner>,
}

impl ApplicationHandler {
    /// Starts building a handler.
    #[must_use]
    pub fn builder() -> ApplicationHandlerBuilder {
        ApplicationHandlerBuilder::default()
    }

    /// Returns the configuration the handler was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Returns the names of the accepting stages in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.inner.stages.stage_names()
    }

    /// Creates a chunked buffer using the configured poll interval and
    /// capacity.
    pub fn chunked_response(&self) -> ChunkedResponse<Bytes> {
        ChunkedResponse::with_config(self.inner.chunked)
    }

    /// Processes one request and writes its response to `writer`.
    ///
    /// The request's closeables are released once the response has been
    /// written or processing has failed.
    ///
    /// # Errors
    ///
    /// Returns failures no exception mapper handled (already reported to
    /// `writer`), write failures and executor rejections.
    pub async fn handle<W>(&self, request: ContainerRequest, writer: W) -> ProcessingResult<()>
    where
        W: ContainerResponseWriter + 'static,
    {
        let started = Instant::now();
        let request = request.with_extension(self.inner.chunked);
        let closeables = Arc::clone(request.closeables());
        let span = info_span!(
            "request",
            request_id = %request.id(),
            http.method = %request.method(),
            http.path = request.path(),
            http.status_code = Empty,
            duration_ms = Empty,
        );

        let result = self.process(request, writer).instrument(span.clone()).await;
        let released = closeables.close();

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        span.record(fields::DURATION_MS, duration_ms);
        span.in_scope(|| {
            match &result {
                Ok(()) => info!(
                    closeables = released.released,
                    "Request completed"
                ),
                Err(err) => warn!(
                    closeables = released.released,
                    error = %err,
                    "Request failed"
                ),
            }
        });
        result
    }

    /// Converts an `http::Request` and processes it.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub async fn handle_http<W>(&self, request: http::Request<Bytes>, writer: W) -> ProcessingResult<()>
    where
        W: ContainerResponseWriter + 'static,
    {
        self.handle(ContainerRequest::from(request), writer).await
    }

    /// Shuts down the executors. Requests submitted afterwards fail with
    /// [`ProcessingError::Executor`] when they reach a pooled executor.
    pub fn shutdown(&self) {
        info!("Shutting down application handler");
        self.inner.executors.shutdown();
    }

    async fn process<W>(&self, request: ContainerRequest, writer: W) -> ProcessingResult<()>
    where
        W: ContainerResponseWriter + 'static,
    {
        let head = request.head();
        let executors = ExecutorAssignment::resolve(self.inner.executors.as_ref(), &request);
        let outcome = self.accept(request, &executors).await;

        let responder = Arc::clone(&self.inner.responder);
        let delivery = Delivery::new(writer, outcome);
        executors
            .responding
            .run(async move { delivery.deliver(&responder, &head).await })
            .await?
    }

    async fn accept(
        &self,
        request: ContainerRequest,
        executors: &ExecutorAssignment,
    ) -> ProcessingResult<ContainerResponse> {
        let mut ctx = AcceptingContext::new();
        match self.inner.stages.process(request, &mut ctx)? {
            Continuation::Invoke(request, inflector) => {
                debug!(
                    inflector = inflector.name(),
                    executor = executors.requesting.name(),
                    "Invoking resource method"
                );
                executors.requesting.run(inflector.apply(request)).await?
            }
            Continuation::Respond(_, response) => Ok(response),
            Continuation::Terminate(request) | Continuation::Proceed(request) => {
                Err(match ctx.take() {
                    Some(RouteResolution::MethodNotAllowed { allowed }) => {
                        ProcessingError::method_not_allowed(request.method().clone(), allowed)
                    }
                    _ => ProcessingError::not_found(request.path()),
                })
            }
        }
    }
}

/// A response on its way to the responding executor.
///
/// Dropped undelivered when the executor rejects or cancels the work: a
/// streamed entity is then closed and the container is told the response
/// was abandoned.
struct Delivery<W: ContainerResponseWriter> {
    writer: W,
    outcome: Option<ProcessingResult<ContainerResponse>>,
    delivered: bool,
}

impl<W: ContainerResponseWriter> Delivery<W> {
    fn new(writer: W, outcome: ProcessingResult<ContainerResponse>) -> Self {
        Self {
            writer,
            outcome: Some(outcome),
            delivered: false,
        }
    }

    async fn deliver(mut self, responder: &Responder, head: &RequestHead) -> ProcessingResult<()> {
        let Some(outcome) = self.outcome.take() else {
            return Ok(());
        };
        let result = responder.respond(head, outcome, &mut self.writer).await;
        self.delivered = true;
        result
    }
}

impl<W: ContainerResponseWriter> Drop for Delivery<W> {
    fn drop(&mut self) {
        if self.delivered {
            return;
        }
        if let Some(Ok(response)) = &self.outcome {
            if let Entity::Chunked(chunks) = response.entity() {
                chunks.close();
            }
        }
        let err = ProcessingError::executor("response abandoned by the responding executor");
        warn!(error = %err, "Response not delivered");
        self.writer.failure(&err);
    }
}

impl fmt::Debug for ApplicationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationHandler")
            .field("stages", &self.inner.stages)
            .field("responder", &self.inner.responder)
            .field("chunked", &self.inner.chunked)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApplicationHandler`].
#[derive(Default)]
#[must_use]
pub struct ApplicationHandlerBuilder {
    config: ServerConfig,
    pre_match_filters: Vec<Arc<dyn PreMatchFilter>>,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
    resources: Vec<Resource<SharedInflector>>,
    mappers: Vec<Arc<dyn ExceptionMapper>>,
    executors: Option<Arc<dyn ExecutorProvider>>,
}

impl ApplicationHandlerBuilder {
    /// Sets the configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a pre-match filter.
    pub fn pre_match_filter(mut self, filter: impl PreMatchFilter) -> Self {
        self.pre_match_filters.push(Arc::new(filter));
        self
    }

    /// Adds a response filter.
    pub fn response_filter(mut self, filter: impl ResponseFilter) -> Self {
        self.response_filters.push(Arc::new(filter));
        self
    }

    /// Adds a root resource.
    pub fn resource(mut self, resource: Resource<SharedInflector>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Adds an exception mapper. Mappers are tried in registration order.
    pub fn exception_mapper(mut self, mapper: impl ExceptionMapper) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    /// Sets the executor provider. Only the first provider is used.
    pub fn executor_provider(mut self, provider: impl ExecutorProvider) -> Self {
        if self.executors.is_some() {
            warn!("Executor provider already set; ignoring additional provider");
        } else {
            self.executors = Some(Arc::new(provider));
        }
        self
    }

    /// Validates the configuration and assembles the handler.
    ///
    /// Without an explicit provider, executors are created from the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration or when an executor pool cannot be
    /// started.
    pub fn build(self) -> Result<ApplicationHandler, BuildError> {
        self.config.validate()?;

        let executors: Arc<dyn ExecutorProvider> = match self.executors {
            Some(provider) => provider,
            None => Arc::new(DefaultExecutorProvider::from_config(&self.config.executors)?),
        };

        let router: ResourceRouter<SharedInflector> = self.resources.into_iter().collect();
        let stages = StageChain::new()
            .then(PreMatchFilterStage::new(self.pre_match_filters))
            .then(RoutingStage::new(
                Arc::new(router),
                self.config.normalized_base_path(),
            ))
            .then(InflectorExtractionStage);

        let responder = Responder::new(
            ResponseFilterChain::new(self.response_filters),
            ExceptionMappers::new(self.mappers),
        );

        debug!(stages = ?stages.stage_names(), "Application handler built");

        Ok(ApplicationHandler {
            inner: Arc::new(Inner {
                stages,
                responder: Arc::new(responder),
                executors,
                chunked: self.config.chunked_config(),
                config: self.config,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorKind;

    #[test]
    fn test_stage_order_is_fixed() {
        let app = ApplicationHandler::builder().build().unwrap();
        assert_eq!(
            app.stage_names(),
            ["pre-match-filter", "routing", "inflector-extraction"]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ServerConfig::builder()
            .requesting_executor(ExecutorKind::Pooled { size: 0 })
            .build();
        let err = ApplicationHandler::builder().config(config).build().unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn test_chunked_response_uses_config() {
        let config = ServerConfig::builder().chunk_capacity(4).build();
        let app = ApplicationHandler::builder().config(config).build().unwrap();
        assert_eq!(app.chunked_response().config().capacity, Some(4));
    }
}

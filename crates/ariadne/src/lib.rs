//! # Ariadne
//!
//! **Server-side request pipeline for container-hosted applications**
//!
//! Ariadne takes a request handed over by a container (an HTTP server,
//! a test harness, anything implementing [`ContainerResponseWriter`])
//! and carries it through a fixed sequence of stages:
//!
//! ```text
//! Request → PreMatchFilters → Routing → InflectorExtraction → Inflector
//!                                                                 ↓
//! Writer  ←  ExceptionMappers  ←  ResponseFilters  ←  Response ──┘
//! ```
//!
//! - Pre-match filters run by ascending priority and may rewrite the
//!   request or answer it outright.
//! - Routing walks the resource tree, preferring the most specific
//!   template at each level.
//! - Resource methods run on the requesting executor; responses are
//!   written on the responding executor.
//! - Chunked responses are streamed from a buffer the handler keeps
//!   writing to after it returns.
//! - Per-request closeables are released once the response is written.
//!
//! ## Quick Start
//!
//! ```
//! use ariadne::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let greet = inflector_fn("greet", |request| async move {
//!     let name = request.param("name").unwrap_or("world").to_owned();
//!     Ok(ContainerResponse::ok().with_text(format!("hello {name}")))
//! });
//!
//! let app = ApplicationHandler::builder()
//!     .resource(Resource::builder("/greet/{name}").get(greet).build().unwrap())
//!     .build()
//!     .unwrap();
//!
//! let writer = BufferedResponseWriter::new();
//! let captured = writer.captured();
//! app.handle(ContainerRequest::get("/greet/ada"), writer).await.unwrap();
//! assert_eq!(captured.lock().body_text(), "hello ada");
//! # });
//! ```
//!
//! [`ContainerResponseWriter`]: ariadne_core::ContainerResponseWriter

#![doc(html_root_url = "https://docs.rs/ariadne/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export request, response and lifecycle primitives
pub use ariadne_core as core;

// Re-export resource matching
pub use ariadne_router as router;

// Re-export the request pipeline
pub use ariadne_server as server;

// Re-export logging setup
pub use ariadne_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use ariadne::prelude::*;
///
/// let config = ServerConfig::builder().base_path("/api").build();
/// assert_eq!(config.normalized_base_path().as_deref(), Some("/api"));
/// ```
pub mod prelude {
    pub use ariadne_core::{
        inflector_fn, BufferedResponseWriter, ChunkedResponse, Closeable, CloseableService,
        ContainerFactory, ContainerProvider, ContainerRequest, ContainerResponse,
        ContainerResponseWriter, DirectoryResourceFinder, Entity, FnCloseable, Inflector,
        ProcessingError, ProcessingResult, RequestHead, RequestId, ResourceFinder,
        SharedInflector,
    };

    pub use ariadne_router::{Params, Resource, ResourceRouter};

    pub use ariadne_server::{
        ApplicationHandler, ConfigLoader, ExceptionMapper, ExecutorKind, ExecutorProvider,
        FilterContext, FnFilter, FnResponseFilter, PreMatchFilter, ResponseFilter, ServerConfig,
    };

    pub use ariadne_telemetry::{init_logging, LogConfig, LogFormat};
}

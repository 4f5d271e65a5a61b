//! # Ariadne Server
//!
//! The staged request-processing pipeline.
//!
//! An [`ApplicationHandler`] takes a [`ContainerRequest`](ariadne_core::ContainerRequest)
//! through a fixed chain of accepting stages and hands the result to the
//! container's [`ContainerResponseWriter`](ariadne_core::ContainerResponseWriter):
//!
//! 1. **Pre-match filters** ([`PreMatchFilterStage`]) may rewrite the request
//!    or answer it directly
//! 2. **Routing** ([`RoutingStage`]) matches the path against the resource tree
//! 3. **Inflector extraction** ([`InflectorExtractionStage`]) selects the
//!    resource method
//!
//! The resource method runs on the requesting executor, the [`Responder`]
//! on the responding executor. Failures go through [`ExceptionMappers`];
//! the request's closeables are released in every case.
//!
//! Configuration comes from [`ServerConfig`], usually loaded with
//! [`ConfigLoader`].

#![doc(html_root_url = "https://docs.rs/ariadne-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
mod context;
mod error;
mod exception;
mod executor;
mod extraction;
mod filter;
mod loader;
mod responder;
mod routing;
mod runtime;
mod stage;

pub use config::{
    ChunkedSettings, ExecutorConfig, ExecutorKind, ServerConfig, ServerConfigBuilder,
    DEFAULT_CHUNK_POLL_INTERVAL_MS, DEFAULT_THREAD_NAME,
};
pub use context::{AcceptingContext, FilterContext, RouteResolution};
pub use error::{ConfigError, ConfigResult};
pub use exception::{ExceptionMapper, ExceptionMappers};
pub use executor::{DefaultExecutorProvider, Executor, ExecutorAssignment, ExecutorProvider};
pub use extraction::InflectorExtractionStage;
pub use filter::{
    FnFilter, FnResponseFilter, PreMatchFilter, PreMatchFilterStage, ResponseFilter,
    ResponseFilterChain, USER_PRIORITY,
};
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use responder::Responder;
pub use routing::RoutingStage;
pub use runtime::{ApplicationHandler, ApplicationHandlerBuilder, BuildError};
pub use stage::{Continuation, Stage, StageChain};

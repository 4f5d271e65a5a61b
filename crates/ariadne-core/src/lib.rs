//! # Ariadne Core
//!
//! Core values and contracts for the Ariadne request pipeline.
//!
//! - [`ContainerRequest`] / [`ContainerResponse`] - the values stages pass along
//! - [`Inflector`] - the resource method invoked for a matched request
//! - [`ChunkedResponse`] - streaming response buffer
//! - [`CloseableService`] - per-request cleanup registry
//! - [`ContainerResponseWriter`] - the hosting container's output contract
//! - [`ContainerFactory`] - registry of container providers
//! - [`ResourceFinder`] - resource enumeration
//! - [`ProcessingError`] - the error type shared by every stage

#![doc(html_root_url = "https://docs.rs/ariadne-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chunked;
mod closeable;
mod container;
mod context;
mod error;
mod finder;
mod inflector;
mod request;
mod response;
mod writer;

pub use chunked::{ChunkedConfig, ChunkedResponse, DEFAULT_POLL_INTERVAL};
pub use closeable::{Closeable, CloseableService, FnCloseable, ReleaseSummary};
pub use container::{ContainerFactory, ContainerProvider};
pub use context::RequestId;
pub use error::{ProcessingError, ProcessingResult};
pub use finder::{DirectoryResourceFinder, ResourceFinder};
pub use inflector::{inflector_fn, BoxFuture, FnInflector, Inflector, SharedInflector};
pub use request::{ContainerRequest, RequestHead};
pub use response::{ContainerResponse, Entity, UNKNOWN_LENGTH};
pub use writer::{BufferedResponseWriter, CapturedResponse, ContainerResponseWriter};

pub use ariadne_router::Params;

//! Error types for the request pipeline.
//!
//! [`ProcessingError`] is the single error type flowing through every stage,
//! the executors and the response writer. Each variant knows whether it may be
//! handed to an exception mapper ([`ProcessingError::is_mappable`]) and which
//! status a container should fall back to when nothing maps it.

use std::io;

use http::{Method, StatusCode};
use thiserror::Error;

/// Result type alias using [`ProcessingError`].
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Errors raised while processing a request.
///
/// # Example
///
/// ```
/// use ariadne_core::ProcessingError;
///
/// let err = ProcessingError::illegal_state("response already closed");
/// assert!(!err.is_mappable());
/// assert_eq!(err.to_string(), "Illegal state: response already closed");
/// ```
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// An operation was attempted in a state that forbids it,
    /// e.g. writing to a closed chunked response.
    #[error("Illegal state: {message}")]
    IllegalState {
        /// Human-readable description.
        message: String,
    },

    /// A bounded chunked response refused a chunk because it is full.
    #[error("Chunk queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// No resource matched the request path.
    #[error("No resource matches path '{path}'")]
    NotFound {
        /// The unmatched path.
        path: String,
    },

    /// A resource matched the path but has no handler for the method.
    #[error("Method {method} not allowed")]
    MethodNotAllowed {
        /// The rejected method.
        method: Method,
        /// Methods the matched resource accepts.
        allowed: Vec<Method>,
    },

    /// A pre-match request filter failed.
    #[error("Request filter '{filter}' failed: {source}")]
    Filter {
        /// Name of the failing filter.
        filter: String,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// A response filter failed.
    #[error("Response filter '{filter}' failed: {source}")]
    ResponseFilter {
        /// Name of the failing filter.
        filter: String,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// The resource method (inflector) failed.
    #[error("Handler failed: {source}")]
    Handler {
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// Writing to the container failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An executor rejected or lost a task.
    #[error("Executor error: {message}")]
    Executor {
        /// Human-readable description.
        message: String,
    },

    /// No container provider could produce the requested container type.
    #[error("No container provider supports container type {container_type}")]
    UnsupportedContainer {
        /// Fully qualified name of the requested type.
        container_type: &'static str,
    },

    /// A container provider failed while building a container.
    #[error("Failed to construct container {container_type}: {source}")]
    ContainerConstruction {
        /// Fully qualified name of the requested type.
        container_type: &'static str,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// The operation is not supported by this implementation.
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation {
        /// Name of the rejected operation.
        operation: &'static str,
    },
}

impl ProcessingError {
    /// Creates an illegal-state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a not-found error for a path.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a method-not-allowed error.
    pub fn method_not_allowed(method: Method, allowed: Vec<Method>) -> Self {
        Self::MethodNotAllowed { method, allowed }
    }

    /// Wraps a request filter failure.
    pub fn filter(filter: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Filter {
            filter: filter.into(),
            source,
        }
    }

    /// Wraps a response filter failure.
    pub fn response_filter(filter: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ResponseFilter {
            filter: filter.into(),
            source,
        }
    }

    /// Wraps a handler failure.
    pub fn handler(source: impl Into<anyhow::Error>) -> Self {
        Self::Handler {
            source: source.into(),
        }
    }

    /// Creates an executor error.
    pub fn executor(message: impl Into<String>) -> Self {
        Self::Executor {
            message: message.into(),
        }
    }

    /// Creates an unsupported-container error for `C`.
    pub fn unsupported_container<C: ?Sized>() -> Self {
        Self::UnsupportedContainer {
            container_type: std::any::type_name::<C>(),
        }
    }

    /// Creates an unsupported-operation error.
    pub const fn unsupported_operation(operation: &'static str) -> Self {
        Self::UnsupportedOperation { operation }
    }

    /// Returns `true` if exception mappers may turn this error into a response.
    ///
    /// Filter, response filter and handler failures originate in application
    /// code and are handed to mappers. Routing outcomes are always mappable
    /// since they carry a well-defined status.
    #[must_use]
    pub const fn is_mappable(&self) -> bool {
        matches!(
            self,
            Self::Filter { .. }
                | Self::ResponseFilter { .. }
                | Self::Handler { .. }
                | Self::NotFound { .. }
                | Self::MethodNotAllowed { .. }
        )
    }

    /// Returns the status a container should send when nothing maps the error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Executor { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

//! Mapping processing errors to responses.

use std::fmt;
use std::sync::Arc;

use ariadne_core::{ContainerResponse, ProcessingError};
use http::header::ALLOW;
use http::{HeaderValue, StatusCode};

/// Turns an error into a response.
///
/// Mappers only see errors for which [`ProcessingError::is_mappable`] holds.
/// Returning `None` passes the error on to the next mapper.
pub trait ExceptionMapper: Send + Sync + 'static {
    /// Maps `error`, or declines with `None`.
    fn to_response(&self, error: &ProcessingError) -> Option<ContainerResponse>;
}

impl<F> ExceptionMapper for F
where
    F: Fn(&ProcessingError) -> Option<ContainerResponse> + Send + Sync + 'static,
{
    fn to_response(&self, error: &ProcessingError) -> Option<ContainerResponse> {
        self(error)
    }
}

/// Registered mappers followed by the built-in routing responses.
#[derive(Default, Clone)]
pub struct ExceptionMappers {
    mappers: Vec<Arc<dyn ExceptionMapper>>,
}

impl ExceptionMappers {
    /// Creates the set; mappers are tried in the given order.
    pub fn new(mappers: impl IntoIterator<Item = Arc<dyn ExceptionMapper>>) -> Self {
        Self {
            mappers: mappers.into_iter().collect(),
        }
    }

    /// Number of registered mappers, excluding the built-in ones.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    /// Returns `true` if no mappers are registered.
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Maps `error` to a response.
    ///
    /// The first registered mapper returning a response wins. Unclaimed
    /// not-found and method-not-allowed errors become empty 404 and 405
    /// responses, the latter with an `Allow` header. Anything else stays
    /// unmapped.
    pub fn map(&self, error: &ProcessingError) -> Option<ContainerResponse> {
        if !error.is_mappable() {
            return None;
        }

        self.mappers
            .iter()
            .find_map(|mapper| mapper.to_response(error))
            .or_else(|| builtin_response(error))
    }
}

fn builtin_response(error: &ProcessingError) -> Option<ContainerResponse> {
    match error {
        ProcessingError::NotFound { .. } => Some(ContainerResponse::new(StatusCode::NOT_FOUND)),
        ProcessingError::MethodNotAllowed { allowed, .. } => {
            let methods = allowed
                .iter()
                .map(http::Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let mut response = ContainerResponse::new(StatusCode::METHOD_NOT_ALLOWED);
            if let Ok(value) = HeaderValue::from_str(&methods) {
                response.headers_mut().insert(ALLOW, value);
            }
            Some(response)
        }
        _ => None,
    }
}

impl fmt::Debug for ExceptionMappers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionMappers")
            .field("mappers", &self.mappers.len())
            .finish()
    }
}
